use crate::complexity;
use crate::config::MetricsConfig;
use crate::node_class::{node_text, walk_tree};
use crate::types::{CodeSmell, SmellKind};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tree_sitter::Node;

/// Rolling window size for duplicate-block detection
const DUPLICATE_BLOCK_LINES: usize = 5;

/// Detect threshold-breach smells over a tree plus duplicate blocks over raw
/// text. All thresholds come from the configuration.
#[must_use]
pub fn detect(root: Node, text: &str, config: &MetricsConfig) -> Vec<CodeSmell> {
    let mut smells = Vec::new();

    walk_tree(root, &mut |node| match node.kind() {
        "function_definition" => check_function(node, text, config, &mut smells),
        "class_definition" => check_class(node, text, config, &mut smells),
        _ => {}
    });

    detect_duplicate_blocks(text, &mut smells);
    smells
}

/// Duplicate-block detection alone, for texts with no usable tree.
#[must_use]
pub fn detect_text_only(text: &str) -> Vec<CodeSmell> {
    let mut smells = Vec::new();
    detect_duplicate_blocks(text, &mut smells);
    smells
}

fn check_function(node: Node, text: &str, config: &MetricsConfig, smells: &mut Vec<CodeSmell>) {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, text).to_string());
    let line = node.start_position().row + 1;

    let body_lines = node.end_position().row.saturating_sub(node.start_position().row);
    if body_lines > config.lines_per_function_threshold {
        smells.push(CodeSmell {
            kind: SmellKind::LongFunction,
            name: name.clone(),
            line,
            severity: "medium".to_string(),
            message: format!(
                "Function '{}' is too long ({} lines > {})",
                name.as_deref().unwrap_or("?"),
                body_lines,
                config.lines_per_function_threshold
            ),
            value: Some(body_lines),
            threshold: Some(config.lines_per_function_threshold),
            duplicate_of: None,
        });
    }

    let param_count = node
        .child_by_field_name("parameters")
        .map_or(0, |params| params.named_child_count());
    if param_count > config.parameters_threshold {
        smells.push(CodeSmell {
            kind: SmellKind::TooManyParameters,
            name: name.clone(),
            line,
            severity: "medium".to_string(),
            message: format!(
                "Function '{}' has too many parameters ({} > {})",
                name.as_deref().unwrap_or("?"),
                param_count,
                config.parameters_threshold
            ),
            value: Some(param_count),
            threshold: Some(config.parameters_threshold),
            duplicate_of: None,
        });
    }

    let cyclomatic = complexity::cyclomatic(node);
    if cyclomatic > config.cyclomatic_threshold {
        smells.push(CodeSmell {
            kind: SmellKind::ComplexFunction,
            name,
            line,
            severity: "high".to_string(),
            message: format!(
                "Function has high complexity ({cyclomatic} > {})",
                config.cyclomatic_threshold
            ),
            value: Some(cyclomatic as usize),
            threshold: Some(config.cyclomatic_threshold as usize),
            duplicate_of: None,
        });
    }
}

fn check_class(node: Node, text: &str, config: &MetricsConfig, smells: &mut Vec<CodeSmell>) {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, text).to_string());

    let method_count = node.child_by_field_name("body").map_or(0, |body| {
        let mut cursor = body.walk();
        body.children(&mut cursor)
            .filter(|child| {
                child.kind() == "function_definition"
                    || (child.kind() == "decorated_definition"
                        && child
                            .child_by_field_name("definition")
                            .is_some_and(|d| d.kind() == "function_definition"))
            })
            .count()
    });

    if method_count > config.methods_per_class_threshold {
        smells.push(CodeSmell {
            kind: SmellKind::LargeClass,
            name: name.clone(),
            line: node.start_position().row + 1,
            severity: "medium".to_string(),
            message: format!(
                "Class '{}' has too many methods ({method_count} > {})",
                name.as_deref().unwrap_or("?"),
                config.methods_per_class_threshold
            ),
            value: Some(method_count),
            threshold: Some(config.methods_per_class_threshold),
            duplicate_of: None,
        });
    }
}

/// Fixed-size rolling block hashing: the first occurrence of a block wins,
/// later identical blocks report "duplicate of" its line number.
fn detect_duplicate_blocks(text: &str, smells: &mut Vec<CodeSmell>) {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < DUPLICATE_BLOCK_LINES {
        return;
    }

    let mut seen: HashMap<String, usize> = HashMap::new();

    for i in 0..=lines.len() - DUPLICATE_BLOCK_LINES {
        let block = lines[i..i + DUPLICATE_BLOCK_LINES].join("\n");
        let digest = format!("{:x}", Sha256::digest(block.as_bytes()));
        let line = i + 1;

        if let Some(&first_line) = seen.get(&digest) {
            smells.push(CodeSmell {
                kind: SmellKind::DuplicateCode,
                name: None,
                line,
                severity: "low".to_string(),
                message: format!("Possible duplicate code block starting at line {line}"),
                value: None,
                threshold: None,
                duplicate_of: Some(first_line),
            });
        } else {
            seen.insert(digest, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tree_sitter::{Parser, Tree};

    fn parse(text: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        parser.parse(text, None).unwrap()
    }

    #[test]
    fn too_many_parameters_is_flagged() {
        let text = "def f(a, b, c, d, e, g):\n    return a\n";
        let tree = parse(text);
        let config = MetricsConfig::default();

        let smells = detect(tree.root_node(), text, &config);
        let hit = smells
            .iter()
            .find(|s| s.kind == SmellKind::TooManyParameters)
            .expect("expected parameter smell");
        assert_eq!(hit.name.as_deref(), Some("f"));
        assert_eq!(hit.value, Some(6));
    }

    #[test]
    fn long_function_is_flagged() {
        let mut text = String::from("def f():\n");
        for i in 0..60 {
            text.push_str(&format!("    x{i} = {i}\n"));
        }
        let tree = parse(&text);
        let config = MetricsConfig::default();

        let smells = detect(tree.root_node(), &text, &config);
        assert!(smells.iter().any(|s| s.kind == SmellKind::LongFunction));
    }

    #[test]
    fn complex_function_is_flagged() {
        let mut text = String::from("def f(x):\n");
        for i in 0..12 {
            text.push_str(&format!("    if x == {i}:\n        return {i}\n"));
        }
        let tree = parse(&text);
        let config = MetricsConfig::default();

        let smells = detect(tree.root_node(), &text, &config);
        assert!(smells.iter().any(|s| s.kind == SmellKind::ComplexFunction));
    }

    #[test]
    fn large_class_is_flagged() {
        let mut text = String::from("class Big:\n");
        for i in 0..25 {
            text.push_str(&format!("    def m{i}(self):\n        pass\n"));
        }
        let tree = parse(&text);
        let config = MetricsConfig::default();

        let smells = detect(tree.root_node(), &text, &config);
        let hit = smells
            .iter()
            .find(|s| s.kind == SmellKind::LargeClass)
            .expect("expected class smell");
        assert_eq!(hit.name.as_deref(), Some("Big"));
        assert_eq!(hit.value, Some(25));
    }

    #[test]
    fn duplicate_blocks_report_first_occurrence() {
        let block = "a = 1\nb = 2\nc = 3\nd = 4\ne = 5\n";
        let text = format!("{block}x = 0\n{block}");

        let smells = detect_text_only(&text);
        let duplicates: Vec<_> = smells
            .iter()
            .filter(|s| s.kind == SmellKind::DuplicateCode)
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].line, 7);
        assert_eq!(duplicates[0].duplicate_of, Some(1));
    }

    #[test]
    fn short_text_has_no_duplicates() {
        let smells = detect_text_only("a = 1\nb = 2\n");
        assert!(smells.is_empty());
    }
}
