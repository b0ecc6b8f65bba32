use crate::complexity;
use crate::config::MetricsConfig;
use crate::halstead;
use crate::node_class::{classify, node_text, walk_tree, NodeClass};
use crate::security::SecurityScanner;
use crate::smells;
use crate::types::MetricsSnapshot;
use tree_sitter::{Node, Tree};

/// Computes a full [`MetricsSnapshot`] for a text and its optional syntax
/// tree. Pure and infallible: a missing tree zeroes the structural fields
/// while line-derived metrics and security findings still apply.
pub struct MetricsAnalyzer {
    config: MetricsConfig,
    security: SecurityScanner,
}

impl MetricsAnalyzer {
    #[must_use]
    pub fn new(config: MetricsConfig) -> Self {
        let security = SecurityScanner::new(&config.custom_security_patterns);
        Self { config, security }
    }

    /// Analyze a text (+ optional tree) into an immutable snapshot.
    #[must_use]
    pub fn analyze(&self, text: &str, tree: Option<&Tree>) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        // Line metrics always derive from raw text
        let lines: Vec<&str> = text.split('\n').collect();
        snapshot.lines_of_code = lines.len();
        snapshot.blank_lines = lines.iter().filter(|l| l.trim().is_empty()).count();
        snapshot.comment_lines = lines
            .iter()
            .filter(|l| l.trim_start().starts_with('#'))
            .count();
        snapshot.logical_lines = snapshot
            .lines_of_code
            .saturating_sub(snapshot.blank_lines)
            .saturating_sub(snapshot.comment_lines);
        if snapshot.lines_of_code > 0 {
            #[allow(clippy::cast_precision_loss)]
            {
                snapshot.comment_ratio =
                    snapshot.comment_lines as f64 / snapshot.lines_of_code as f64;
            }
        }

        if let Some(tree) = tree {
            let root = tree.root_node();
            snapshot.cyclomatic_complexity = complexity::cyclomatic(root);
            snapshot.cognitive_complexity = complexity::cognitive(root);
            snapshot.max_nesting_depth = complexity::max_nesting(root);
            snapshot.halstead = halstead::halstead(root, text);

            walk_tree(root, &mut |node| match classify(node.kind()) {
                NodeClass::FunctionDef => snapshot.function_count += 1,
                NodeClass::ClassDef => snapshot.class_count += 1,
                NodeClass::Import => {
                    snapshot.dependencies.extend(extract_imports(node, text));
                }
                _ => {}
            });

            snapshot.code_smells = smells::detect(root, text, &self.config);
        } else {
            snapshot.code_smells = smells::detect_text_only(text);
        }

        snapshot.security_findings = self.security.scan(text);
        snapshot.maintainability_index = maintainability_index(&snapshot);

        snapshot
    }
}

/// Microsoft maintainability index with a comment-ratio bonus, clamped to
/// [0, 100].
fn maintainability_index(snapshot: &MetricsSnapshot) -> f64 {
    let mut mi = 171.0;

    let volume = snapshot.halstead.volume;
    if volume > 0.0 {
        mi -= 5.2 * volume.ln();
    }

    mi -= 0.23 * f64::from(snapshot.cyclomatic_complexity);

    #[allow(clippy::cast_precision_loss)]
    let logical = snapshot.logical_lines.max(1) as f64;
    mi -= 16.2 * logical.ln();

    mi += snapshot.comment_ratio * 50.0;

    mi.clamp(0.0, 100.0)
}

/// Imported module names from an import node.
fn extract_imports(node: Node, text: &str) -> Vec<String> {
    let mut modules = Vec::new();

    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => modules.push(node_text(child, text).to_string()),
                    "aliased_import" => {
                        if let Some(name) = child.child_by_field_name("name") {
                            modules.push(node_text(name, text).to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                modules.push(node_text(module, text).to_string());
            }
        }
        _ => {}
    }

    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tree_sitter::Parser;

    fn parse(text: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        parser.parse(text, None).unwrap()
    }

    fn analyzer() -> MetricsAnalyzer {
        MetricsAnalyzer::new(MetricsConfig::default())
    }

    #[test]
    fn simple_function_scenario() {
        let text = "def add(a, b):\n    return a + b\n";
        let tree = parse(text);
        let snapshot = analyzer().analyze(text, Some(&tree));

        assert_eq!(snapshot.cyclomatic_complexity, 1);
        assert_eq!(snapshot.function_count, 1);
        assert_eq!(snapshot.class_count, 0);
        assert!(snapshot.security_findings.is_empty());
    }

    #[test]
    fn cyclomatic_is_at_least_one_for_valid_input() {
        for text in ["", "x = 1\n", "def f():\n    pass\n"] {
            let tree = parse(text);
            let snapshot = analyzer().analyze(text, Some(&tree));
            assert!(snapshot.cyclomatic_complexity >= 1, "input: {text:?}");
        }
    }

    #[test]
    fn maintainability_is_always_in_range() {
        let long = "def f(a):\n    if a:\n        return a\n".repeat(200);
        let inputs = ["", "x = 1\n", "# only a comment\n", long.as_str()];
        for text in inputs {
            let tree = parse(text);
            let snapshot = analyzer().analyze(text, Some(&tree));
            assert!(
                (0.0..=100.0).contains(&snapshot.maintainability_index),
                "out of range for {} bytes",
                text.len()
            );
        }
    }

    #[test]
    fn maintainability_in_range_without_tree() {
        let snapshot = analyzer().analyze("", None);
        assert!((0.0..=100.0).contains(&snapshot.maintainability_index));
        assert_eq!(snapshot.cyclomatic_complexity, 0);
    }

    #[test]
    fn missing_tree_zeroes_structural_fields_only() {
        let text = "# comment\n\neval(x)\n";
        let snapshot = analyzer().analyze(text, None);

        assert_eq!(snapshot.cyclomatic_complexity, 0);
        assert_eq!(snapshot.function_count, 0);
        assert_eq!(snapshot.lines_of_code, 4);
        assert_eq!(snapshot.comment_lines, 1);
        assert_eq!(snapshot.blank_lines, 2);
        assert_eq!(snapshot.security_findings.len(), 1);
    }

    #[test]
    fn eval_scenario_reports_critical_with_line() {
        let text = "import os\n\nresult = eval(user_input)\n";
        let tree = parse(text);
        let snapshot = analyzer().analyze(text, Some(&tree));

        assert_eq!(snapshot.security_findings.len(), 1);
        let finding = &snapshot.security_findings[0];
        assert_eq!(finding.severity.as_str(), "critical");
        assert_eq!(finding.line, 3);
    }

    #[test]
    fn imports_are_collected() {
        let text = "import os\nimport sys as system\nfrom pathlib import Path\n";
        let tree = parse(text);
        let snapshot = analyzer().analyze(text, Some(&tree));

        assert_eq!(snapshot.dependencies, vec!["os", "sys", "pathlib"]);
    }

    #[test]
    fn line_accounting_adds_up() {
        let text = "# header\n\ndef f():\n    pass\n";
        let tree = parse(text);
        let snapshot = analyzer().analyze(text, Some(&tree));

        assert_eq!(snapshot.lines_of_code, 5);
        assert_eq!(snapshot.comment_lines, 1);
        assert_eq!(snapshot.blank_lines, 2);
        assert_eq!(snapshot.logical_lines, 2);
        assert!((snapshot.comment_ratio - 0.2).abs() < 1e-9);
    }
}
