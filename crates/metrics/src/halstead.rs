use crate::node_class::{classify, node_text, walk_tree, NodeClass};
use crate::types::HalsteadMetrics;
use std::collections::HashSet;
use tree_sitter::Node;

/// Node kinds whose children carry operator tokens
const OPERATOR_PARENTS: &[&str] = &[
    "binary_operator",
    "boolean_operator",
    "comparison_operator",
    "unary_operator",
    "not_operator",
    "augmented_assignment",
];

/// Operator token kinds counted for Halstead
const OPERATOR_TOKENS: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "//", "<<", ">>", "|", "^", "&", "~", "@", "==", "!=", "<",
    "<=", ">", ">=", "<>", "and", "or", "not", "is", "in", "is not", "not in", "+=", "-=", "*=",
    "/=", "%=", "**=", "//=", "<<=", ">>=", "|=", "^=", "&=", "@=",
];

/// Count distinct/total operators and operands over a subtree and derive the
/// classical Halstead estimators. All values are zero when the vocabulary or
/// length is zero.
#[must_use]
pub fn halstead(node: Node, text: &str) -> HalsteadMetrics {
    let mut operators: HashSet<String> = HashSet::new();
    let mut operands: HashSet<String> = HashSet::new();
    let mut total_operators = 0usize;
    let mut total_operands = 0usize;

    walk_tree(node, &mut |n| {
        if OPERATOR_PARENTS.contains(&n.kind()) {
            let mut cursor = n.walk();
            for child in n.children(&mut cursor) {
                if OPERATOR_TOKENS.contains(&child.kind()) {
                    operators.insert(child.kind().to_string());
                    total_operators += 1;
                }
            }
            return;
        }

        match classify(n.kind()) {
            NodeClass::Identifier => {
                operands.insert(node_text(n, text).to_string());
                total_operands += 1;
            }
            NodeClass::Literal => {
                // Literal kinds are leaves except strings, whose children are
                // quote/content tokens we do not want to double count
                operands.insert(node_text(n, text).to_string());
                total_operands += 1;
            }
            _ => {}
        }
    });

    let n1 = operators.len();
    let n2 = operands.len();
    let vocabulary = n1 + n2;
    let length = total_operators + total_operands;

    if vocabulary == 0 || length == 0 {
        return HalsteadMetrics::default();
    }

    #[allow(clippy::cast_precision_loss)]
    let volume = length as f64 * (vocabulary as f64).log2();
    #[allow(clippy::cast_precision_loss)]
    let difficulty = if n2 > 0 {
        (n1 as f64 / 2.0) * (total_operands as f64 / n2 as f64)
    } else {
        0.0
    };
    let effort = volume * difficulty;

    HalsteadMetrics {
        vocabulary,
        length,
        volume,
        difficulty,
        effort,
        time: effort / 18.0,
        bugs: volume / 3000.0,
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
    fn counts_operators_and_operands() {
        let text = "x = a + b\ny = a + 1\n";
        let tree = parse(text);
        let h = halstead(tree.root_node(), text);

        // operators: "+" (twice); operands: x, a, b, y, a, 1
        assert_eq!(h.vocabulary, 1 + 5);
        assert_eq!(h.length, 2 + 6);
        assert!(h.volume > 0.0);
        assert!(h.difficulty > 0.0);
        assert!((h.time - h.effort / 18.0).abs() < 1e-9);
        assert!((h.bugs - h.volume / 3000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_text_is_all_zero() {
        let tree = parse("");
        let h = halstead(tree.root_node(), "");
        assert_eq!(h.vocabulary, 0);
        assert_eq!(h.length, 0);
        assert_eq!(h.volume, 0.0);
        assert_eq!(h.effort, 0.0);
    }

    #[test]
    fn comparison_and_boolean_operators_count() {
        let text = "ok = a < b and b <= c\n";
        let tree = parse(text);
        let h = halstead(tree.root_node(), text);
        // "<", "and", "<=" distinct operators
        assert!(h.vocabulary >= 3);
        assert!(h.length > 0);
    }
}
