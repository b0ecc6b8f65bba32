use crate::node_class::{classify, walk_tree, NodeClass};
use tree_sitter::Node;

/// Cyclomatic complexity of a subtree: 1 + one per branch construct.
///
/// `and`/`or` are binary in this grammar, so each `boolean_operator` node
/// contributes exactly one (a chain of n operands nests n-1 nodes, matching
/// the operand-count-minus-one rule). Each comprehension filter clause
/// contributes one.
#[must_use]
pub fn cyclomatic(node: Node) -> u32 {
    let mut complexity = 1u32;
    walk_tree(node, &mut |n| {
        match classify(n.kind()) {
            NodeClass::If
            | NodeClass::Elif
            | NodeClass::While
            | NodeClass::For
            | NodeClass::Except
            | NodeClass::With
            | NodeClass::Assert
            | NodeClass::Raise
            | NodeClass::BoolOp
            | NodeClass::ComprehensionIf => complexity += 1,
            _ => {}
        }
    });
    complexity
}

/// Cognitive complexity: each conditional/loop/exception handler costs
/// 1 + its nesting depth and deepens the nesting for its body; boolean
/// operators cost one per node; lambdas cost a flat one.
#[must_use]
pub fn cognitive(node: Node) -> u32 {
    fn visit(node: Node, depth: u32, total: &mut u32) {
        let class = classify(node.kind());
        let child_depth = match class {
            NodeClass::If
            | NodeClass::Elif
            | NodeClass::While
            | NodeClass::For
            | NodeClass::Except => {
                *total += 1 + depth;
                depth + 1
            }
            NodeClass::BoolOp | NodeClass::Lambda => {
                *total += 1;
                depth
            }
            _ => depth,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            visit(child, child_depth, total);
        }
    }

    let mut total = 0;
    visit(node, 0, &mut total);
    total
}

/// Maximum nesting depth across conditional/loop/context/exception blocks.
#[must_use]
pub fn max_nesting(node: Node) -> u32 {
    fn visit(node: Node, depth: u32, max: &mut u32) {
        let child_depth = match classify(node.kind()) {
            NodeClass::If
            | NodeClass::Elif
            | NodeClass::For
            | NodeClass::While
            | NodeClass::With
            | NodeClass::Try => {
                let entered = depth + 1;
                *max = (*max).max(entered);
                entered
            }
            _ => depth,
        };

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            visit(child, child_depth, max);
        }
    }

    let mut max = 0;
    visit(node, 0, &mut max);
    max
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
    fn straight_line_code_is_cyclomatic_one() {
        let tree = parse("def add(a, b):\n    return a + b\n");
        assert_eq!(cyclomatic(tree.root_node()), 1);
    }

    #[test]
    fn branches_add_one_each() {
        let source = "\
if a:
    pass
elif b:
    pass
for i in xs:
    while c:
        pass
";
        // if + elif + for + while
        let tree = parse(source);
        assert_eq!(cyclomatic(tree.root_node()), 5);
    }

    #[test]
    fn boolean_chain_counts_operands_minus_one() {
        let tree = parse("x = a and b and c\n");
        // two boolean_operator nodes for three operands
        assert_eq!(cyclomatic(tree.root_node()), 3);
    }

    #[test]
    fn comprehension_filters_count() {
        let tree = parse("ys = [x for x in xs if x > 0 if x < 9]\n");
        assert_eq!(cyclomatic(tree.root_node()), 3);
    }

    #[test]
    fn cognitive_weights_nesting() {
        let flat = parse("if a:\n    pass\nif b:\n    pass\n");
        assert_eq!(cognitive(flat.root_node()), 2);

        let nested = parse("if a:\n    if b:\n        pass\n");
        // outer 1 + inner (1 + depth 1) = 3
        assert_eq!(cognitive(nested.root_node()), 3);
    }

    #[test]
    fn lambda_costs_flat_one() {
        let tree = parse("f = lambda x: x + 1\n");
        assert_eq!(cognitive(tree.root_node()), 1);
    }

    #[test]
    fn nesting_depth_counts_blocks() {
        let tree = parse("if a:\n    for i in xs:\n        with open(p) as f:\n            pass\n");
        assert_eq!(max_nesting(tree.root_node()), 3);

        let flat = parse("x = 1\ny = 2\n");
        assert_eq!(max_nesting(flat.root_node()), 0);
    }
}
