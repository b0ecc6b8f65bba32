use tree_sitter::Node;

/// Tagged classification of the tree-sitter Python node kinds the metrics
/// care about. Every metric is an explicit match over this closed set; node
/// kinds outside it are [`NodeClass::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    FunctionDef,
    ClassDef,
    If,
    /// `elif` arm of an `if` statement (its own branch point)
    Elif,
    For,
    While,
    Except,
    With,
    Try,
    Assert,
    Raise,
    /// `and` / `or` expression (binary in this grammar; chains nest)
    BoolOp,
    /// `if` filter clause inside a comprehension
    ComprehensionIf,
    Lambda,
    Call,
    Return,
    Import,
    Assign,
    Identifier,
    Literal,
    Other,
}

/// Classify a tree-sitter node kind string.
#[must_use]
pub fn classify(kind: &str) -> NodeClass {
    match kind {
        "function_definition" => NodeClass::FunctionDef,
        "class_definition" => NodeClass::ClassDef,
        "if_statement" => NodeClass::If,
        "elif_clause" => NodeClass::Elif,
        "for_statement" => NodeClass::For,
        "while_statement" => NodeClass::While,
        "except_clause" => NodeClass::Except,
        "with_statement" => NodeClass::With,
        "try_statement" => NodeClass::Try,
        "assert_statement" => NodeClass::Assert,
        "raise_statement" => NodeClass::Raise,
        "boolean_operator" => NodeClass::BoolOp,
        "if_clause" => NodeClass::ComprehensionIf,
        "lambda" => NodeClass::Lambda,
        "call" => NodeClass::Call,
        "return_statement" => NodeClass::Return,
        "import_statement" | "import_from_statement" => NodeClass::Import,
        "assignment" => NodeClass::Assign,
        "identifier" => NodeClass::Identifier,
        "integer" | "float" | "string" | "true" | "false" | "none" => NodeClass::Literal,
        _ => NodeClass::Other,
    }
}

/// Depth-first walk applying `f` to every node (including `node` itself).
pub(crate) fn walk_tree<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_tree(child, f);
    }
}

/// Slice the source text covered by a node.
pub(crate) fn node_text<'a>(node: Node, text: &'a str) -> &'a str {
    text.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_branch_kinds() {
        assert_eq!(classify("if_statement"), NodeClass::If);
        assert_eq!(classify("elif_clause"), NodeClass::Elif);
        assert_eq!(classify("while_statement"), NodeClass::While);
        assert_eq!(classify("except_clause"), NodeClass::Except);
        assert_eq!(classify("boolean_operator"), NodeClass::BoolOp);
        assert_eq!(classify("if_clause"), NodeClass::ComprehensionIf);
        assert_eq!(classify("binary_operator"), NodeClass::Other);
    }
}
