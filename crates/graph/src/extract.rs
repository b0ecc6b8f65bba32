use crate::types::UnitKind;
use tree_sitter::{Node, Tree};

/// A class/function/method found in a file's tree, ready to be materialized
/// into a [`crate::CodeUnit`].
pub(crate) struct ExtractedElement {
    pub kind: UnitKind,
    pub name: String,
    /// `Class.method` for methods, otherwise the bare name
    pub qualified: String,
    /// Dedented source text of the element
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
    pub tags: Vec<String>,
    pub docstring: Option<String>,
    /// Index of the owning class element, for methods
    pub parent: Option<usize>,
    pub params: Vec<String>,
    /// Direct public sync methods, for classes
    pub public_methods: Vec<String>,
    pub has_exception_handling: bool,
}

/// Recursively extract classes, functions, async functions, and methods.
/// Methods are the sync `def`s directly inside a class body; `async def`
/// anywhere is an async-function unit in its own right.
pub(crate) fn extract_elements(tree: &Tree, text: &str) -> Vec<ExtractedElement> {
    let mut out = Vec::new();
    visit(tree.root_node(), text, None, &mut out);
    out
}

/// Docstring of the module itself (first statement string literal).
pub(crate) fn module_docstring(tree: &Tree, text: &str) -> Option<String> {
    first_statement_string(tree.root_node(), text)
}

fn visit(node: Node, text: &str, class_ctx: Option<(&str, usize)>, out: &mut Vec<ExtractedElement>) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();

    for child in children {
        let (def_node, decorators) = unwrap_decorated(child, text);
        match def_node.kind() {
            "class_definition" => {
                let idx = push_class(def_node, text, out);
                let class_name = out[idx].name.clone();
                if let Some(body) = def_node.child_by_field_name("body") {
                    visit(body, text, Some((&class_name, idx)), out);
                }
            }
            "function_definition" => {
                push_function(def_node, text, &decorators, class_ctx, out);
                // Nested definitions live in the body; the surrounding class
                // context does not extend past one level
                if let Some(body) = def_node.child_by_field_name("body") {
                    visit(body, text, None, out);
                }
            }
            _ => visit(child, text, None, out),
        }
    }
}

fn push_class(node: Node, text: &str, out: &mut Vec<ExtractedElement>) -> usize {
    let name = field_text(node, "name", text).unwrap_or_else(|| "anonymous".to_string());

    let mut public_methods = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.children(&mut cursor) {
            let (def_node, _) = unwrap_decorated(item, text);
            if def_node.kind() == "function_definition" && !is_async(def_node) {
                if let Some(method_name) = field_text(def_node, "name", text) {
                    if !method_name.starts_with('_') {
                        public_methods.push(method_name);
                    }
                }
            }
        }
    }

    out.push(ExtractedElement {
        kind: UnitKind::Class,
        qualified: name.clone(),
        text: dedent(node_text(node, text)),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        tags: vec!["class".to_string()],
        docstring: first_statement_string_of_body(node, text),
        parent: None,
        params: Vec::new(),
        public_methods,
        has_exception_handling: false,
        name,
    });
    out.len() - 1
}

fn push_function(
    node: Node,
    text: &str,
    decorators: &[String],
    class_ctx: Option<(&str, usize)>,
    out: &mut Vec<ExtractedElement>,
) {
    let Some(name) = field_text(node, "name", text) else {
        return;
    };
    let asynchronous = is_async(node);

    let (kind, qualified, tags, parent) = if asynchronous {
        (
            UnitKind::AsyncFunction,
            name.clone(),
            vec!["async".to_string(), "function".to_string()],
            None,
        )
    } else if let Some((class_name, class_idx)) = class_ctx {
        let mut tags = vec!["method".to_string()];
        if name.starts_with("__") && name.ends_with("__") {
            tags.push("magic".to_string());
        } else if name.starts_with('_') {
            tags.push("private".to_string());
        } else {
            tags.push("public".to_string());
        }
        if decorators.iter().any(|d| d == "staticmethod") {
            tags.push("static".to_string());
        } else if decorators.iter().any(|d| d == "classmethod") {
            tags.push("classmethod".to_string());
        }
        (
            UnitKind::Method,
            format!("{class_name}.{name}"),
            tags,
            Some(class_idx),
        )
    } else {
        (
            UnitKind::Function,
            name.clone(),
            vec!["function".to_string()],
            None,
        )
    };

    out.push(ExtractedElement {
        kind,
        qualified,
        text: dedent(node_text(node, text)),
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
        tags,
        docstring: first_statement_string_of_body(node, text),
        parent,
        params: parameter_names(node, text),
        public_methods: Vec::new(),
        has_exception_handling: subtree_handles_exceptions(node),
        name,
    });
}

fn unwrap_decorated<'a>(node: Node<'a>, text: &str) -> (Node<'a>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }

    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "decorator" {
            decorators.push(
                node_text(child, text)
                    .trim_start_matches('@')
                    .trim()
                    .to_string(),
            );
        }
    }

    let definition = node.child_by_field_name("definition").unwrap_or(node);
    (definition, decorators)
}

fn is_async(node: Node) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).any(|c| c.kind() == "async");
    result
}

fn parameter_names(node: Node, text: &str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() == "identifier" {
            names.push(node_text(param, text).to_string());
        } else if let Some(ident) = first_identifier(param) {
            names.push(node_text(ident, text).to_string());
        }
    }
    names
}

fn first_identifier(node: Node) -> Option<Node> {
    if node.kind() == "identifier" {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children {
        if let Some(found) = first_identifier(child) {
            return Some(found);
        }
    }
    None
}

fn subtree_handles_exceptions(node: Node) -> bool {
    if matches!(node.kind(), "try_statement" | "raise_statement") {
        return true;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().any(subtree_handles_exceptions)
}

fn first_statement_string_of_body(node: Node, text: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    first_statement_string(body, text)
}

fn first_statement_string(block: Node, text: &str) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" {
        return None;
    }
    let raw = node_text(expr, text);
    let stripped = raw
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

fn field_text(node: Node, field: &str, text: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, text).to_string())
}

fn node_text<'a>(node: Node, text: &'a str) -> &'a str {
    text.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Strip the common leading whitespace so nested constructs re-parse
/// cleanly on their own.
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    if indent == 0 {
        return text.to_string();
    }

    text.lines()
        .map(|l| if l.len() >= indent { &l[indent..] } else { "" })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use codescope_parser::parse_source;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> Vec<ExtractedElement> {
        let tree = parse_source(text).unwrap();
        extract_elements(&tree, text)
    }

    #[test]
    fn extracts_function_class_and_methods() {
        let text = r#"
def helper(x):
    return x

class Service:
    """Runs things."""

    def start(self):
        pass

    def _internal(self):
        pass

async def fetch(url):
    return url
"#;
        let elements = extract(text);
        let kinds: Vec<_> = elements.iter().map(|e| (e.kind, e.name.as_str())).collect();

        assert!(kinds.contains(&(UnitKind::Function, "helper")));
        assert!(kinds.contains(&(UnitKind::Class, "Service")));
        assert!(kinds.contains(&(UnitKind::Method, "start")));
        assert!(kinds.contains(&(UnitKind::Method, "_internal")));
        assert!(kinds.contains(&(UnitKind::AsyncFunction, "fetch")));
    }

    #[test]
    fn methods_are_qualified_and_parented() {
        let text = "class A:\n    def go(self):\n        pass\n";
        let elements = extract(text);

        let class_idx = elements.iter().position(|e| e.kind == UnitKind::Class).unwrap();
        let method = elements.iter().find(|e| e.kind == UnitKind::Method).unwrap();
        assert_eq!(method.qualified, "A.go");
        assert_eq!(method.parent, Some(class_idx));
        assert!(method.tags.contains(&"public".to_string()));
    }

    #[test]
    fn magic_and_private_methods_are_tagged() {
        let text = "class A:\n    def __init__(self):\n        pass\n    def _hide(self):\n        pass\n";
        let elements = extract(text);

        let init = elements.iter().find(|e| e.name == "__init__").unwrap();
        assert!(init.tags.contains(&"magic".to_string()));

        let hidden = elements.iter().find(|e| e.name == "_hide").unwrap();
        assert!(hidden.tags.contains(&"private".to_string()));
    }

    #[test]
    fn static_decorator_is_tagged() {
        let text = "class A:\n    @staticmethod\n    def util():\n        pass\n";
        let elements = extract(text);

        let util = elements.iter().find(|e| e.name == "util").unwrap();
        assert!(util.tags.contains(&"static".to_string()));
    }

    #[test]
    fn public_methods_exclude_private_and_async() {
        let text = "\
class A:
    def visible(self):
        pass
    def _hidden(self):
        pass
    async def later(self):
        pass
";
        let elements = extract(text);
        let class = elements.iter().find(|e| e.kind == UnitKind::Class).unwrap();
        assert_eq!(class.public_methods, vec!["visible"]);
    }

    #[test]
    fn docstrings_are_extracted_and_unquoted() {
        let text = "def f():\n    \"\"\"Does a thing.\"\"\"\n    pass\n";
        let elements = extract(text);
        assert_eq!(elements[0].docstring.as_deref(), Some("Does a thing."));
    }

    #[test]
    fn module_docstring_is_found() {
        let text = "\"\"\"Top-level doc.\"\"\"\nx = 1\n";
        let tree = parse_source(text).unwrap();
        assert_eq!(
            module_docstring(&tree, text).as_deref(),
            Some("Top-level doc.")
        );
        assert!(module_docstring(&parse_source("x = 1\n").unwrap(), "x = 1\n").is_none());
    }

    #[test]
    fn nested_functions_are_extracted_without_class_context() {
        let text = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let elements = extract(text);
        let names: Vec<_> = elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["outer", "inner"]);
        assert!(elements.iter().all(|e| e.kind == UnitKind::Function));
    }

    #[test]
    fn method_text_is_dedented() {
        let text = "class A:\n    def go(self):\n        return 1\n";
        let elements = extract(text);
        let method = elements.iter().find(|e| e.kind == UnitKind::Method).unwrap();
        assert!(method.text.starts_with("def go(self):"));
        // Dedented text re-parses cleanly
        let reparsed = parse_source(&method.text).unwrap();
        assert!(!reparsed.root_node().has_error());
    }

    #[test]
    fn exception_handling_is_detected() {
        let with_try = extract("def f():\n    try:\n        pass\n    except ValueError:\n        pass\n");
        assert!(with_try[0].has_exception_handling);

        let without = extract("def g():\n    return 1\n");
        assert!(!without[0].has_exception_handling);
    }

    #[test]
    fn functions_inside_if_blocks_are_found() {
        let text = "if True:\n    def conditional():\n        pass\n";
        let elements = extract(text);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].name, "conditional");
    }
}
