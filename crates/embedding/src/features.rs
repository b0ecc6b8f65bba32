use codescope_metrics::{classify, NodeClass};
use std::collections::HashSet;
use tree_sitter::{Node, Tree};

/// The ten dominant syntactic node categories, in feature order
const DOMINANT_CLASSES: [NodeClass; 10] = [
    NodeClass::FunctionDef,
    NodeClass::ClassDef,
    NodeClass::If,
    NodeClass::For,
    NodeClass::While,
    NodeClass::Import,
    NodeClass::Assign,
    NodeClass::Call,
    NodeClass::Return,
    NodeClass::Try,
];

/// Structural feature slots contributed by the tree (zero-filled without one)
const STRUCTURAL_SLOTS: usize = DOMINANT_CLASSES.len() + 3;

/// Compose the raw feature vector: lexical, structural, stylistic.
#[must_use]
pub(crate) fn feature_vector(text: &str, tree: Option<&Tree>) -> Vec<f32> {
    let mut features = Vec::with_capacity(6 + STRUCTURAL_SLOTS + 6);

    // Lexical features
    let lines: Vec<&str> = text.split('\n').collect();
    #[allow(clippy::cast_precision_loss)]
    {
        features.push(text.len() as f32);
        features.push(lines.len() as f32);
        features.push(lines.iter().filter(|l| !l.trim().is_empty()).count() as f32);
        features.push(
            text.matches(' ').count() as f32 / text.len().max(1) as f32,
        );
        features.push(text.matches('\t').count() as f32);
        features.push(
            lines
                .iter()
                .filter(|l| l.trim_start().starts_with('#'))
                .count() as f32,
        );
    }

    // Structural features
    if let Some(tree) = tree {
        features.extend(structural_features(tree, text));
    } else {
        features.extend(std::iter::repeat(0.0).take(STRUCTURAL_SLOTS));
    }

    // Stylistic flags
    for needle in ["class", "def", "import", "__name__", "try", "raise"] {
        features.push(if text.contains(needle) { 1.0 } else { 0.0 });
    }

    features
}

fn structural_features(tree: &Tree, text: &str) -> Vec<f32> {
    let mut class_counts = [0usize; DOMINANT_CLASSES.len()];
    let mut total_nodes = 0usize;
    let mut identifiers: HashSet<String> = HashSet::new();

    walk(tree.root_node(), &mut |node| {
        total_nodes += 1;
        let class = classify(node.kind());
        if let Some(slot) = DOMINANT_CLASSES.iter().position(|c| *c == class) {
            class_counts[slot] += 1;
        }
        if class == NodeClass::Identifier {
            if let Some(name) = text.get(node.start_byte()..node.end_byte()) {
                identifiers.insert(name.to_string());
            }
        }
    });

    let mut features = Vec::with_capacity(STRUCTURAL_SLOTS);
    #[allow(clippy::cast_precision_loss)]
    {
        for count in class_counts {
            features.push(count as f32 / total_nodes.max(1) as f32);
        }
        features.push(max_depth(tree.root_node(), 1) as f32);
        features.push(total_nodes as f32);
        features.push(identifiers.len() as f32);
    }
    features
}

fn walk<'a>(node: Node<'a>, f: &mut impl FnMut(Node<'a>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, f);
    }
}

fn max_depth(node: Node, depth: usize) -> usize {
    let mut max = depth;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        max = max.max(max_depth(child, depth + 1));
    }
    max
}
