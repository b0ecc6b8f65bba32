//! # Codescope Metrics
//!
//! Pure structural, complexity, security, and smell analysis over Python
//! source. The single entry point is [`MetricsAnalyzer::analyze`]:
//!
//! ```text
//! text + optional tree
//!     │
//!     ├──> Line metrics (always, from raw text)
//!     ├──> Complexity: cyclomatic, cognitive, max nesting
//!     ├──> Halstead: operator/operand counting
//!     ├──> Maintainability index (volume + complexity + size + comments)
//!     ├──> Security findings (regex patterns over raw text)
//!     └──> Code smells (thresholds + 5-line duplicate-block hashing)
//! ```
//!
//! `analyze` never fails: when the tree is absent (upstream parse failure)
//! every structural field defaults to zero while the line-derived metrics
//! still apply.
//!
//! The syntax tree is consumed through [`NodeClass`], a tagged classification
//! of tree-sitter node kinds, so every metric is an explicit match over a
//! closed variant set.

mod analyzer;
mod complexity;
mod config;
mod halstead;
mod node_class;
mod security;
mod smells;
mod types;

pub use analyzer::MetricsAnalyzer;
pub use config::{CustomPattern, MetricsConfig};
pub use node_class::{classify, NodeClass};
pub use security::SecurityScanner;
pub use types::{
    CodeSmell, FindingSeverity, HalsteadMetrics, MetricsSnapshot, SecurityFinding, SmellKind,
};
