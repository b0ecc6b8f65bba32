use crate::config::Config;
use crate::testgen::TestSkeleton;
use codescope_metrics::MetricsSnapshot;
use codescope_parser::ErrorSummary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted snapshot format version
pub const STATE_FORMAT_VERSION: &str = "1";

/// Kind of analyzed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    File,
    Class,
    Function,
    AsyncFunction,
    Method,
}

impl UnitKind {
    /// Identity-key prefix for this kind
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "func",
            Self::AsyncFunction => "async_func",
            Self::Method => "method",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
            Self::AsyncFunction => "async function",
            Self::Method => "method",
        }
    }
}

/// One analyzed entity (file, class, function, async function, or method)
/// and all of its computed facts. Owned exclusively by the [`crate::CodeGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUnit {
    /// Identity key: file path + mtime for files, plus declaring name and
    /// start line for nested constructs. Deterministic for unchanged input,
    /// distinct after edits.
    pub id: String,

    pub kind: UnitKind,

    /// Immutable source text of the unit
    pub source: String,

    /// SHA-256 of the source text
    pub content_hash: String,

    /// Human-readable purpose label (e.g. "Function: add")
    pub purpose: String,

    pub file_path: String,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,

    pub metrics: MetricsSnapshot,

    /// Generated pytest skeletons (template-based satellite output)
    pub test_skeletons: Vec<TestSkeleton>,

    pub embedding: Option<Vec<f32>>,

    pub created_at: u64,
    pub updated_at: u64,

    pub parent_id: Option<String>,
    pub child_ids: Vec<String>,

    pub tags: Vec<String>,

    /// Extracted docstring, when present
    pub documentation: Option<String>,
}

impl CodeUnit {
    /// Per-unit quality score in [0, 1]: maintainability scaled down by
    /// multiplicative penalties per critical security finding and per smell.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        let critical = self
            .metrics
            .security_findings
            .iter()
            .filter(|f| f.severity == codescope_metrics::FindingSeverity::Critical)
            .count() as u32;
        let smells = self.metrics.code_smells.len() as u32;

        let score = (self.metrics.maintainability_index / 100.0)
            * 0.85f64.powi(critical as i32)
            * 0.95f64.powi(smells as i32);
        score.clamp(0.0, 1.0)
    }
}

/// Result of one `analyze_project` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub project_path: String,

    pub files_analyzed: usize,
    pub files_failed: usize,
    /// Oversized files skipped pre-emptively; its own bucket, never counted
    /// as failed
    pub files_skipped: usize,

    pub nodes_created: usize,
    pub edges_created: usize,

    pub duration_ms: u64,
    pub timestamp: u64,

    pub aggregate: SummaryAggregate,
}

/// Whole-graph aggregate metrics block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryAggregate {
    pub total_files: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_loc: usize,
    pub average_complexity: f64,
    pub average_quality_score: f64,
    pub security_issue_count: usize,
    pub code_smell_count: usize,
    pub distinct_dependency_count: usize,
}

/// Per-unit quality report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub unit_id: String,
    pub purpose: String,
    pub quality_score: f64,
    pub metrics: MetricsSnapshot,
    pub has_documentation: bool,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub child_count: usize,
    /// Top similar units (id, cosine score)
    pub similar_units: Vec<(String, f32)>,
}

/// The full persisted snapshot. Node records are kept as raw JSON values so
/// a single malformed record can be skipped on load instead of failing the
/// whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphState {
    pub version: String,
    pub timestamp: u64,

    /// The configuration active when the state was saved (informational;
    /// loading does not replace the running configuration)
    pub config: Config,

    pub nodes: serde_json::Map<String, serde_json::Value>,
    pub edges: HashMap<String, Vec<String>>,
    pub file_registry: HashMap<String, Vec<String>>,
    pub history: Vec<RunSummary>,
    pub error_summary: ErrorSummary,
}
