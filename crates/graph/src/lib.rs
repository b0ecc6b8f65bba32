//! # Codescope Graph
//!
//! The orchestrating component: walks a project tree, runs each file through
//! cache lookup → bounded parse → metric analysis → unit extraction →
//! embedding, and owns the resulting code graph (nodes, edges, file
//! registry, run history).
//!
//! ## Pipeline
//!
//! ```text
//! analyze_project(root)
//!     │
//!     ├──> FileScanner: sorted .py files, exclusions applied
//!     │
//!     ├──> per file (bounded worker pool or sequential, time-boxed):
//!     │    ├─> content hash → CacheStore lookup (hit: restore units)
//!     │    ├─> BoundedParser (guards + recovery)
//!     │    ├─> MetricsAnalyzer on the whole file
//!     │    ├─> recursive extraction of classes/functions/methods,
//!     │    │   each independently scored, embedded, and test-skeletoned
//!     │    └─> CacheStore store
//!     │
//!     ├──> single-writer merge of worker results into node/edge tables
//!     ├──> dependency pass (textual import/call matching, best-effort)
//!     ├──> optional interval auto-save
//!     └──> RunSummary appended to bounded history
//! ```
//!
//! Workers return results by value; one coordinating task merges them, so
//! the shared tables are never written concurrently. A single file's
//! failure or timeout is recorded and counted, never aborts the run.

mod config;
mod error;
mod extract;
mod graph;
mod persist;
mod scanner;
mod testgen;
mod types;

pub use config::{AnalysisConfig, Config, PersistenceConfig};
pub use error::{GraphError, Result};
pub use graph::CodeGraph;
pub use testgen::TestSkeleton;
pub use types::{
    CodeUnit, GraphState, QualityReport, RunSummary, SummaryAggregate, UnitKind,
    STATE_FORMAT_VERSION,
};
