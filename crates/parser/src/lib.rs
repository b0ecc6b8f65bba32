//! # Codescope Bounded Parser
//!
//! Turns raw Python source bytes into a tree-sitter syntax tree under
//! explicit resource ceilings: a pre-read size guard, a process-memory guard,
//! a decode ladder, and a hard wall-clock timeout on an isolated blocking
//! worker.
//!
//! The parser never fails outward. Every outcome — including total failure —
//! is expressed as a [`ParseOutcome`] carrying structured [`ErrorReport`]s,
//! which the caller merges into a per-run [`ErrorLog`]. Failure kinds with a
//! recovery rung are retried once:
//!
//! - syntax failure → line-by-line re-validation, invalid lines replaced with
//!   a neutral comment placeholder, one re-parse of the reconstruction
//! - decode failure → lossy replacement decoding
//! - memory-guard failure → truncate to the first 1000 lines and retry
//!
//! Timeouts have no recovery rung: the blocking worker is abandoned rather
//! than cancelled (the thread runs to completion in the background; bounded
//! by process lifetime).

mod error;
mod limits;
mod parser;
mod recovery;
mod report;

pub use error::{ParserError, Result};
pub use limits::{MemoryStatus, ParseLimits};
pub use parser::{parse_source, BoundedParser, ParseDisposition, ParseOutcome, ParsedFile};
pub use report::{ErrorKind, ErrorLog, ErrorReport, ErrorSummary, Severity};
