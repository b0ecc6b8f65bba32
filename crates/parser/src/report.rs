use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

/// Reports kept verbatim in a summary sample; the rest are counted only.
const SUMMARY_SAMPLE_CAP: usize = 100;

/// Classification of a per-file failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// File exceeded the size ceiling before any read (pre-emptive skip)
    FileTooLarge,
    /// Process memory exceeded the effective limit
    MemoryLimit,
    /// Source bytes were not cleanly decodable
    Encoding,
    /// The syntax tree contained error nodes
    Syntax,
    /// Wall-clock parse timeout; the worker was abandoned
    Timeout,
    /// Filesystem error while reading the file
    Io,
    /// Worker panic or grammar failure
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileTooLarge => "file_too_large",
            Self::MemoryLimit => "memory_limit",
            Self::Encoding => "encoding",
            Self::Syntax => "syntax",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

/// How bad a report is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The file was handled, with caveats (skip, lossy decode, repaired syntax)
    Warning,
    /// The file was lost after an attempt
    Error,
    /// Resource-limit breach
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// One structured failure record, accumulated per run and never thrown past
/// the owning file's boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub file_path: String,
    pub kind: ErrorKind,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub snippet: Option<String>,
    pub severity: Severity,
    pub timestamp: u64,
}

impl ErrorReport {
    pub fn new(
        file_path: impl Into<String>,
        kind: ErrorKind,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            kind,
            message: message.into(),
            line: None,
            column: None,
            snippet: None,
            severity,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Builder: attach a source location
    #[must_use]
    pub const fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Builder: attach the offending source line
    #[must_use]
    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Per-run accumulator of error reports
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorLog {
    reports: Vec<ErrorReport>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: ErrorReport) {
        self.reports.push(report);
    }

    pub fn extend(&mut self, reports: impl IntoIterator<Item = ErrorReport>) {
        self.reports.extend(reports);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    #[must_use]
    pub fn reports(&self) -> &[ErrorReport] {
        &self.reports
    }

    /// Aggregate view for run summaries and persisted state.
    #[must_use]
    pub fn summary(&self) -> ErrorSummary {
        let mut by_kind: HashMap<String, usize> = HashMap::new();
        let mut by_severity: HashMap<String, usize> = HashMap::new();
        let mut failed_files: BTreeSet<String> = BTreeSet::new();

        for report in &self.reports {
            *by_kind.entry(report.kind.as_str().to_string()).or_insert(0) += 1;
            *by_severity
                .entry(report.severity.as_str().to_string())
                .or_insert(0) += 1;
            failed_files.insert(report.file_path.clone());
        }

        ErrorSummary {
            total: self.reports.len(),
            by_kind,
            by_severity,
            failed_files: failed_files.into_iter().collect(),
            sample: self
                .reports
                .iter()
                .take(SUMMARY_SAMPLE_CAP)
                .cloned()
                .collect(),
        }
    }
}

/// Aggregated error counts for reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total: usize,
    pub by_kind: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    /// Distinct files that produced at least one report, sorted
    pub failed_files: Vec<String>,
    /// Capped sample of the raw reports
    pub sample: Vec<ErrorReport>,
}
