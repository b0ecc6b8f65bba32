use serde::{Deserialize, Serialize};

/// Immutable metrics snapshot for one code unit's text (+ optional tree)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total lines (including blank and comment lines)
    pub lines_of_code: usize,

    /// Lines that are neither blank nor comments
    pub logical_lines: usize,

    pub comment_lines: usize,
    pub blank_lines: usize,

    /// comment_lines / lines_of_code
    pub comment_ratio: f64,

    /// 1 + one per branch construct; zero when no tree was available
    pub cyclomatic_complexity: u32,

    /// Nesting-weighted complexity; zero when no tree was available
    pub cognitive_complexity: u32,

    pub max_nesting_depth: u32,

    pub halstead: HalsteadMetrics,

    /// Composite 0-100 score; always within range
    pub maintainability_index: f64,

    pub security_findings: Vec<SecurityFinding>,
    pub code_smells: Vec<CodeSmell>,

    /// Imported module names, in source order (duplicates kept)
    pub dependencies: Vec<String>,

    pub function_count: usize,
    pub class_count: usize,
}

/// Classical operator/operand-derived size and effort estimators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HalsteadMetrics {
    pub vocabulary: usize,
    pub length: usize,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    /// Estimated implementation time, seconds (effort / 18)
    pub time: f64,
    /// Estimated delivered bugs (volume / 3000)
    pub bugs: f64,
}

/// Severity of a security finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
}

impl FindingSeverity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

/// One security pattern match in raw text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub severity: FindingSeverity,
    pub message: String,

    /// 1-based line of the match start
    pub line: usize,

    /// 0-based byte column within that line
    pub column: usize,

    /// Matched text, truncated to 100 bytes
    pub excerpt: String,

    /// Surrounding source lines (two either side)
    pub context: String,
}

/// Kind of code smell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmellKind {
    LongFunction,
    TooManyParameters,
    LargeClass,
    ComplexFunction,
    DuplicateCode,
}

/// One threshold breach or duplicate-block hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSmell {
    pub kind: SmellKind,

    /// Offending symbol, when the smell is symbol-scoped
    pub name: Option<String>,

    /// 1-based line of the offending construct
    pub line: usize,

    pub severity: String,
    pub message: String,

    /// Measured value and the threshold it breached
    pub value: Option<usize>,
    pub threshold: Option<usize>,

    /// For duplicate blocks: 1-based line of the first occurrence
    pub duplicate_of: Option<usize>,
}
