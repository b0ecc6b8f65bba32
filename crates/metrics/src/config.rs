use crate::types::FindingSeverity;
use serde::{Deserialize, Serialize};

/// Thresholds and extensions for metric analysis. All values are
/// configuration-supplied; the defaults here are the documented ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Per-function cyclomatic complexity above this is a smell
    pub cyclomatic_threshold: u32,

    /// Function body lines above this is a smell
    pub lines_per_function_threshold: usize,

    /// Function parameters above this is a smell
    pub parameters_threshold: usize,

    /// Methods per class above this is a smell
    pub methods_per_class_threshold: usize,

    /// Additional security patterns appended to the built-in set
    pub custom_security_patterns: Vec<CustomPattern>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            cyclomatic_threshold: 10,
            lines_per_function_threshold: 50,
            parameters_threshold: 5,
            methods_per_class_threshold: 20,
            custom_security_patterns: Vec::new(),
        }
    }
}

/// A user-supplied security pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    pub regex: String,
    pub message: String,
    pub severity: FindingSeverity,
}
