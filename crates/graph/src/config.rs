use crate::error::{GraphError, Result};
use codescope_cache_store::CacheConfig;
use codescope_embedding::EmbeddingConfig;
use codescope_metrics::MetricsConfig;
use codescope_parser::ParseLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable top-level configuration, passed by value into each component's
/// constructor. Loaded from TOML over serde defaults; no global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub metrics: MetricsConfig,
    pub embedding: EmbeddingConfig,
    pub cache: CacheConfig,
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Load configuration from a TOML file, overlaying the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| GraphError::ConfigError(e.to_string()))?;
        config.validate()?;
        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        self.embedding
            .validate()
            .map_err(|e| GraphError::ConfigError(e.to_string()))?;
        Ok(())
    }

    /// Derive the bounded parser's resource ceilings.
    #[must_use]
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_file_size_bytes: self.analysis.max_file_size_mb * 1024 * 1024,
            max_memory_bytes: self.analysis.max_memory_gb * 1024 * 1024 * 1024,
            timeout: Duration::from_secs(self.analysis.timeout_per_file_secs),
        }
    }
}

/// File enumeration and scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_file_size_mb: u64,
    pub max_memory_gb: u64,
    pub timeout_per_file_secs: u64,

    /// Directory names excluded at any depth
    pub excluded_dirs: Vec<String>,

    /// File-name glob patterns to exclude
    pub excluded_files: Vec<String>,

    pub include_tests: bool,
    pub follow_symlinks: bool,

    /// Bounded worker pool vs. plain sequential loop
    pub parallel: bool,
    pub max_workers: usize,

    /// Generate pytest skeletons for extracted units
    pub generate_tests: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 10,
            max_memory_gb: 4,
            timeout_per_file_secs: 30,
            excluded_dirs: [
                ".git",
                ".venv",
                "venv",
                "__pycache__",
                "node_modules",
                ".tox",
                "dist",
                "build",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            excluded_files: ["*.pyc", "*.pyo", "*.pyd", ".DS_Store", "*.so"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            include_tests: true,
            follow_symlinks: false,
            parallel: true,
            max_workers: 4,
            generate_tests: true,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(GraphError::ConfigError(
                "analysis.max_file_size_mb must be > 0".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(GraphError::ConfigError(
                "analysis.max_workers must be > 0".to_string(),
            ));
        }
        if self.timeout_per_file_secs == 0 {
            return Err(GraphError::ConfigError(
                "analysis.timeout_per_file_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// State persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub auto_save: bool,
    pub save_interval_secs: u64,

    /// Rotating timestamped backups kept before overwrite
    pub backup_count: usize,

    pub state_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            auto_save: true,
            save_interval_secs: 300,
            backup_count: 3,
            state_file: PathBuf::from("codescope-state.json"),
        }
    }
}
