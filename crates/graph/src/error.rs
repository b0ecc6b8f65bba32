use thiserror::Error;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that surface to the caller of `analyze_project`/`save`/`load`.
/// Per-file failures never appear here; they become error reports.
#[derive(Error, Debug)]
pub enum GraphError {
    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Cache store error
    #[error("Cache error: {0}")]
    CacheError(#[from] codescope_cache_store::CacheError),

    /// Embedding configuration error
    #[error("Embedding error: {0}")]
    EmbeddingError(#[from] codescope_embedding::EmbeddingError),

    /// State (de)serialization error
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid project path
    #[error("Invalid project path: {0}")]
    InvalidPath(String),
}
