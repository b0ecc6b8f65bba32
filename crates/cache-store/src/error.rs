use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while writing to or maintaining the cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to serialize a cache envelope
    #[error("Serialization error: {0}")]
    SerializeError(#[from] serde_json::Error),
}
