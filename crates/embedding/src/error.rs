use thiserror::Error;

/// Result type for embedding operations
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors surfaced by external embedding models or configuration
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The external pretrained model failed; callers fall back to feature mode
    #[error("Embedding model error: {0}")]
    ModelError(String),

    /// Invalid embedding configuration
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfig(String),
}
