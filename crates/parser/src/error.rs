use thiserror::Error;

/// Result type for parser-internal operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Internal parser failures. These never escape [`crate::BoundedParser`];
/// they are converted to [`crate::ErrorReport`]s at the file boundary.
#[derive(Error, Debug)]
pub enum ParserError {
    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tree-sitter grammar/engine error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// The isolated parse worker panicked or was lost
    #[error("Parse worker error: {0}")]
    WorkerError(String),
}
