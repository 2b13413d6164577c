//! Error types for docstring generation and rewrite.

use thiserror::Error;

/// Errors from the generation endpoint.
#[derive(Debug, Error)]
pub enum GenError {
    /// Authentication rejected by the endpoint
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The configured model is unknown to the endpoint
    #[error("Model not found: {0}")]
    InvalidModel(String),

    /// The endpoint asked us to slow down
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Endpoint unreachable or persistently failing
    #[error("Generation endpoint unavailable: {0}")]
    Unavailable(String),

    /// Reply did not match the expected response shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, GenError>;

/// Errors from writing docstrings back into source files.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Target file could not be re-parsed
    #[error("Rewrite parse failed: {0}")]
    Parse(#[from] doclens_core::ParserError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
