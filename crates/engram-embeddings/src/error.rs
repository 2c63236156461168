//! Error types for the engram-embeddings crate

use thiserror::Error;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Error type for embedding operations
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Network and endpoint errors
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered but the payload was unusable
    #[error("Provider response error: {0}")]
    Response(String),

    /// Configuration and environment errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error for other cases
    #[error("Other error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}
