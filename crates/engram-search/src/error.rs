//! Error types for the engram-search crate

use thiserror::Error;

/// Result type alias for retrieval operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Error type for retrieval operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// The caller supplied an unusable parameter (bad date, missing scope)
    #[error("Invalid input: {0}")]
    Input(String),

    /// The query embedding could not be produced
    #[error("Embedding error: {0}")]
    Embedding(#[from] engram_embeddings::EmbeddingError),

    /// The storage engine failed persistently (after retry)
    #[error("Storage error: {0}")]
    Storage(#[from] engram_storage::StorageError),
}
