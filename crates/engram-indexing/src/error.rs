//! Error types for the engram-indexing crate

use thiserror::Error;

/// Result type alias for indexing operations
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Error type for scanning, indexing, jobs and watching
#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] engram_storage::StorageError),

    #[error("Parse error: {0}")]
    Parsing(#[from] engram_parsing::ParsingError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] engram_embeddings::EmbeddingError),

    /// The job queue is at capacity; submit fails fast
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Watcher lifecycle violations (activating an unindexed project, ...)
    #[error("Watcher error: {0}")]
    Watcher(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}
