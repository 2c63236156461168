//! Error types for the engram-storage crate

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error type for storage-engine operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connecting, authenticating or selecting the namespace failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// A query failed at the driver level
    #[error("Query error: {0}")]
    Query(String),

    /// A migration statement failed with something other than an
    /// "already exists" class error
    #[error("Migration {version} failed: {message}")]
    Migration { version: u32, message: String },

    /// A relationship endpoint could not be resolved to an entity
    #[error("Could not resolve entity '{0}' by id or name")]
    Resolution(String),

    /// The caller asked to update something that does not exist
    #[error("Not found: {0}")]
    Missing(String),

    /// The caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A row came back in a shape the models cannot represent
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Query(err.to_string())
    }
}
