//! Engram storage engine
//!
//! Schema-versioned persistence over a single multi-model database that
//! simultaneously serves key-value, vector (MTREE cosine), full-text (BM25)
//! and graph queries. One connection is acquired at startup - embedded
//! RocksDB or a remote server - and shared process-wide; the driver is safe
//! for concurrent use.
//!
//! The engine exclusively owns every record. Indexing, watching and
//! retrieval hold only temporary in-memory copies.

pub mod client;
pub mod code;
pub mod documents;
pub mod error;
pub mod events;
pub mod facts;
pub mod graph;
pub mod ids;
pub mod jobs;
pub mod migrations;
pub mod models;
pub mod stats;
pub mod vectors;

pub use client::Storage;
pub use documents::DocumentPayload;
pub use error::{StorageError, StorageResult};
pub use events::{DEFAULT_EVENT_LIMIT, EventQuery};
pub use ids::derive_project_id;
pub use migrations::TARGET_VERSION;
pub use models::{
    CodeFile, CodeProject, CodeSymbol, DocumentHit, Entity, Event, EventHit, FactEntry,
    IndexingStatus, KbDocument, NewCodeChunk, NewCodeSymbol, Relationship, StoredJob, SymbolHit,
    TraversalStep, UserStats, VectorHit, VectorMemory,
};
pub use stats::GLOBAL_SCOPE;
