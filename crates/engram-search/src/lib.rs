//! Engram retrieval layer
//!
//! Hybrid BM25+vector ranking over events, semantic search over vector
//! memories, code symbols and knowledge-base documents, time-window
//! filtering, and "did you mean" alternatives when a scoped read returns
//! nothing.

pub mod error;
pub mod service;
pub mod types;

pub use error::{SearchError, SearchResult};
pub use service::SearchService;
pub use types::{EventSearchRequest, Scoped};
