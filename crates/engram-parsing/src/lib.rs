//! Engram parsing crate
//!
//! Code parsing with tree-sitter, symbol extraction and overlapping-window
//! chunking for embedding. Parsers are cheap to construct and must stay
//! worker-local; only the grammar registry is shared.

pub mod chunker;
pub mod error;
pub mod languages;
pub mod parser;
pub mod symbols;
pub mod walker;

// Re-export main types
pub use chunker::{ChunkWindow, Chunker, embedding_prompt};
pub use error::{ParsingError, ParsingResult};
pub use languages::{get_language_config, get_language_from_extension};
pub use parser::SourceParser;
pub use symbols::{ParsedSymbol, SymbolKind};
pub use walker::{WalkOptions, extract_symbols};
