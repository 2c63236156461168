//! Error types for the engram-parsing crate

use thiserror::Error;

/// Result type alias for parsing operations
pub type ParsingResult<T> = Result<T, ParsingError>;

/// Error type for parsing and symbol-extraction operations
#[derive(Error, Debug)]
pub enum ParsingError {
    /// No grammar registered for the requested language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The grammar could not be loaded into the parser
    #[error("Grammar error for {language}: {message}")]
    Grammar { language: String, message: String },

    /// tree-sitter could not produce a tree for the input
    #[error("Parse failed for {0}")]
    ParseFailed(String),
}
