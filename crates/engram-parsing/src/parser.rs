//! Thin wrapper around a family of tree-sitter grammars
//!
//! A [`SourceParser`] owns a single `tree_sitter::Parser`, which is not safe
//! for concurrent use. The indexer constructs one parser per worker; sharing
//! an instance across workers is a correctness bug, not a performance choice.

use crate::error::{ParsingError, ParsingResult};
use crate::languages::get_language_config;
use tree_sitter::{Parser, Tree};

/// Per-worker source parser
pub struct SourceParser {
    parser: Parser,
    /// Language currently loaded into the parser, to skip redundant set_language calls
    loaded: Option<&'static str>,
}

impl SourceParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            loaded: None,
        }
    }

    /// Parse a source file into a tree using the grammar for `language`
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedLanguage` when no grammar is registered,
    /// `Grammar` when the grammar cannot be loaded, and `ParseFailed` when
    /// tree-sitter yields no tree (e.g. after a cancellation).
    pub fn parse(&mut self, content: &str, language: &str) -> ParsingResult<Tree> {
        let config = get_language_config(language)
            .ok_or_else(|| ParsingError::UnsupportedLanguage(language.to_string()))?;

        if self.loaded != Some(config.id) {
            self.parser
                .set_language(&config.tree_sitter_language)
                .map_err(|e| ParsingError::Grammar {
                    language: language.to_string(),
                    message: e.to_string(),
                })?;
            self.loaded = Some(config.id);
        }

        self.parser
            .parse(content, None)
            .ok_or_else(|| ParsingError::ParseFailed(language.to_string()))
    }
}

impl Default for SourceParser {
    fn default() -> Self {
        Self::new()
    }
}
