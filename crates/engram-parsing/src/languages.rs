//! Language-specific configurations for code parsing
//!
//! This module centralizes all language-specific parsing configuration:
//! Tree-sitter grammar handles, file-extension mappings and the AST node
//! kinds the symbol walker reacts to.

use crate::symbols::SymbolKind;
use lazy_static::lazy_static;
use std::collections::HashMap;
use tree_sitter::Language;

/// Configuration for a specific programming language
#[derive(Clone)]
pub struct LanguageConfig {
    /// The language identifier (e.g., "rust", "python")
    pub id: &'static str,
    /// File extensions associated with this language
    pub extensions: &'static [&'static str],
    /// Tree-sitter language parser
    pub tree_sitter_language: Language,
    /// AST node kinds that produce a symbol, with the kind they map to
    pub symbol_nodes: &'static [(&'static str, SymbolKind)],
    /// AST node kinds that contribute a segment to the name path without
    /// emitting a symbol themselves (e.g. Rust `impl` blocks)
    pub container_nodes: &'static [&'static str],
    /// Node kinds that hold a callable's parameter list, used for signatures
    pub callable_kinds: &'static [&'static str],
}

impl std::fmt::Debug for LanguageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageConfig")
            .field("id", &self.id)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

lazy_static! {
    /// Registry of all supported language configurations
    pub static ref LANGUAGE_REGISTRY: HashMap<&'static str, LanguageConfig> = {
        let mut registry = HashMap::new();

        registry.insert(
            "rust",
            LanguageConfig {
                id: "rust",
                extensions: &["rs"],
                tree_sitter_language: tree_sitter_rust::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_item", SymbolKind::Function),
                    ("struct_item", SymbolKind::Struct),
                    ("enum_item", SymbolKind::Enum),
                    ("trait_item", SymbolKind::Trait),
                    ("mod_item", SymbolKind::Module),
                    ("const_item", SymbolKind::Constant),
                    ("static_item", SymbolKind::Variable),
                    ("type_item", SymbolKind::TypeAlias),
                ],
                container_nodes: &["impl_item"],
                callable_kinds: &["function_item"],
            },
        );

        registry.insert(
            "python",
            LanguageConfig {
                id: "python",
                extensions: &["py", "pyi"],
                tree_sitter_language: tree_sitter_python::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_definition", SymbolKind::Function),
                    ("class_definition", SymbolKind::Class),
                ],
                container_nodes: &[],
                callable_kinds: &["function_definition"],
            },
        );

        registry.insert(
            "javascript",
            LanguageConfig {
                id: "javascript",
                extensions: &["js", "mjs", "cjs"],
                tree_sitter_language: tree_sitter_javascript::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_declaration", SymbolKind::Function),
                    ("class_declaration", SymbolKind::Class),
                    ("method_definition", SymbolKind::Method),
                ],
                container_nodes: &[],
                callable_kinds: &["function_declaration", "method_definition"],
            },
        );

        registry.insert(
            "typescript",
            LanguageConfig {
                id: "typescript",
                extensions: &["ts", "mts", "cts"],
                tree_sitter_language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                symbol_nodes: &[
                    ("function_declaration", SymbolKind::Function),
                    ("class_declaration", SymbolKind::Class),
                    ("method_definition", SymbolKind::Method),
                    ("interface_declaration", SymbolKind::Interface),
                    ("enum_declaration", SymbolKind::Enum),
                    ("type_alias_declaration", SymbolKind::TypeAlias),
                    ("module", SymbolKind::Module),
                ],
                container_nodes: &[],
                callable_kinds: &["function_declaration", "method_definition"],
            },
        );

        registry.insert(
            "tsx",
            LanguageConfig {
                id: "tsx",
                extensions: &["tsx"],
                tree_sitter_language: tree_sitter_typescript::LANGUAGE_TSX.into(),
                symbol_nodes: &[
                    ("function_declaration", SymbolKind::Function),
                    ("class_declaration", SymbolKind::Class),
                    ("method_definition", SymbolKind::Method),
                    ("interface_declaration", SymbolKind::Interface),
                ],
                container_nodes: &[],
                callable_kinds: &["function_declaration", "method_definition"],
            },
        );

        registry.insert(
            "go",
            LanguageConfig {
                id: "go",
                extensions: &["go"],
                tree_sitter_language: tree_sitter_go::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_declaration", SymbolKind::Function),
                    ("method_declaration", SymbolKind::Method),
                    ("type_spec", SymbolKind::TypeAlias),
                    ("const_spec", SymbolKind::Constant),
                ],
                container_nodes: &[],
                callable_kinds: &["function_declaration", "method_declaration"],
            },
        );

        registry.insert(
            "java",
            LanguageConfig {
                id: "java",
                extensions: &["java"],
                tree_sitter_language: tree_sitter_java::LANGUAGE.into(),
                symbol_nodes: &[
                    ("class_declaration", SymbolKind::Class),
                    ("interface_declaration", SymbolKind::Interface),
                    ("enum_declaration", SymbolKind::Enum),
                    ("method_declaration", SymbolKind::Method),
                    ("constructor_declaration", SymbolKind::Method),
                ],
                container_nodes: &[],
                callable_kinds: &["method_declaration", "constructor_declaration"],
            },
        );

        registry.insert(
            "c",
            LanguageConfig {
                id: "c",
                extensions: &["c", "h"],
                tree_sitter_language: tree_sitter_c::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_definition", SymbolKind::Function),
                    ("struct_specifier", SymbolKind::Struct),
                    ("enum_specifier", SymbolKind::Enum),
                    ("type_definition", SymbolKind::TypeAlias),
                ],
                container_nodes: &[],
                callable_kinds: &["function_definition"],
            },
        );

        registry.insert(
            "cpp",
            LanguageConfig {
                id: "cpp",
                extensions: &["cpp", "cxx", "cc", "hpp", "hxx", "hh"],
                tree_sitter_language: tree_sitter_cpp::LANGUAGE.into(),
                symbol_nodes: &[
                    ("function_definition", SymbolKind::Function),
                    ("struct_specifier", SymbolKind::Struct),
                    ("class_specifier", SymbolKind::Class),
                    ("enum_specifier", SymbolKind::Enum),
                    ("namespace_definition", SymbolKind::Module),
                    ("type_definition", SymbolKind::TypeAlias),
                ],
                container_nodes: &[],
                callable_kinds: &["function_definition"],
            },
        );

        registry.insert(
            "csharp",
            LanguageConfig {
                id: "csharp",
                extensions: &["cs"],
                tree_sitter_language: tree_sitter_c_sharp::LANGUAGE.into(),
                symbol_nodes: &[
                    ("class_declaration", SymbolKind::Class),
                    ("interface_declaration", SymbolKind::Interface),
                    ("struct_declaration", SymbolKind::Struct),
                    ("enum_declaration", SymbolKind::Enum),
                    ("method_declaration", SymbolKind::Method),
                    ("property_declaration", SymbolKind::Property),
                    ("namespace_declaration", SymbolKind::Module),
                ],
                container_nodes: &[],
                callable_kinds: &["method_declaration"],
            },
        );

        registry.insert(
            "bash",
            LanguageConfig {
                id: "bash",
                extensions: &["sh", "bash", "zsh"],
                tree_sitter_language: tree_sitter_bash::LANGUAGE.into(),
                symbol_nodes: &[("function_definition", SymbolKind::Function)],
                container_nodes: &[],
                callable_kinds: &["function_definition"],
            },
        );

        registry
    };

    /// Map of file extensions to language IDs
    pub static ref EXTENSION_MAP: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();

        for (lang_id, config) in LANGUAGE_REGISTRY.iter() {
            for ext in config.extensions {
                map.insert(*ext, *lang_id);
            }
        }

        map
    };
}

/// Gets a language configuration by ID
pub fn get_language_config(language_id: &str) -> Option<&'static LanguageConfig> {
    LANGUAGE_REGISTRY.get(language_id)
}

/// Gets a language ID from a file extension
pub fn get_language_from_extension(extension: &str) -> Option<&'static str> {
    EXTENSION_MAP.get(extension).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_registry_initialization() {
        assert!(!LANGUAGE_REGISTRY.is_empty());
        assert!(LANGUAGE_REGISTRY.contains_key("rust"));
        assert!(LANGUAGE_REGISTRY.contains_key("python"));
        assert!(LANGUAGE_REGISTRY.contains_key("javascript"));
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(get_language_from_extension("rs"), Some("rust"));
        assert_eq!(get_language_from_extension("py"), Some("python"));
        assert_eq!(get_language_from_extension("js"), Some("javascript"));
        assert_eq!(get_language_from_extension("ts"), Some("typescript"));
        assert_eq!(get_language_from_extension("go"), Some("go"));
        assert_eq!(get_language_from_extension("exe"), None);
    }

    #[test]
    fn test_all_languages_have_symbol_nodes() {
        for (lang, config) in LANGUAGE_REGISTRY.iter() {
            assert_eq!(config.id, *lang);
            assert!(
                !config.extensions.is_empty(),
                "Language {lang} has no extensions"
            );
            assert!(
                !config.symbol_nodes.is_empty(),
                "Language {lang} has no symbol nodes"
            );
        }
    }

    #[test]
    fn test_extension_uniqueness() {
        let mut extension_count: HashMap<&str, Vec<&str>> = HashMap::new();

        for (lang_id, config) in LANGUAGE_REGISTRY.iter() {
            for ext in config.extensions {
                extension_count.entry(ext).or_default().push(lang_id);
            }
        }

        for (ext, langs) in &extension_count {
            assert!(
                langs.len() == 1,
                "Extension '{ext}' maps to multiple languages: {langs:?}"
            );
        }
    }
}
