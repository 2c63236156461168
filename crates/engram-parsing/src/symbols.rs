//! Symbol types emitted by the AST walker

use serde::{Deserialize, Serialize};

/// Closed enumeration of the program constructs the walker extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Struct,
    Enum,
    Trait,
    Constant,
    Variable,
    TypeAlias,
    Module,
    Property,
}

impl SymbolKind {
    /// Stable string form used in storage and tool responses
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::TypeAlias => "type_alias",
            Self::Module => "module",
            Self::Property => "property",
        }
    }

    /// Parse the stable string form back into a kind
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "trait" => Some(Self::Trait),
            "constant" => Some(Self::Constant),
            "variable" => Some(Self::Variable),
            "type_alias" => Some(Self::TypeAlias),
            "module" => Some(Self::Module),
            "property" => Some(Self::Property),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol extracted from one source file
///
/// Name paths are dotted container chains from outermost container to the
/// symbol itself, e.g. `Storage.save_fact`. Parent linkage is left to the
/// caller; extraction emits a flat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSymbol {
    pub kind: SymbolKind,
    pub name: String,
    pub name_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    /// Type-qualified parameter list for callables, empty otherwise
    pub signature: Option<String>,
    /// Leading doc comment, if one is attached
    pub doc_string: Option<String>,
    /// Full source text, subject to the caller's size gate
    pub source_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Struct,
            SymbolKind::Enum,
            SymbolKind::Trait,
            SymbolKind::Constant,
            SymbolKind::Variable,
            SymbolKind::TypeAlias,
            SymbolKind::Module,
            SymbolKind::Property,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("garbage"), None);
    }
}
