//! AST walker / symbol extractor
//!
//! Converts a parse tree into a flat list of typed symbols with dotted name
//! paths, byte and line spans, signatures and doc strings. Extraction never
//! fails on odd shapes inside a file; nodes it cannot name are skipped.

use crate::error::{ParsingError, ParsingResult};
use crate::languages::{LanguageConfig, get_language_config};
use crate::symbols::{ParsedSymbol, SymbolKind};
use std::collections::HashMap;
use tree_sitter::{Node, Tree};

/// Extraction options supplied by the indexer
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Symbols with source larger than this keep spans but drop `source_code`
    pub max_symbol_size: usize,
    /// Master switch for persisting symbol source text
    pub include_source_code: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_symbol_size: 100 * 1024,
            include_source_code: true,
        }
    }
}

/// Extract all symbols from a parsed file
///
/// # Errors
///
/// Returns `UnsupportedLanguage` when the language has no registered
/// configuration. Individual malformed nodes are skipped, not surfaced.
pub fn extract_symbols(
    tree: &Tree,
    source: &str,
    language: &str,
    options: &WalkOptions,
) -> ParsingResult<Vec<ParsedSymbol>> {
    let config = get_language_config(language)
        .ok_or_else(|| ParsingError::UnsupportedLanguage(language.to_string()))?;

    let mut walker = Walker {
        config,
        source,
        options,
        path: Vec::new(),
        seen_paths: HashMap::new(),
        symbols: Vec::new(),
    };
    walker.walk(tree.root_node());
    Ok(walker.symbols)
}

struct Walker<'a> {
    config: &'static LanguageConfig,
    source: &'a str,
    options: &'a WalkOptions,
    /// (segment, is_type_container) container chain above the current node
    path: Vec<(String, bool)>,
    /// Collision counter per name path, to keep paths unique within a file
    seen_paths: HashMap<String, usize>,
    symbols: Vec<ParsedSymbol>,
}

impl Walker<'_> {
    fn walk(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        let kind_str = node.kind();

        if let Some(&(_, mapped)) = self
            .config
            .symbol_nodes
            .iter()
            .find(|(k, _)| *k == kind_str)
        {
            // C-family *_specifier nodes double as bare type references
            // (`struct point p;`); only definitions with a body count
            if kind_str.ends_with("_specifier") && node.child_by_field_name("body").is_none() {
                return;
            }
            if let Some(name) = self.node_name(node) {
                let kind = self.refine_kind(node, mapped);
                let symbol = self.build_symbol(node, kind, &name);
                let is_container = matches!(
                    kind,
                    SymbolKind::Class
                        | SymbolKind::Struct
                        | SymbolKind::Interface
                        | SymbolKind::Trait
                        | SymbolKind::Enum
                        | SymbolKind::Module
                );
                self.symbols.push(symbol);
                if is_container {
                    self.path.push((name, kind != SymbolKind::Module));
                    self.walk(node);
                    self.path.pop();
                    return;
                }
                // Callables can nest helpers; keep descending under their name
                self.path.push((name, false));
                self.walk(node);
                self.path.pop();
                return;
            }
            // Unnameable node (e.g. anonymous struct): descend transparently
            self.walk(node);
            return;
        }

        if self.config.container_nodes.contains(&kind_str) {
            if let Some(name) = self.container_name(node) {
                self.path.push((name, true));
                self.walk(node);
                self.path.pop();
                return;
            }
        }

        self.walk(node);
    }

    fn refine_kind(&self, node: Node<'_>, mapped: SymbolKind) -> SymbolKind {
        // A function nested directly in a type container is a method
        if mapped == SymbolKind::Function
            && self.path.last().is_some_and(|(_, type_ctx)| *type_ctx)
        {
            return SymbolKind::Method;
        }
        // Go type_spec resolves to struct/interface/alias by its type child
        if mapped == SymbolKind::TypeAlias && node.kind() == "type_spec" {
            if let Some(type_node) = node.child_by_field_name("type") {
                return match type_node.kind() {
                    "struct_type" => SymbolKind::Struct,
                    "interface_type" => SymbolKind::Interface,
                    _ => SymbolKind::TypeAlias,
                };
            }
        }
        mapped
    }

    fn build_symbol(&mut self, node: Node<'_>, kind: SymbolKind, name: &str) -> ParsedSymbol {
        let name_path = self.unique_name_path(name);
        let start_byte = node.start_byte();
        let end_byte = node.end_byte();
        let signature = if self.config.callable_kinds.contains(&node.kind()) {
            self.signature_of(node)
        } else {
            None
        };
        let source_code = if self.options.include_source_code
            && end_byte.saturating_sub(start_byte) <= self.options.max_symbol_size
        {
            self.source.get(start_byte..end_byte).map(String::from)
        } else {
            None
        };

        ParsedSymbol {
            kind,
            name: name.to_string(),
            name_path,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            start_byte,
            end_byte,
            signature,
            doc_string: self.doc_string_of(node),
            source_code,
        }
    }

    fn unique_name_path(&mut self, name: &str) -> String {
        let base = if self.path.is_empty() {
            name.to_string()
        } else {
            let prefix: Vec<&str> = self.path.iter().map(|(s, _)| s.as_str()).collect();
            format!("{}.{name}", prefix.join("."))
        };
        let count = self.seen_paths.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}#{count}")
        }
    }

    fn node_text(&self, node: Node<'_>) -> Option<&str> {
        self.source.get(node.start_byte()..node.end_byte())
    }

    fn node_name(&self, node: Node<'_>) -> Option<String> {
        if let Some(name_node) = node.child_by_field_name("name") {
            return self.node_text(name_node).map(String::from);
        }
        // C-family declarator chains: descend until a plain identifier
        if let Some(declarator) = node.child_by_field_name("declarator") {
            let mut current = declarator;
            loop {
                match current.kind() {
                    "identifier" | "field_identifier" | "type_identifier" => {
                        return self.node_text(current).map(String::from);
                    }
                    _ => {
                        if let Some(inner) = current
                            .child_by_field_name("declarator")
                            .or_else(|| current.named_child(0))
                        {
                            current = inner;
                        } else {
                            return None;
                        }
                    }
                }
            }
        }
        None
    }

    fn container_name(&self, node: Node<'_>) -> Option<String> {
        // Rust impl blocks are named after the implemented type
        if let Some(type_node) = node.child_by_field_name("type") {
            return self.node_text(type_node).map(|t| {
                // Strip generics: `Foo<T>` contributes the `Foo` segment
                t.split('<').next().unwrap_or(t).trim().to_string()
            });
        }
        self.node_name(node)
    }

    fn signature_of(&self, node: Node<'_>) -> Option<String> {
        let end = node
            .child_by_field_name("body")
            .map_or(node.end_byte(), |body| body.start_byte());
        let raw = self.source.get(node.start_byte()..end)?;
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed = collapsed.trim_end_matches(['{', ':']).trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    }

    fn doc_string_of(&self, node: Node<'_>) -> Option<String> {
        // Python-style docstring: first statement of the body is a string
        if node.kind() == "function_definition" || node.kind() == "class_definition" {
            if let Some(doc) = self.python_docstring(node) {
                return Some(doc);
            }
        }

        // Leading comment block: contiguous comment siblings directly above
        let mut lines: Vec<String> = Vec::new();
        let mut current = node.prev_named_sibling();
        while let Some(sibling) = current {
            if !sibling.kind().contains("comment") {
                break;
            }
            if let Some(text) = self.node_text(sibling) {
                lines.push(clean_comment(text));
            }
            current = sibling.prev_named_sibling();
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        let joined = lines.join("\n").trim().to_string();
        if joined.is_empty() { None } else { Some(joined) }
    }

    fn python_docstring(&self, node: Node<'_>) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string_node = first.named_child(0)?;
        if string_node.kind() != "string" {
            return None;
        }
        let raw = self.node_text(string_node)?;
        let stripped = raw
            .trim_start_matches(['r', 'b', 'u', 'f'])
            .trim_start_matches(['"', '\''])
            .trim_end_matches(['"', '\''])
            .trim();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped.to_string())
        }
    }
}

fn clean_comment(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("///")
                .trim_start_matches("//!")
                .trim_start_matches("//")
                .trim_start_matches("/**")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SourceParser;

    fn extract(source: &str, language: &str) -> Vec<ParsedSymbol> {
        let mut parser = SourceParser::new();
        let tree = parser.parse(source, language).unwrap();
        extract_symbols(&tree, source, language, &WalkOptions::default()).unwrap()
    }

    #[test]
    fn rust_functions_and_structs() {
        let source = r#"
/// Adds two numbers.
fn add(a: i32, b: i32) -> i32 {
    a + b
}

pub struct Point {
    x: f64,
    y: f64,
}

impl Point {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}
"#;
        let symbols = extract(source, "rust");
        let add = symbols.iter().find(|s| s.name == "add").unwrap();
        assert_eq!(add.kind, SymbolKind::Function);
        assert_eq!(add.name_path, "add");
        assert_eq!(add.doc_string.as_deref(), Some("Adds two numbers."));
        assert!(add.signature.as_deref().unwrap().contains("fn add"));
        assert!(add.source_code.is_some());

        let point = symbols.iter().find(|s| s.name == "Point").unwrap();
        assert_eq!(point.kind, SymbolKind::Struct);

        let magnitude = symbols.iter().find(|s| s.name == "magnitude").unwrap();
        assert_eq!(magnitude.kind, SymbolKind::Method);
        assert_eq!(magnitude.name_path, "Point.magnitude");
    }

    #[test]
    fn rust_modules_nest_name_paths() {
        let source = r#"
mod outer {
    pub fn helper() {}
}
"#;
        let symbols = extract(source, "rust");
        let helper = symbols.iter().find(|s| s.name == "helper").unwrap();
        assert_eq!(helper.name_path, "outer.helper");
    }

    #[test]
    fn python_class_methods_and_docstrings() {
        let source = r#"
class Greeter:
    """Says hello."""

    def greet(self, name):
        """Greet someone."""
        return f"hello {name}"

def main():
    pass
"#;
        let symbols = extract(source, "python");
        let greeter = symbols.iter().find(|s| s.name == "Greeter").unwrap();
        assert_eq!(greeter.kind, SymbolKind::Class);
        assert_eq!(greeter.doc_string.as_deref(), Some("Says hello."));

        let greet = symbols.iter().find(|s| s.name == "greet").unwrap();
        assert_eq!(greet.kind, SymbolKind::Method);
        assert_eq!(greet.name_path, "Greeter.greet");
        assert_eq!(greet.doc_string.as_deref(), Some("Greet someone."));

        let main = symbols.iter().find(|s| s.name == "main").unwrap();
        assert_eq!(main.kind, SymbolKind::Function);
    }

    #[test]
    fn go_types_resolve_by_shape() {
        let source = r#"
package main

type Server struct {
    addr string
}

type Handler interface {
    Handle()
}

func (s *Server) Run() {}

func main() {}
"#;
        let symbols = extract(source, "go");
        assert_eq!(
            symbols.iter().find(|s| s.name == "Server").unwrap().kind,
            SymbolKind::Struct
        );
        assert_eq!(
            symbols.iter().find(|s| s.name == "Handler").unwrap().kind,
            SymbolKind::Interface
        );
        assert_eq!(
            symbols.iter().find(|s| s.name == "Run").unwrap().kind,
            SymbolKind::Method
        );
    }

    #[test]
    fn duplicate_name_paths_are_disambiguated() {
        let source = r#"
mod a {
    pub fn run() {}
}
"#;
        // Same file, same path twice: second occurrence gets a suffix
        let doubled = format!("{source}\n{source}");
        let symbols = extract(&doubled, "rust");
        let runs: Vec<&ParsedSymbol> =
            symbols.iter().filter(|s| s.name == "run").collect();
        assert_eq!(runs.len(), 2);
        assert_ne!(runs[0].name_path, runs[1].name_path);
    }

    #[test]
    fn spans_are_one_based_lines() {
        let source = "fn one() {}\nfn two() {}\n";
        let symbols = extract(source, "rust");
        assert_eq!(symbols[0].start_line, 1);
        assert_eq!(symbols[1].start_line, 2);
        assert!(symbols[0].end_byte > symbols[0].start_byte);
    }

    #[test]
    fn oversized_symbols_drop_source_text() {
        let body = "x += 1;".repeat(200);
        let source = format!("fn big() {{ {body} }}");
        let mut parser = SourceParser::new();
        let tree = parser.parse(&source, "rust").unwrap();
        let options = WalkOptions {
            max_symbol_size: 64,
            include_source_code: true,
        };
        let symbols = extract_symbols(&tree, &source, "rust", &options).unwrap();
        let big = symbols.iter().find(|s| s.name == "big").unwrap();
        assert!(big.source_code.is_none());
        assert!(big.end_byte > big.start_byte);
    }
}
