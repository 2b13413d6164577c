//! Python source parsing via tree-sitter.
//!
//! Thin wrapper around the tree-sitter Python grammar. The definition tree
//! builder consumes the parsed [`tree_sitter::Tree`] together with the
//! original source text; nothing in this crate inspects other languages.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

// ============================================================================
// Parser Errors
// ============================================================================

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Failed to set language
    #[error("Failed to set language: {0}")]
    LanguageSet(String),

    /// Failed to parse source code
    #[error("Failed to parse source code")]
    ParseFailed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Python Parser
// ============================================================================

/// A tree-sitter based parser fixed to the Python grammar.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    /// Create a new parser configured for Python.
    pub fn new() -> Result<Self, ParserError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| ParserError::LanguageSet(e.to_string()))?;

        Ok(Self { parser })
    }

    /// Parse source code into a syntax tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, ParserError> {
        self.parser
            .parse(source, None)
            .ok_or(ParserError::ParseFailed)
    }
}

/// Extract a node's text from the original source.
pub fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// Extract the content of a Python string literal node, without quotes.
///
/// String nodes carry `string_start` / `string_content` / `string_end`
/// children; concatenating the content children handles both single-line
/// and triple-quoted forms.
pub fn string_content(node: Node<'_>, source: &str) -> String {
    let mut content = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "string_content" {
            content.push_str(node_text(child, source));
        }
    }
    content
}
