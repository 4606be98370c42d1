//! Core traits for syntax providers.

use std::path::Path;

use crate::error::SyntaxError;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// The tree stays alive for the whole per-module phase so collectors,
/// class analysis and plugin hooks can all read raw nodes without
/// re-parsing.
pub struct ParsedModule {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// Module path, relative to the analysis root.
    pub path: String,
    /// Language identifier of the provider that built the tree.
    pub language: &'static str,
}

impl ParsedModule {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Root node of the tree.
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }

    /// Whether tree-sitter had to recover from syntax errors.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// The grammar the tree was built with.
    pub fn ts_language(&self) -> tree_sitter::Language {
        self.tree.language().clone()
    }
}

impl std::fmt::Debug for ParsedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedModule")
            .field("path", &self.path)
            .field("language", &self.language)
            .field("bytes", &self.source.len())
            .finish()
    }
}

/// Language-specific syntax provider.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create a parser
/// per call.
pub trait SyntaxProvider: Send + Sync {
    /// Returns the language identifier (e.g., "javascript", "typescript").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this provider handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors are still returned as a valid tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedModule, SyntaxError>;

    /// Check if this provider handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}

/// Shared parse routine for the tree-sitter backed providers.
pub(crate) fn parse_with(
    language: &tree_sitter::Language,
    language_id: &'static str,
    path: &Path,
    source: &[u8],
) -> Result<ParsedModule, SyntaxError> {
    if std::str::from_utf8(source).is_err() {
        return Err(SyntaxError::InvalidUtf8);
    }

    let mut parser = tree_sitter::Parser::new();
    parser.set_language(language)?;
    let tree = parser.parse(source, None).ok_or(SyntaxError::NoTree)?;

    Ok(ParsedModule {
        tree,
        source: source.to_vec(),
        path: path.to_string_lossy().replace('\\', "/"),
        language: language_id,
    })
}
