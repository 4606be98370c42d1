//! JavaScript syntax provider using tree-sitter.

use std::path::Path;

use tree_sitter::Language;

use crate::analysis::traits::parse_with;
use crate::analysis::{ParsedModule, SyntaxProvider};
use crate::error::SyntaxError;

pub struct JavaScriptProvider {
    language: Language,
}

impl JavaScriptProvider {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

impl Default for JavaScriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxProvider for JavaScriptProvider {
    fn language_id(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "mjs", "cjs", "jsx"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedModule, SyntaxError> {
        parse_with(&self.language, self.language_id(), path, source)
    }
}
