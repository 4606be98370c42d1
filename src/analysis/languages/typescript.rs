//! TypeScript syntax providers using tree-sitter.
//!
//! `.tsx` needs the TSX grammar; everything else uses the plain
//! TypeScript grammar, which rejects JSX but accepts type assertions.

use std::path::Path;

use tree_sitter::Language;

use crate::analysis::traits::parse_with;
use crate::analysis::{ParsedModule, SyntaxProvider};
use crate::error::SyntaxError;

pub struct TypeScriptProvider {
    language: Language,
}

impl TypeScriptProvider {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        }
    }
}

impl Default for TypeScriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxProvider for TypeScriptProvider {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "mts", "cts"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedModule, SyntaxError> {
        parse_with(&self.language, self.language_id(), path, source)
    }
}

pub struct TsxProvider {
    language: Language,
}

impl TsxProvider {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl Default for TsxProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntaxProvider for TsxProvider {
    fn language_id(&self) -> &'static str {
        "tsx"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["tsx"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> Result<ParsedModule, SyntaxError> {
        parse_with(&self.language, self.language_id(), path, source)
    }
}
