//! Error types for the analysis pipeline.
//!
//! Per-module failures never surface here: they are recovered locally and
//! recorded as diagnostics. Only run-level failures abort emission.

use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::manifest::Reference;

/// A run that produced no manifest.
#[derive(Error, Debug)]
pub enum AnalyzeError {
    /// Nothing could be analyzed.
    #[error("no analyzable modules")]
    NoModules { diagnostics: Vec<Diagnostic> },
    /// The merged manifest references declarations that do not exist.
    #[error("manifest validation failed: {} dangling reference(s)", dangling.len())]
    Validation {
        dangling: Vec<DanglingReference>,
        diagnostics: Vec<Diagnostic>,
    },
}

impl AnalyzeError {
    /// Diagnostics gathered before the run was aborted.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            AnalyzeError::NoModules { diagnostics } => diagnostics,
            AnalyzeError::Validation { diagnostics, .. } => diagnostics,
        }
    }
}

/// A reference in the merged manifest that resolves to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    /// Module containing the reference.
    pub module: String,
    /// Where the reference sits, e.g. `MyElement.superclass`.
    pub location: String,
    pub reference: Reference,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.module, self.location, self.reference.name
        )?;
        if let Some(ref package) = self.reference.package {
            write!(f, " (package {})", package)?;
        }
        if let Some(ref module) = self.reference.module {
            write!(f, " in {}", module)?;
        }
        Ok(())
    }
}

/// Failure inside a plugin hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("plugin {plugin} failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Failure to produce a syntax tree.
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("no syntax provider for extension {0:?}")]
    UnsupportedExtension(String),
    #[error("source is not valid UTF-8")]
    InvalidUtf8,
    #[error("failed to load grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("parser produced no tree")]
    NoTree,
}

/// Failure to load a dependency package manifest.
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("failed to read package manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid package manifest: {0}")]
    Json(#[from] serde_json::Error),
}
