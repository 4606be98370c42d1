//! Diagnostics surfaced to the caller alongside the manifest.

use serde::{Deserialize, Serialize};

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// The module could not be turned into a syntax tree.
    ParseFailure,
    /// The tree was built but contains error nodes.
    SyntaxError,
    /// A plugin hook failed.
    PluginFailure,
    /// A configured plugin is unknown or compiled out.
    PluginUnavailable,
    /// An inheritance edge, registration or re-export could not be resolved.
    UnresolvedReference,
    /// A class is its own ancestor.
    CyclicInheritance,
    /// An emitted reference points at nothing.
    MergeValidation,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ParseFailure => "parse-failure",
            DiagnosticKind::SyntaxError => "syntax-error",
            DiagnosticKind::PluginFailure => "plugin-failure",
            DiagnosticKind::PluginUnavailable => "plugin-unavailable",
            DiagnosticKind::UnresolvedReference => "unresolved-reference",
            DiagnosticKind::CyclicInheritance => "cyclic-inheritance",
            DiagnosticKind::MergeValidation => "merge-validation",
        }
    }

    /// Default severity for the kind.
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::ParseFailure | DiagnosticKind::MergeValidation => Severity::Error,
            DiagnosticKind::SyntaxError
            | DiagnosticKind::PluginFailure
            | DiagnosticKind::PluginUnavailable
            | DiagnosticKind::CyclicInheritance => Severity::Warning,
            DiagnosticKind::UnresolvedReference => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Module path, empty for run-level diagnostics.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn new(module: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            severity: kind.severity(),
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.module.is_empty(), self.line) {
            (true, _) => write!(f, "{} [{}]: {}", self.severity, self.kind, self.message),
            (false, Some(line)) => write!(
                f,
                "{}:{}: {} [{}]: {}",
                self.module, line, self.severity, self.kind, self.message
            ),
            (false, None) => write!(
                f,
                "{}: {} [{}]: {}",
                self.module, self.severity, self.kind, self.message
            ),
        }
    }
}

/// Sort diagnostics by module path, keeping emission order within a module.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| a.module.cmp(&b.module));
}
