//! Output for analysis results.
//!
//! Supports:
//! - Manifest: pretty-printed `custom-elements.json`
//! - Pretty diagnostics: colored terminal output for human readability
//! - JSON diagnostics: structured output for programmatic consumption

use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::DanglingReference;
use crate::manifest::Manifest;

/// File name of the emitted manifest.
pub const MANIFEST_FILE: &str = "custom-elements.json";

// =============================================================================
// Manifest
// =============================================================================

/// Serialize a manifest as pretty JSON with a trailing newline.
pub fn to_json(manifest: &Manifest) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    Ok(json)
}

/// Write `custom-elements.json` into `outdir`, creating it if needed.
///
/// The file is written to a sibling temp path and renamed, so a reader never
/// sees a half-written manifest.
pub fn write_manifest(manifest: &Manifest, outdir: &Path) -> anyhow::Result<PathBuf> {
    if !outdir.as_os_str().is_empty() {
        fs::create_dir_all(outdir)?;
    }
    let path = outdir.join(MANIFEST_FILE);
    let staging = outdir.join(format!(".{}.tmp", MANIFEST_FILE));
    fs::write(&staging, to_json(manifest)?)?;
    fs::rename(&staging, &path)?;
    Ok(path)
}

/// Print a manifest to stdout.
pub fn print_manifest(manifest: &Manifest) -> anyhow::Result<()> {
    print!("{}", to_json(manifest)?);
    Ok(())
}

// =============================================================================
// JSON diagnostics
// =============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    passed: bool,
    modules: usize,
    errors: usize,
    warnings: usize,
    diagnostics: &'a [Diagnostic],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dangling: Vec<String>,
}

/// Summary of a run handed to the diagnostics writers.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    /// Whether a manifest was produced.
    pub passed: bool,
    /// Modules in the emitted manifest.
    pub modules: usize,
    pub diagnostics: &'a [Diagnostic],
    pub dangling: &'a [DanglingReference],
}

impl RunSummary<'_> {
    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Render diagnostics as a JSON document.
pub fn diagnostics_json(summary: &RunSummary<'_>) -> anyhow::Result<String> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        passed: summary.passed,
        modules: summary.modules,
        errors: summary.count(Severity::Error),
        warnings: summary.count(Severity::Warning),
        diagnostics: summary.diagnostics,
        dangling: summary.dangling.iter().map(|d| d.to_string()).collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Write diagnostics as JSON to stderr.
pub fn write_diagnostics_json(summary: &RunSummary<'_>) -> anyhow::Result<()> {
    eprintln!("{}", diagnostics_json(summary)?);
    Ok(())
}

// =============================================================================
// Pretty diagnostics
// =============================================================================

/// Write diagnostics in a human-readable format to stderr.
///
/// Stdout is reserved for the manifest when `--stdout` is used.
pub fn write_diagnostics_pretty(summary: &RunSummary<'_>) {
    if !summary.diagnostics.is_empty() {
        eprintln!();
        eprintln!(
            "  {} ({}):",
            "Diagnostics".bold(),
            summary.diagnostics.len()
        );
        eprintln!();
        for d in summary.diagnostics {
            write_diagnostic(d);
        }
    }

    if !summary.dangling.is_empty() {
        eprintln!("  {} ({}):", "Dangling references".bold(), summary.dangling.len());
        for d in summary.dangling {
            eprintln!("    {}", d.to_string().red());
        }
        eprintln!();
    }

    write_final_status(summary);
}

fn write_diagnostic(d: &Diagnostic) {
    let tag = severity_tag(d.severity);
    let location = match (d.module.is_empty(), d.line) {
        (true, _) => "(run)".dimmed().to_string(),
        (false, Some(line)) => format!("{}{}", d.module.blue(), format!(":{}", line).dimmed()),
        (false, None) => d.module.blue().to_string(),
    };
    eprintln!("    {} {:<22}{}", tag, d.kind.as_str().dimmed(), location);
    eprintln!("            {}", d.message);
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red(),
        Severity::Warning => "WARN ".yellow(),
        Severity::Info => "INFO ".blue(),
    }
}

fn write_final_status(summary: &RunSummary<'_>) {
    let errors = summary.count(Severity::Error);
    let warnings = summary.count(Severity::Warning);
    let status = if summary.passed {
        "✓ OK".green()
    } else {
        "✗ FAILED".red()
    };
    eprintln!(
        "  {}  {} {}, {}, {}",
        status,
        summary.modules,
        if summary.modules == 1 { "module" } else { "modules" },
        format!("{} error(s)", errors).dimmed(),
        format!("{} warning(s)", warnings).dimmed(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::manifest::{ClassDoc, Declaration, Module};
    use tempfile::TempDir;

    fn manifest() -> Manifest {
        let mut module = Module::new("src/a.js");
        module
            .declarations
            .push(Declaration::Class(ClassDoc::new("A")));
        Manifest {
            modules: vec![module],
            ..Default::default()
        }
    }

    #[test]
    fn test_to_json_shape() {
        let json = to_json(&manifest()).unwrap();
        assert!(json.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schemaVersion"], "1.0.0");
        assert_eq!(value["modules"][0]["path"], "src/a.js");
        assert_eq!(value["modules"][0]["declarations"][0]["kind"], "class");
    }

    #[test]
    fn test_write_manifest_creates_outdir() {
        let temp = TempDir::new().unwrap();
        let outdir = temp.path().join("dist");
        let path = write_manifest(&manifest(), &outdir).unwrap();
        assert_eq!(path, outdir.join(MANIFEST_FILE));

        let written: Manifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, manifest());
        assert!(!outdir.join(".custom-elements.json.tmp").exists());
    }

    #[test]
    fn test_diagnostics_json_counts() {
        let diagnostics = vec![
            Diagnostic::new("a.js", DiagnosticKind::ParseFailure, "bad"),
            Diagnostic::new("b.js", DiagnosticKind::SyntaxError, "missing brace").at_line(2),
            Diagnostic::new("b.js", DiagnosticKind::UnresolvedReference, "Base"),
        ];
        let summary = RunSummary {
            passed: true,
            modules: 1,
            diagnostics: &diagnostics,
            dangling: &[],
        };
        let value: serde_json::Value =
            serde_json::from_str(&diagnostics_json(&summary).unwrap()).unwrap();
        assert_eq!(value["errors"], 1);
        assert_eq!(value["warnings"], 1);
        assert_eq!(value["diagnostics"][1]["kind"], "syntax-error");
        assert_eq!(value["diagnostics"][1]["line"], 2);
        assert!(value.get("dangling").is_none());
    }
}
