//! cem-analyzer - custom elements manifest analyzer.
//!
//! Reads JavaScript and TypeScript modules, finds the classes that are (or
//! may become) custom elements, and produces a manifest describing their
//! members, attributes, events, slots, CSS hooks and registrations.
//!
//! # Architecture
//!
//! The codebase uses tree-sitter for AST-based analysis:
//!
//! - `analysis`: per-module phases (parse, collect, class analysis) and the
//!   cached `AnalysisContext` driving a run
//! - `plugins`: framework hooks (Lit, FAST, Stencil) interleaved with analysis
//! - `visibility`: `@ignore` and `@internal` filtering
//! - `link`: inheritance flattening, registrations and export resolution
//! - `merge`: ordering, de-duplication and validation of the final manifest
//! - `package`: dependency manifests used as read-only linking context
//! - `report`: manifest emission and diagnostics output
//! - `watch`: debounced re-analysis on file changes
//!
//! # Example
//!
//! ```no_run
//! use cem_analyzer::{AnalysisContext, PluginPipeline, SourceInput};
//!
//! let context = AnalysisContext::new(PluginPipeline::default());
//! let output = context
//!     .run(vec![SourceInput::text(
//!         "src/my-element.js",
//!         "export class MyElement extends HTMLElement {}\ncustomElements.define('my-element', MyElement);",
//!     )])
//!     .unwrap();
//! println!("{}", cem_analyzer::report::to_json(&output.manifest).unwrap());
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod link;
pub mod loader;
pub mod manifest;
pub mod merge;
pub mod package;
pub mod plugins;
pub mod report;
pub mod visibility;
pub mod watch;

pub use analysis::{AnalysisContext, AnalysisOutput, ParsedModule, SourceInput, SyntaxProvider};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticKind, Severity};
pub use error::{AnalyzeError, DanglingReference, PackageError, PluginError};
pub use link::LinkOptions;
pub use loader::SourceSet;
pub use manifest::{Manifest, Module, Reference};
pub use package::Package;
pub use plugins::{Plugin, PluginPipeline};

/// Initialize all subsystems.
///
/// Registers syntax providers and built-in plugins. Safe to call repeatedly.
pub fn init() {
    analysis::register_providers();
    plugins::init();
}
