//! Analysis context: per-module results cached across runs.
//!
//! The AnalysisContext provides:
//! - Parallel per-module analysis (parse, collect, plugin hooks, ignore filter)
//! - A cache of module facts keyed by module path, so watch mode re-analyzes
//!   only the modules that changed
//! - The global phases (link, merge, validate, public view) over the cache

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::collector::collect_module;
use crate::analysis::provider_for_path;
use crate::analysis::{ModuleFacts, ParsedModule};
use crate::diagnostics::{sort_diagnostics, Diagnostic, DiagnosticKind};
use crate::error::{AnalyzeError, SyntaxError};
use crate::link::{link, LinkOptions};
use crate::manifest::Manifest;
use crate::merge::{merge, validate};
use crate::package::Package;
use crate::plugins::PluginPipeline;
use crate::visibility::{drop_ignored, internal_count, public_view};

/// One module handed to the analyzer.
#[derive(Debug)]
pub enum SourceInput {
    /// A file read by the analyzer. `path` is the module path.
    File { path: String, file: PathBuf },
    /// Source text already in memory.
    Text { path: String, source: Vec<u8> },
    /// A tree built by the caller.
    Parsed(ParsedModule),
}

impl SourceInput {
    pub fn text(path: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        SourceInput::Text {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Module path of the input.
    pub fn path(&self) -> &str {
        match self {
            SourceInput::File { path, .. } | SourceInput::Text { path, .. } => path,
            SourceInput::Parsed(parsed) => &parsed.path,
        }
    }
}

/// Cached result of the per-module phases.
#[derive(Debug, Clone)]
enum Analyzed {
    Module(ModuleFacts),
    /// The module never produced a tree.
    Failed(Diagnostic),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// The manifest as emitted (internal declarations removed).
    pub manifest: Manifest,
    /// All diagnostics, sorted by module path.
    pub diagnostics: Vec<Diagnostic>,
}

/// Analysis state for one source tree.
pub struct AnalysisContext {
    pipeline: PluginPipeline,
    packages: Vec<Package>,
    link_options: LinkOptions,
    /// Diagnostics not tied to a module (e.g. unavailable plugins).
    run_diagnostics: Vec<Diagnostic>,
    cache: RwLock<BTreeMap<String, Analyzed>>,
}

impl AnalysisContext {
    /// Create a new analysis context.
    pub fn new(pipeline: PluginPipeline) -> Self {
        crate::analysis::register_providers();
        Self {
            pipeline,
            packages: Vec::new(),
            link_options: LinkOptions::default(),
            run_diagnostics: Vec::new(),
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_packages(mut self, packages: Vec<Package>) -> Self {
        self.packages = packages;
        self
    }

    pub fn with_link_options(mut self, options: LinkOptions) -> Self {
        self.link_options = options;
        self
    }

    /// Attach run-level diagnostics, reported with every run.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.run_diagnostics.extend(diagnostics);
        self
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Run the per-module phases for each input, in parallel, replacing any
    /// cached result for the same module path.
    ///
    /// Returns the number of modules that produced facts.
    pub fn analyze_sources(&self, inputs: Vec<SourceInput>) -> usize {
        let results: Vec<(String, Analyzed)> = inputs
            .into_par_iter()
            .map(|input| self.analyze_one(input))
            .collect();

        let analyzed = results
            .iter()
            .filter(|(_, r)| matches!(r, Analyzed::Module(_)))
            .count();

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        for (path, result) in results {
            cache.insert(path, result);
        }
        debug!(analyzed, cached = cache.len(), "per-module phases finished");
        analyzed
    }

    /// Re-run the per-module phases for changed modules.
    pub fn update(&self, inputs: Vec<SourceInput>) -> usize {
        self.analyze_sources(inputs)
    }

    /// Forget a module that no longer exists.
    pub fn remove(&self, path: &str) -> bool {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.remove(path).is_some()
    }

    /// Cached facts for one module.
    pub fn facts(&self, path: &str) -> Option<ModuleFacts> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match cache.get(path) {
            Some(Analyzed::Module(facts)) => Some(facts.clone()),
            _ => None,
        }
    }

    /// All cached module paths, sorted.
    pub fn module_paths(&self) -> Vec<String> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.keys().cloned().collect()
    }

    pub fn clear_cache(&self) {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.clear();
    }

    fn analyze_one(&self, input: SourceInput) -> (String, Analyzed) {
        let path = input.path().to_string();
        match self.parse(input) {
            Ok(parsed) => {
                let facts = drop_ignored(collect_module(&parsed, &self.pipeline));
                (path, Analyzed::Module(facts))
            }
            Err(message) => {
                warn!(module = %path, "parse failure: {}", message);
                let diagnostic =
                    Diagnostic::new(path.as_str(), DiagnosticKind::ParseFailure, message);
                (path, Analyzed::Failed(diagnostic))
            }
        }
    }

    fn parse(&self, input: SourceInput) -> Result<ParsedModule, String> {
        let (path, source) = match input {
            SourceInput::Parsed(parsed) => return Ok(parsed),
            SourceInput::Text { path, source } => (path, source),
            SourceInput::File { path, file } => {
                let source = fs::read(&file)
                    .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
                (path, source)
            }
        };

        let ext = path.rsplit('.').next().unwrap_or_default().to_string();
        let provider = provider_for_path(&path)
            .ok_or_else(|| SyntaxError::UnsupportedExtension(ext).to_string())?;
        provider
            .parse(std::path::Path::new(&path), &source)
            .map_err(|e| e.to_string())
    }

    /// Run the global phases over every cached module.
    ///
    /// Works on copies of the cached facts, so a failed run leaves the cache
    /// untouched and the next run starts from the same state.
    pub fn link(&self) -> Result<AnalysisOutput, AnalyzeError> {
        let mut diagnostics = self.run_diagnostics.clone();
        let mut modules = Vec::new();
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            for result in cache.values() {
                match result {
                    Analyzed::Module(facts) => {
                        diagnostics.extend(facts.diagnostics.iter().cloned());
                        modules.push(facts.clone());
                    }
                    Analyzed::Failed(diagnostic) => diagnostics.push(diagnostic.clone()),
                }
            }
        }

        if modules.is_empty() {
            sort_diagnostics(&mut diagnostics);
            return Err(AnalyzeError::NoModules { diagnostics });
        }

        let module_count = modules.len();
        let linked = link(modules, &self.packages, self.link_options);
        diagnostics.extend(linked.diagnostics);

        let manifest = merge(linked.modules);
        let dangling = validate(&manifest, &self.packages);
        if !dangling.is_empty() {
            for d in &dangling {
                diagnostics.push(Diagnostic::new(
                    d.module.as_str(),
                    DiagnosticKind::MergeValidation,
                    format!("{} -> {} does not resolve", d.location, d.reference.name),
                ));
            }
            sort_diagnostics(&mut diagnostics);
            return Err(AnalyzeError::Validation {
                dangling,
                diagnostics,
            });
        }

        let hidden = internal_count(&manifest);
        let manifest = public_view(manifest);
        sort_diagnostics(&mut diagnostics);

        info!(
            modules = module_count,
            definitions = manifest.custom_element_definitions().count(),
            hidden,
            diagnostics = diagnostics.len(),
            "analysis complete"
        );
        Ok(AnalysisOutput {
            manifest,
            diagnostics,
        })
    }

    /// Analyze inputs from scratch and run the global phases.
    pub fn run(&self, inputs: Vec<SourceInput>) -> Result<AnalysisOutput, AnalyzeError> {
        self.clear_cache();
        self.analyze_sources(inputs);
        self.link()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> AnalysisContext {
        AnalysisContext::new(PluginPipeline::default())
    }

    #[test]
    fn test_parse_failure_is_isolated() {
        let ctx = context();
        let analyzed = ctx.analyze_sources(vec![
            SourceInput::text("src/ok.js", "export class Ok extends HTMLElement {}"),
            SourceInput::text("src/readme.md", "# not a module"),
            SourceInput::text("src/bad.js", vec![0xff, 0xfe, 0x00]),
        ]);
        assert_eq!(analyzed, 1);

        let output = ctx.link().unwrap();
        assert_eq!(output.manifest.modules.len(), 1);
        let failures: Vec<_> = output
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ParseFailure)
            .map(|d| d.module.as_str())
            .collect();
        assert_eq!(failures, vec!["src/bad.js", "src/readme.md"]);
    }

    #[test]
    fn test_no_modules_is_an_error() {
        let ctx = context();
        ctx.analyze_sources(vec![SourceInput::text("a.txt", "text")]);
        let err = ctx.link().unwrap_err();
        assert!(matches!(err, AnalyzeError::NoModules { .. }));
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_file_inputs_are_read() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("el.js");
        fs::write(&file, "export class El extends HTMLElement {}").unwrap();

        let ctx = context();
        ctx.analyze_sources(vec![
            SourceInput::File {
                path: "el.js".to_string(),
                file,
            },
            SourceInput::File {
                path: "missing.js".to_string(),
                file: temp.path().join("missing.js"),
            },
        ]);
        assert!(ctx.facts("el.js").is_some());
        assert!(ctx.facts("missing.js").is_none());
        assert_eq!(ctx.module_paths(), vec!["el.js", "missing.js"]);
    }

    #[test]
    fn test_update_and_remove() {
        let ctx = context();
        ctx.analyze_sources(vec![
            SourceInput::text("a.js", "export class A extends HTMLElement {}"),
            SourceInput::text("b.js", "export class B {}"),
        ]);
        ctx.update(vec![SourceInput::text("a.js", "export class A2 {}")]);
        assert!(ctx.remove("b.js"));
        assert!(!ctx.remove("b.js"));

        let output = ctx.link().unwrap();
        assert_eq!(output.manifest.modules.len(), 1);
        assert!(output.manifest.class("a.js", "A2").is_some());
    }
}
