//! Module linking: export chasing and registration resolution.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::analysis::facts::{ExportRecord, Specifier};
use crate::analysis::ModuleFacts;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::manifest::{Export, Reference};
use crate::package::Package;

use super::{is_platform_global, module_candidates, GLOBAL_PACKAGE};

/// Where a name ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A declaration in this run or in a loaded package.
    Declaration(Reference),
    /// Something outside everything loaded: an unloaded package or a
    /// platform class.
    External(Reference),
    /// A declaration removed by `@ignore`.
    Ignored,
    Unresolved(String),
}

type Visited = BTreeSet<(String, String)>;

/// Resolves names through exports, imports and re-exports.
pub struct ExportResolver<'a> {
    modules: BTreeMap<&'a str, &'a ModuleFacts>,
    packages: &'a [Package],
    max_hops: usize,
}

impl<'a> ExportResolver<'a> {
    pub fn new(modules: &'a [ModuleFacts], packages: &'a [Package], max_hops: usize) -> Self {
        Self {
            modules: modules.iter().map(|m| (m.path.as_str(), m)).collect(),
            packages,
            max_hops,
        }
    }

    /// Look up a module by specifier path.
    pub fn module(&self, path: &str) -> Option<&'a ModuleFacts> {
        module_candidates(path)
            .iter()
            .find_map(|candidate| self.modules.get(candidate.as_str()).copied())
    }

    pub fn package(&self, name: &str) -> Option<&'a Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Resolve a name exported by a module.
    pub fn resolve_export(&self, module: &str, name: &str) -> Resolution {
        match self.module(module) {
            Some(facts) => self.chase(facts, name, 0, &mut Visited::new()),
            None => Resolution::Unresolved(format!("module {} is not analyzed", module)),
        }
    }

    fn chase(&self, module: &ModuleFacts, name: &str, hops: usize, visited: &mut Visited) -> Resolution {
        if hops > self.max_hops {
            return Resolution::Unresolved(format!(
                "gave up after {} re-export hops",
                self.max_hops
            ));
        }
        if !visited.insert((module.path.clone(), name.to_string())) {
            return Resolution::Unresolved(format!("circular re-export of `{}`", name));
        }

        for record in &module.exports {
            match record {
                ExportRecord::Local { exported, local } if exported == name => {
                    return self.local_binding(module, local, hops, visited);
                }
                ExportRecord::ReExport {
                    exported,
                    imported,
                    source,
                } if exported == name => {
                    return self.follow(source, imported, hops + 1, visited);
                }
                _ => {}
            }
        }

        // `export *` never forwards `default`.
        if name != "default" {
            for record in &module.exports {
                let ExportRecord::Star { source } = record else {
                    continue;
                };
                if let Specifier::Package { name: package, .. } = source {
                    if self.package(package).is_none() {
                        continue;
                    }
                }
                match self.follow(source, name, hops + 1, visited) {
                    Resolution::Unresolved(_) => continue,
                    found => return found,
                }
            }
        }

        Resolution::Unresolved(format!("`{}` is not exported by {}", name, module.path))
    }

    /// What a local name in `module` refers to.
    fn local_binding(
        &self,
        module: &ModuleFacts,
        local: &str,
        hops: usize,
        visited: &mut Visited,
    ) -> Resolution {
        if module.ignored.contains(local) {
            return Resolution::Ignored;
        }
        if module.declaration(local).is_some() {
            return Resolution::Declaration(Reference::local(local, module.path.clone()));
        }
        match module.import(local) {
            Some(import) if import.imported == "*" => Resolution::Unresolved(format!(
                "namespace import `{}` does not name a declaration",
                local
            )),
            Some(import) => self.follow(&import.source, &import.imported, hops + 1, visited),
            None => Resolution::Unresolved(format!("`{}` is not declared in {}", local, module.path)),
        }
    }

    fn follow(&self, source: &Specifier, name: &str, hops: usize, visited: &mut Visited) -> Resolution {
        match source {
            Specifier::Local(path) => match self.module(path) {
                Some(target) => self.chase(target, name, hops, visited),
                None => Resolution::Unresolved(format!("module {} is not analyzed", path)),
            },
            Specifier::Package { name: package, subpath } => {
                self.resolve_package(package, subpath.as_deref(), name)
            }
        }
    }

    /// Resolve a name imported from a package.
    pub fn resolve_package(&self, package: &str, subpath: Option<&str>, name: &str) -> Resolution {
        match self.package(package) {
            Some(loaded) => match loaded.export(subpath, name) {
                Some(reference) => Resolution::Declaration(reference),
                None => Resolution::Unresolved(format!(
                    "package {} does not export `{}`",
                    package, name
                )),
            },
            None => Resolution::External(Reference {
                name: name.to_string(),
                package: Some(package.to_string()),
                module: subpath.map(str::to_string),
            }),
        }
    }

    /// Resolve a reference hint produced by the collector.
    ///
    /// Bare names are looked up in the referring module, then by exported
    /// name in every analyzed module (path order), then in the packages,
    /// then among the platform classes.
    pub fn resolve_reference(&self, from: &ModuleFacts, hint: &Reference) -> Resolution {
        if let Some(package) = &hint.package {
            if package == GLOBAL_PACKAGE {
                return Resolution::External(hint.clone());
            }
            return self.resolve_package(package, hint.module.as_deref(), &hint.name);
        }

        if let Some(module) = &hint.module {
            if *module == from.path {
                return self.local_binding(from, &hint.name, 0, &mut Visited::new());
            }
            return self.resolve_export(module, &hint.name);
        }

        if from.ignored.contains(&hint.name) {
            return Resolution::Ignored;
        }
        if from.declaration(&hint.name).is_some() {
            return Resolution::Declaration(Reference::local(hint.name.clone(), from.path.clone()));
        }
        for facts in self.modules.values() {
            match self.chase(facts, &hint.name, 0, &mut Visited::new()) {
                found @ (Resolution::Declaration(_) | Resolution::Ignored) => return found,
                _ => {}
            }
        }
        for package in self.packages {
            if let Some(reference) = package.export(None, &hint.name) {
                return Resolution::Declaration(reference);
            }
        }
        if is_platform_global(&hint.name) {
            return Resolution::External(Reference::package(hint.name.clone(), GLOBAL_PACKAGE));
        }
        Resolution::Unresolved(format!("`{}` is not declared or exported anywhere", hint.name))
    }

    /// Materialize a module's export records. Explicit exports come first,
    /// then names forwarded by `export *` that nothing explicit shadows.
    pub fn module_exports(&self, facts: &ModuleFacts, diagnostics: &mut Vec<Diagnostic>) -> Vec<Export> {
        let mut exports = Vec::new();
        let mut names = BTreeSet::new();

        for record in &facts.exports {
            let resolution = match record {
                ExportRecord::Local { local, .. } => {
                    self.local_binding(facts, local, 0, &mut Visited::new())
                }
                ExportRecord::ReExport {
                    imported, source, ..
                } => self.follow(source, imported, 1, &mut Visited::new()),
                ExportRecord::Star { .. } => continue,
            };
            if let Some(exported) = record.exported() {
                names.insert(exported.to_string());
                self.push_export(facts, exported, resolution, &mut exports, diagnostics);
            }
        }

        for record in &facts.exports {
            let ExportRecord::Star { source } = record else {
                continue;
            };
            if let Specifier::Local(path) = source {
                if self.module(path).is_none() {
                    diagnostics.push(Diagnostic::new(
                        facts.path.as_str(),
                        DiagnosticKind::UnresolvedReference,
                        format!("`export *` from unknown module {}", path),
                    ));
                    continue;
                }
            }
            for name in self.exported_names(source, &mut BTreeSet::new()) {
                if name == "default" || !names.insert(name.clone()) {
                    continue;
                }
                let resolution = self.follow(source, &name, 1, &mut Visited::new());
                self.push_export(facts, &name, resolution, &mut exports, diagnostics);
            }
        }
        exports
    }

    fn push_export(
        &self,
        facts: &ModuleFacts,
        name: &str,
        resolution: Resolution,
        exports: &mut Vec<Export>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        match resolution {
            Resolution::Declaration(reference) | Resolution::External(reference) => {
                exports.push(Export::js(name, reference));
            }
            Resolution::Ignored => {
                debug!(module = %facts.path, export = name, "export of ignored declaration dropped");
            }
            Resolution::Unresolved(reason) => {
                diagnostics.push(Diagnostic::new(
                    facts.path.as_str(),
                    DiagnosticKind::UnresolvedReference,
                    format!("export `{}` dropped: {}", name, reason),
                ));
            }
        }
    }

    /// Names a module specifier exports, following nested `export *`.
    fn exported_names(&self, source: &Specifier, seen: &mut BTreeSet<String>) -> Vec<String> {
        match source {
            Specifier::Local(path) => {
                let Some(module) = self.module(path) else {
                    return Vec::new();
                };
                if !seen.insert(module.path.clone()) || seen.len() > self.max_hops {
                    return Vec::new();
                }
                let mut names = Vec::new();
                for record in &module.exports {
                    match record {
                        ExportRecord::Star { source } => {
                            names.extend(self.exported_names(source, seen));
                        }
                        other => names.extend(other.exported().map(str::to_string)),
                    }
                }
                names
            }
            Specifier::Package { name, subpath } => match self.package(name) {
                Some(package) => package.export_names(subpath.as_deref()),
                None => {
                    debug!(package = %name, "cannot enumerate exports of an unloaded package");
                    Vec::new()
                }
            },
        }
    }

    /// Resolve a module's registrations into definition exports.
    ///
    /// Also returns the resolved `(class, tag)` pairs so registered classes
    /// can be marked as custom elements.
    pub fn definition_exports(
        &self,
        facts: &ModuleFacts,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> (Vec<Export>, Vec<(Reference, String)>) {
        let mut exports = Vec::new();
        let mut registered = Vec::new();

        for record in &facts.definitions {
            let class = match self.resolve_reference(facts, &record.class) {
                Resolution::Declaration(reference) => {
                    registered.push((reference.clone(), record.tag.clone()));
                    reference
                }
                Resolution::External(reference) => reference,
                Resolution::Ignored => continue,
                Resolution::Unresolved(reason) => {
                    let mut diagnostic = Diagnostic::new(
                        facts.path.as_str(),
                        DiagnosticKind::UnresolvedReference,
                        format!("class registered as <{}>: {}", record.tag, reason),
                    );
                    if record.span.start_line > 0 {
                        diagnostic = diagnostic.at_line(record.span.start_line);
                    }
                    diagnostics.push(diagnostic);
                    Reference::external(record.class.name.clone())
                }
            };
            exports.push(Export::definition(record.tag.clone(), class));
        }
        (exports, registered)
    }
}
