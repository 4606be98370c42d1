//! Global linking phases.
//!
//! Runs after every module has been collected. Nothing here holds a tree or
//! a pointer into another module: cross-module relations are `Reference`
//! values looked up by `(module, name)` in tables built for the phase.
//!
//! Order: inheritance edges are resolved, cycles broken, members flattened
//! (see [`inheritance`]); then registrations and exports are resolved into
//! manifest exports (see [`exports`]).

pub mod exports;
pub mod inheritance;

use phf::phf_set;
use tracing::debug;

use crate::analysis::ModuleFacts;
use crate::diagnostics::Diagnostic;
use crate::manifest::{Declaration, Module};
use crate::package::Package;

pub use exports::{ExportResolver, Resolution};
pub use inheritance::ClassGraph;

/// Package name used for platform classes such as `HTMLElement`.
pub const GLOBAL_PACKAGE: &str = "global:";

/// Default bound on re-export hops before a name is given up on.
pub const DEFAULT_MAX_REEXPORT_HOPS: usize = 16;

/// Platform base classes that resolve to [`GLOBAL_PACKAGE`].
static PLATFORM_GLOBALS: phf::Set<&'static str> = phf_set! {
    "HTMLElement",
    "HTMLAnchorElement",
    "HTMLButtonElement",
    "HTMLDialogElement",
    "HTMLDivElement",
    "HTMLFormElement",
    "HTMLImageElement",
    "HTMLInputElement",
    "HTMLLabelElement",
    "HTMLLIElement",
    "HTMLOListElement",
    "HTMLParagraphElement",
    "HTMLSelectElement",
    "HTMLSpanElement",
    "HTMLTableElement",
    "HTMLTemplateElement",
    "HTMLTextAreaElement",
    "HTMLUListElement",
    "Element",
    "Node",
    "EventTarget",
    "Event",
    "CustomEvent",
    "SVGElement",
};

pub fn is_platform_global(name: &str) -> bool {
    PLATFORM_GLOBALS.contains(name)
}

/// Options for the global phases.
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub max_reexport_hops: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            max_reexport_hops: DEFAULT_MAX_REEXPORT_HOPS,
        }
    }
}

/// Output of linking: one manifest module per analyzed module, in path order.
#[derive(Debug, Default)]
pub struct Linked {
    pub modules: Vec<Module>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Paths a module specifier may refer to, most specific first.
///
/// `./a.js` written in TypeScript sources usually names `a.ts`, and
/// extensionless specifiers name a file or a directory index.
pub fn module_candidates(path: &str) -> Vec<String> {
    let mut candidates = vec![path.to_string()];
    let file = path.rsplit('/').next().unwrap_or(path);

    match file.rfind('.') {
        Some(dot) => {
            let stem = &path[..path.len() - (file.len() - dot)];
            match &file[dot..] {
                ".js" | ".jsx" => {
                    for ext in ["ts", "tsx", "mts"] {
                        candidates.push(format!("{}.{}", stem, ext));
                    }
                }
                ".mjs" => candidates.push(format!("{}.mts", stem)),
                ".cjs" => candidates.push(format!("{}.cts", stem)),
                _ => {}
            }
        }
        None => {
            for ext in ["js", "ts", "tsx", "mjs", "jsx"] {
                candidates.push(format!("{}.{}", path, ext));
            }
            for ext in ["js", "ts"] {
                candidates.push(format!("{}/index.{}", path, ext));
            }
        }
    }
    candidates
}

/// Link collected modules against each other and the loaded packages.
pub fn link(mut modules: Vec<ModuleFacts>, packages: &[Package], options: LinkOptions) -> Linked {
    modules.sort_by(|a, b| a.path.cmp(&b.path));
    let mut diagnostics = Vec::new();

    let (edges, module_exports, tags) = {
        let resolver = ExportResolver::new(&modules, packages, options.max_reexport_hops);
        let edges = inheritance::resolve_edges(&modules, &resolver, &mut diagnostics);

        let mut module_exports = Vec::with_capacity(modules.len());
        let mut tags = Vec::new();
        for facts in &modules {
            let mut exports = resolver.module_exports(facts, &mut diagnostics);
            let (definitions, registered) = resolver.definition_exports(facts, &mut diagnostics);
            exports.extend(definitions);
            tags.extend(registered);
            module_exports.push(exports);
        }
        (edges, module_exports, tags)
    };

    for edge in edges {
        if let Some(class) = modules[edge.module].declarations[edge.declaration].as_class_mut() {
            class.superclass = edge.superclass;
            class.mixins = edge.mixins;
        }
    }

    let flattened = {
        let mut graph = ClassGraph::new(&modules, packages);
        graph.break_cycles(&mut diagnostics);
        graph.flatten_all()
    };
    for (module, declaration, flat) in flattened {
        if let Some(class) = modules[module].declarations[declaration].as_class_mut() {
            class.members = flat.members;
            class.attributes = flat.attributes;
            class.events = flat.events;
        }
    }

    for (target, tag) in tags {
        let Some(path) = target.module.as_deref().filter(|_| target.package.is_none()) else {
            continue;
        };
        let Some(facts) = modules.iter_mut().find(|m| m.path == path) else {
            continue;
        };
        if let Some(class) = facts
            .declaration_mut(&target.name)
            .and_then(Declaration::as_class_mut)
        {
            if class.tag_name.is_none() {
                class.tag_name = Some(tag);
            }
            class.custom_element = true;
        }
    }

    let modules: Vec<Module> = modules
        .into_iter()
        .zip(module_exports)
        .map(|(facts, exports)| Module {
            path: facts.path,
            summary: facts.summary,
            description: facts.description,
            declarations: facts.declarations,
            exports,
            partial: facts.partial,
            ..Module::new("")
        })
        .collect();

    debug!(
        modules = modules.len(),
        diagnostics = diagnostics.len(),
        "linked modules"
    );
    Linked {
        modules,
        diagnostics,
    }
}
