//! Manifest merging and validation.

use std::collections::BTreeSet;

use tracing::{debug, error};

use crate::error::DanglingReference;
use crate::link::GLOBAL_PACKAGE;
use crate::manifest::{ExportKind, Manifest, Module, Reference};
use crate::package::Package;

/// Combine linked modules into one manifest.
///
/// Modules are ordered by path; declarations and exports keep their order.
/// Definitions naming the same `(tag, class)` pair are kept once, at their
/// first occurrence in module order.
pub fn merge(mut modules: Vec<Module>) -> Manifest {
    modules.sort_by(|a, b| a.path.cmp(&b.path));

    let mut definitions = BTreeSet::new();
    let mut duplicates = 0;
    for module in modules.iter_mut() {
        module.exports.retain(|export| {
            if export.kind != ExportKind::CustomElementDefinition {
                return true;
            }
            let fresh = definitions.insert((export.name.clone(), export.declaration.clone()));
            if !fresh {
                duplicates += 1;
            }
            fresh
        });
    }
    if duplicates > 0 {
        debug!(duplicates, "dropped duplicate custom element definitions");
    }

    Manifest {
        modules,
        ..Default::default()
    }
}

/// Check that every reference in the manifest names a declaration.
///
/// Module references must name a declaration of this run (internal ones
/// included); package references must name a declaration of that package
/// when it is loaded. Platform classes and unloaded packages are not checked.
pub fn validate(manifest: &Manifest, packages: &[Package]) -> Vec<DanglingReference> {
    let mut dangling = Vec::new();

    for module in &manifest.modules {
        let mut check = |location: String, reference: &Reference| {
            if !resolves(manifest, packages, reference) {
                dangling.push(DanglingReference {
                    module: module.path.clone(),
                    location,
                    reference: reference.clone(),
                });
            }
        };

        for declaration in &module.declarations {
            let Some(class) = declaration.as_class() else {
                continue;
            };
            if let Some(superclass) = &class.superclass {
                check(format!("{}.superclass", class.name), superclass);
            }
            for (i, mixin) in class.mixins.iter().enumerate() {
                check(format!("{}.mixins[{}]", class.name, i), mixin);
            }
            for member in &class.members {
                if let Some(from) = &member.inherited_from {
                    check(format!("{}.{}.inheritedFrom", class.name, member.name), from);
                }
            }
            for attribute in &class.attributes {
                if let Some(from) = &attribute.inherited_from {
                    check(format!("{}[{}].inheritedFrom", class.name, attribute.name), from);
                }
            }
            for event in &class.events {
                if let Some(from) = &event.inherited_from {
                    check(format!("{}@{}.inheritedFrom", class.name, event.name), from);
                }
            }
        }

        for export in &module.exports {
            check(format!("exports.{}", export.name), &export.declaration);
        }
    }

    for d in &dangling {
        error!("dangling reference {}", d);
    }
    dangling
}

fn resolves(manifest: &Manifest, packages: &[Package], reference: &Reference) -> bool {
    match (&reference.package, &reference.module) {
        (Some(package), _) if package == GLOBAL_PACKAGE => true,
        (Some(package), _) => match packages.iter().find(|p| &p.name == package) {
            Some(loaded) => loaded.contains(reference),
            None => true,
        },
        (None, Some(module)) => manifest
            .module(module)
            .and_then(|m| m.declaration(&reference.name))
            .is_some(),
        (None, None) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ClassDoc, Declaration, Export};

    fn module_with_class(path: &str, name: &str) -> Module {
        let mut module = Module::new(path);
        module
            .declarations
            .push(Declaration::Class(ClassDoc::new(name)));
        module
    }

    #[test]
    fn test_merge_orders_by_path_and_dedups_definitions() {
        let mut b = module_with_class("src/b.js", "B");
        let def = Export::definition("x-b", Reference::local("B", "src/b.js"));
        b.exports.push(def.clone());
        b.exports.push(def.clone());
        let mut a = module_with_class("src/a.js", "A");
        a.exports.push(def);

        let manifest = merge(vec![b, a]);
        assert_eq!(manifest.modules[0].path, "src/a.js");
        assert_eq!(manifest.custom_element_definitions().count(), 1);
        assert_eq!(manifest.modules[0].exports.len(), 1);
        assert!(manifest.modules[1].exports.is_empty());
    }

    #[test]
    fn test_validate_reports_dangling() {
        let mut a = module_with_class("src/a.js", "A");
        if let Declaration::Class(class) = &mut a.declarations[0] {
            class.superclass = Some(Reference::local("Gone", "src/gone.js"));
            class.mixins = vec![Reference::package("HTMLElement", GLOBAL_PACKAGE)];
        }
        a.exports
            .push(Export::js("A", Reference::local("A", "src/a.js")));
        a.exports
            .push(Export::js("Lit", Reference::package("LitElement", "lit")));

        let manifest = merge(vec![a]);
        let dangling = validate(&manifest, &[]);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].location, "A.superclass");
        assert_eq!(dangling[0].reference.name, "Gone");
    }
}
