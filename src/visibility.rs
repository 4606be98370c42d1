//! Documentation-driven visibility.
//!
//! `@ignore` removes a node before linking: ignored declarations are never
//! inherited, registered or exported. `@internal` only hides a node from the
//! emitted view, so internal bases still contribute members to subclasses.

use std::collections::BTreeSet;

use tracing::debug;

use crate::analysis::facts::ExportRecord;
use crate::analysis::ModuleFacts;
use crate::manifest::{Annotations, ClassDoc, Declaration, Manifest};

pub const IGNORE: &str = "ignore";
pub const INTERNAL: &str = "internal";

/// Whether an annotation set removes its node before linking.
pub fn is_ignored(annotations: &Annotations) -> bool {
    annotations.has(IGNORE)
}

/// Whether an annotation set hides its node from the emitted manifest.
pub fn is_internal(annotations: &Annotations) -> bool {
    annotations.has(INTERNAL)
}

/// Drop ignored declarations and members from one module.
///
/// Local exports and registrations naming a dropped declaration go with it.
/// The dropped names are recorded so other modules re-exporting them are
/// dropped silently instead of being reported as unresolved.
pub fn drop_ignored(mut facts: ModuleFacts) -> ModuleFacts {
    let mut ignored = BTreeSet::new();
    facts.declarations.retain(|d| {
        if is_ignored(d.annotations()) {
            ignored.insert(d.name().to_string());
            false
        } else {
            true
        }
    });

    for declaration in facts.declarations.iter_mut() {
        if let Some(class) = declaration.as_class_mut() {
            strip_class(class, is_ignored);
        }
    }

    if !ignored.is_empty() {
        debug!(module = %facts.path, ?ignored, "dropped ignored declarations");
        facts.exports.retain(|e| match e {
            ExportRecord::Local { local, .. } => !ignored.contains(local),
            _ => true,
        });
        let path = facts.path.clone();
        facts.definitions.retain(|d| {
            !(d.class.package.is_none()
                && d.class.module.as_deref() == Some(path.as_str())
                && ignored.contains(&d.class.name))
        });
    }

    facts.ignored.extend(ignored);
    facts
}

/// Remove members, attributes and events matching `hidden`.
fn strip_class(class: &mut ClassDoc, hidden: fn(&Annotations) -> bool) {
    class.members.retain(|m| !hidden(&m.annotations));
    class.attributes.retain(|a| !hidden(&a.annotations));
    class.events.retain(|e| !hidden(&e.annotations));
}

/// The manifest as emitted: internal declarations, members and the exports
/// pointing at them are removed.
///
/// References into internal declarations are kept. A public class may still
/// name a hidden base in `superclass` or `mixins`, and inherited members keep
/// an `inheritedFrom` pointing at it, so consumers must tolerate targets that
/// are absent from the emitted modules.
pub fn public_view(mut manifest: Manifest) -> Manifest {
    let mut internal = BTreeSet::new();
    for module in &manifest.modules {
        for declaration in &module.declarations {
            if is_internal(declaration.annotations()) {
                internal.insert((module.path.clone(), declaration.name().to_string()));
            }
        }
    }

    for module in manifest.modules.iter_mut() {
        module
            .declarations
            .retain(|d| !is_internal(d.annotations()));
        for declaration in module.declarations.iter_mut() {
            if let Some(class) = declaration.as_class_mut() {
                strip_class(class, is_internal);
            }
        }
        module.exports.retain(|export| {
            let target = &export.declaration;
            match (&target.package, &target.module) {
                (None, Some(path)) => !internal.contains(&(path.clone(), target.name.clone())),
                _ => true,
            }
        });
    }

    manifest
}

/// Count of declarations a public view would hide.
pub fn internal_count(manifest: &Manifest) -> usize {
    manifest
        .modules
        .iter()
        .flat_map(|m| m.declarations.iter())
        .filter(|d: &&Declaration| is_internal(d.annotations()))
        .count()
}
