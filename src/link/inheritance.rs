//! Inheritance: edge resolution, cycle breaking and member flattening.
//!
//! A class's effective members are its own members in source order followed
//! by whatever its parents contribute that it does not override. Parents are
//! visited mixins first (outermost first), then the superclass, so a mixin
//! shadows the base and the class shadows both. Members are keyed by
//! `(name, static)`; attributes and events by name.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::analysis::ModuleFacts;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::manifest::{Attribute, ClassDoc, ClassMember, Event, Reference};
use crate::package::Package;

use super::exports::{ExportResolver, Resolution};

/// Resolved parents of one class declaration.
#[derive(Debug)]
pub struct EdgeUpdate {
    pub module: usize,
    pub declaration: usize,
    pub superclass: Option<Reference>,
    pub mixins: Vec<Reference>,
}

/// Resolve the superclass and mixin references of every class.
///
/// Unresolvable references become bare external references and are reported
/// as informational diagnostics; they are terminal for flattening.
pub fn resolve_edges(
    modules: &[ModuleFacts],
    resolver: &ExportResolver<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<EdgeUpdate> {
    let mut updates = Vec::new();
    for (module, facts) in modules.iter().enumerate() {
        for (declaration, decl) in facts.declarations.iter().enumerate() {
            let Some(class) = decl.as_class() else {
                continue;
            };
            let mut resolve = |hint: &Reference, role: &str| -> Reference {
                match resolver.resolve_reference(facts, hint) {
                    Resolution::Declaration(reference) | Resolution::External(reference) => {
                        reference
                    }
                    Resolution::Ignored => {
                        debug!(module = %facts.path, class = %class.name, "{} is ignored", hint.name);
                        Reference::external(hint.name.clone())
                    }
                    Resolution::Unresolved(reason) => {
                        diagnostics.push(Diagnostic::new(
                            facts.path.as_str(),
                            DiagnosticKind::UnresolvedReference,
                            format!("{} `{}` of {}: {}", role, hint.name, class.name, reason),
                        ));
                        Reference::external(hint.name.clone())
                    }
                }
            };

            let superclass = class.superclass.as_ref().map(|hint| resolve(hint, "superclass"));
            let mixins = class.mixins.iter().map(|hint| resolve(hint, "mixin")).collect();
            updates.push(EdgeUpdate {
                module,
                declaration,
                superclass,
                mixins,
            });
        }
    }
    updates
}

/// Effective members, attributes and events of a class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flat {
    pub members: Vec<ClassMember>,
    pub attributes: Vec<Attribute>,
    pub events: Vec<Event>,
}

impl Flat {
    fn own(class: &ClassDoc) -> Self {
        Self {
            members: class.members.clone(),
            attributes: class.attributes.clone(),
            events: class.events.clone(),
        }
    }

    /// Append what `parent` contributes and `self` does not override.
    fn inherit(&mut self, parent: &Flat, from: &Reference) {
        let members: BTreeSet<(String, bool)> = self
            .members
            .iter()
            .map(|m| (m.name.clone(), m.is_static))
            .collect();
        for member in &parent.members {
            if !members.contains(&(member.name.clone(), member.is_static)) {
                let mut member = member.clone();
                member.inherited_from.get_or_insert_with(|| from.clone());
                self.members.push(member);
            }
        }

        let attributes: BTreeSet<String> = self.attributes.iter().map(|a| a.name.clone()).collect();
        for attribute in &parent.attributes {
            if !attributes.contains(&attribute.name) {
                let mut attribute = attribute.clone();
                attribute.inherited_from.get_or_insert_with(|| from.clone());
                self.attributes.push(attribute);
            }
        }

        let events: BTreeSet<String> = self.events.iter().map(|e| e.name.clone()).collect();
        for event in &parent.events {
            if !events.contains(&event.name) {
                let mut event = event.clone();
                event.inherited_from.get_or_insert_with(|| from.clone());
                self.events.push(event);
            }
        }
    }
}

enum Located<'a> {
    /// A class of this run, with its module and declaration index.
    Run(usize, usize, &'a ClassDoc),
    /// A package class: already flattened when its manifest was built.
    Package(&'a ClassDoc),
}

/// Inheritance graph over this run's classes and the loaded packages.
///
/// Nodes are keyed by their [`Reference`]; edges are superclass and mixin
/// references that name a class.
pub struct ClassGraph<'a> {
    run: BTreeMap<Reference, (usize, usize, &'a ClassDoc)>,
    packages: &'a [Package],
    broken: BTreeSet<(Reference, Reference)>,
    memo: HashMap<Reference, Flat>,
}

impl<'a> ClassGraph<'a> {
    pub fn new(modules: &'a [ModuleFacts], packages: &'a [Package]) -> Self {
        let mut run = BTreeMap::new();
        for (m, facts) in modules.iter().enumerate() {
            for (d, decl) in facts.declarations.iter().enumerate() {
                if let Some(class) = decl.as_class() {
                    run.insert(Reference::local(class.name.clone(), facts.path.clone()), (m, d, class));
                }
            }
        }
        Self {
            run,
            packages,
            broken: BTreeSet::new(),
            memo: HashMap::new(),
        }
    }

    fn locate(&self, key: &Reference) -> Option<Located<'a>> {
        match &key.package {
            None => self.run.get(key).map(|&(m, d, class)| Located::Run(m, d, class)),
            Some(name) => {
                let package = self.packages.iter().find(|p| &p.name == name)?;
                let class = match key.module.as_deref() {
                    Some(module) => package.class(module, &key.name),
                    None => package
                        .manifest
                        .modules
                        .iter()
                        .find_map(|m| m.class(&key.name)),
                }?;
                Some(Located::Package(class))
            }
        }
    }

    /// Parents that name a known class, in precedence order.
    fn parents(&self, key: &Reference) -> Vec<Reference> {
        let Some(Located::Run(_, _, class)) = self.locate(key) else {
            return Vec::new();
        };
        class
            .mixins
            .iter()
            .chain(class.superclass.iter())
            .filter(|parent| self.locate(parent).is_some())
            .cloned()
            .collect()
    }

    /// Shortest path from `from` back to `to`, following parent edges.
    fn path_between(&self, from: &Reference, to: &Reference) -> Option<Vec<Reference>> {
        let mut previous: BTreeMap<Reference, Reference> = BTreeMap::new();
        let mut queue = VecDeque::from([from.clone()]);
        let mut seen = BTreeSet::from([from.clone()]);

        while let Some(current) = queue.pop_front() {
            if &current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(prev) = previous.get(&cursor) {
                    path.push(prev.clone());
                    cursor = prev.clone();
                }
                path.reverse();
                return Some(path);
            }
            for parent in self.parents(&current) {
                if seen.insert(parent.clone()) {
                    previous.insert(parent.clone(), current.clone());
                    queue.push_back(parent);
                }
            }
        }
        None
    }

    /// Break every edge whose target can reach its source again.
    ///
    /// Decided on the unbroken graph, so the outcome does not depend on
    /// which class is visited first.
    pub fn break_cycles(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        let mut broken = BTreeSet::new();
        for key in self.run.keys() {
            for parent in self.parents(key) {
                let Some(path) = self.path_between(&parent, key) else {
                    continue;
                };
                let chain = std::iter::once(key)
                    .chain(path.iter())
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                warn!(module = ?key.module, "inheritance cycle: {}", chain);
                diagnostics.push(Diagnostic::new(
                    key.module.clone().unwrap_or_default(),
                    DiagnosticKind::CyclicInheritance,
                    format!("inheritance cycle {}; inherited members are not resolved", chain),
                ));
                broken.insert((key.clone(), parent));
            }
        }
        self.broken = broken;
    }

    /// Effective members of one class, memoized.
    pub fn flatten(&mut self, key: &Reference) -> Flat {
        if let Some(flat) = self.memo.get(key) {
            return flat.clone();
        }

        let flat = match self.locate(key) {
            None => Flat::default(),
            Some(Located::Package(class)) => Flat::own(class),
            Some(Located::Run(_, _, class)) => {
                let mut flat = Flat::own(class);
                for parent in self.parents(key) {
                    if self.broken.contains(&(key.clone(), parent.clone())) {
                        continue;
                    }
                    let inherited = self.flatten(&parent);
                    flat.inherit(&inherited, &parent);
                }
                flat
            }
        };

        self.memo.insert(key.clone(), flat.clone());
        flat
    }

    /// Flatten every class of this run.
    ///
    /// Returns `(module index, declaration index, effective members)`.
    pub fn flatten_all(mut self) -> Vec<(usize, usize, Flat)> {
        let keys: Vec<_> = self
            .run
            .iter()
            .map(|(key, &(m, d, _))| (key.clone(), m, d))
            .collect();
        keys.into_iter()
            .map(|(key, m, d)| {
                let flat = self.flatten(&key);
                (m, d, flat)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Declaration, Manifest, Module};

    fn class(name: &str, superclass: Option<Reference>, members: &[&str]) -> Declaration {
        let mut doc = ClassDoc::new(name);
        doc.superclass = superclass;
        doc.members = members.iter().map(|m| ClassMember::field(*m)).collect();
        Declaration::Class(doc)
    }

    fn flat_names(flat: &Flat) -> Vec<&str> {
        flat.members.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_override_keeps_subclass_position() {
        let mut facts = ModuleFacts::empty("a.js");
        facts.declarations.push(class("A", None, &["m", "a"]));
        facts
            .declarations
            .push(class("B", Some(Reference::local("A", "a.js")), &["b", "m"]));
        let modules = vec![facts];

        let mut graph = ClassGraph::new(&modules, &[]);
        let flat = graph.flatten(&Reference::local("B", "a.js"));
        assert_eq!(flat_names(&flat), vec!["b", "m", "a"]);
        assert!(flat.members[1].inherited_from.is_none());
        assert_eq!(
            flat.members[2].inherited_from,
            Some(Reference::local("A", "a.js"))
        );
    }

    #[test]
    fn test_static_and_instance_do_not_override() {
        let mut base = ClassDoc::new("A");
        let mut stat = ClassMember::field("x");
        stat.is_static = true;
        base.members.push(stat);
        let mut facts = ModuleFacts::empty("a.js");
        facts.declarations.push(Declaration::Class(base));
        facts
            .declarations
            .push(class("B", Some(Reference::local("A", "a.js")), &["x"]));
        let modules = vec![facts];

        let mut graph = ClassGraph::new(&modules, &[]);
        let flat = graph.flatten(&Reference::local("B", "a.js"));
        assert_eq!(flat.members.len(), 2);
    }

    #[test]
    fn test_mixin_precedence() {
        let mut facts = ModuleFacts::empty("a.js");
        facts.declarations.push(class("Base", None, &["shared", "base"]));
        let mut mixin = ClassDoc::new("M");
        mixin.members = vec![ClassMember::field("shared"), ClassMember::field("mixed")];
        facts.declarations.push(Declaration::Mixin(mixin));
        let mut el = ClassDoc::new("El");
        el.superclass = Some(Reference::local("Base", "a.js"));
        el.mixins = vec![Reference::local("M", "a.js")];
        el.members = vec![ClassMember::field("mixed")];
        facts.declarations.push(Declaration::Class(el));
        let modules = vec![facts];

        let mut graph = ClassGraph::new(&modules, &[]);
        let flat = graph.flatten(&Reference::local("El", "a.js"));
        assert_eq!(flat_names(&flat), vec!["mixed", "shared", "base"]);
        assert_eq!(
            flat.members[1].inherited_from,
            Some(Reference::local("M", "a.js"))
        );
    }

    #[test]
    fn test_cycle_is_broken_and_reported() {
        let mut facts = ModuleFacts::empty("a.js");
        facts
            .declarations
            .push(class("A", Some(Reference::local("B", "a.js")), &["a"]));
        facts
            .declarations
            .push(class("B", Some(Reference::local("A", "a.js")), &["b"]));
        let modules = vec![facts];

        let mut graph = ClassGraph::new(&modules, &[]);
        let mut diagnostics = Vec::new();
        graph.break_cycles(&mut diagnostics);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].message.contains("A -> B -> A"));

        let flattened = graph.flatten_all();
        for (_, _, flat) in &flattened {
            assert_eq!(flat.members.len(), 1);
        }
    }

    #[test]
    fn test_self_extension_is_a_cycle() {
        let mut facts = ModuleFacts::empty("a.js");
        facts
            .declarations
            .push(class("A", Some(Reference::local("A", "a.js")), &["a"]));
        let modules = vec![facts];
        let mut graph = ClassGraph::new(&modules, &[]);
        let mut diagnostics = Vec::new();
        graph.break_cycles(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("A -> A"));
    }

    #[test]
    fn test_package_classes_are_terminal() {
        let mut base = ClassDoc::new("LitLike");
        let mut inherited = ClassMember::field("deep");
        inherited.inherited_from = Some(Reference::package("ReactiveLike", "kit"));
        base.members = vec![ClassMember::field("own"), inherited];
        let mut module = Module::new("index.js");
        module.declarations.push(Declaration::Class(base));
        let packages = vec![Package::new(
            "kit",
            Manifest {
                modules: vec![module],
                ..Default::default()
            },
        )];

        let parent = Reference {
            name: "LitLike".to_string(),
            package: Some("kit".to_string()),
            module: Some("index.js".to_string()),
        };
        let mut facts = ModuleFacts::empty("a.js");
        facts
            .declarations
            .push(class("El", Some(parent.clone()), &["mine"]));
        let modules = vec![facts];

        let mut graph = ClassGraph::new(&modules, &packages);
        let flat = graph.flatten(&Reference::local("El", "a.js"));
        assert_eq!(flat_names(&flat), vec!["mine", "own", "deep"]);
        assert_eq!(flat.members[1].inherited_from, Some(parent));
        assert_eq!(
            flat.members[2].inherited_from,
            Some(Reference::package("ReactiveLike", "kit"))
        );
    }
}
