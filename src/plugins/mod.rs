//! Plugin pipeline: framework-specific extraction hooks.
//!
//! A plugin implements any of three hooks:
//! - `member_hook`: per class member, before the class is assembled
//! - `class_hook`: per class, after all member hooks
//! - `module_hook`: per module, after every class in it
//!
//! Hooks receive an immutable value and return a replacement (or `None` /
//! `MemberOutcome::Unchanged`). The pipeline threads each result into the
//! next plugin, so later plugins observe earlier ones and the last write
//! wins. A failing or panicking hook is isolated: the previous value is
//! kept, the declaration is marked partial and a diagnostic is recorded.
//!
//! Plugins are registered as factories by name, like syntax providers.
//! Built-in plugins are gated by cargo features of the same name.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Once, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::analysis::class::{link_attributes, AnalyzedClass};
use crate::analysis::nodes::{Decorator, Value};
use crate::analysis::ModuleFacts;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::PluginError;
use crate::manifest::{ClassDoc, ClassMember, Event};

#[cfg(feature = "fast")]
pub mod fast;
#[cfg(feature = "lit")]
pub mod lit;
#[cfg(feature = "stencil")]
pub mod stencil;

/// Names of the plugins shipped with the crate.
pub const BUILTIN_PLUGINS: &[&str] = &["lit", "fast", "stencil"];

/// Context for a module hook.
#[derive(Debug)]
pub struct ModuleContext<'a> {
    pub path: &'a str,
    /// Decorators of each class in the module, by class name.
    pub class_decorators: &'a BTreeMap<String, Vec<Decorator>>,
}

/// Context for a class hook.
#[derive(Debug)]
pub struct ClassContext<'a> {
    pub module: &'a str,
    pub decorators: &'a [Decorator],
}

/// Context for a member hook.
#[derive(Debug)]
pub struct MemberContext<'a> {
    pub module: &'a str,
    pub class_name: &'a str,
    pub decorators: &'a [Decorator],
    /// Field initializer or getter return value.
    pub initializer: Option<&'a Value>,
}

impl MemberContext<'_> {
    /// First decorator with the given name.
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        find_decorator(self.decorators, name)
    }
}

/// Result of a member hook.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberOutcome {
    Unchanged,
    Replace(ClassMember),
    /// Replace the member with several synthesized members.
    Expand(Vec<ClassMember>),
    Remove,
    /// Remove the member and record it as a class event instead.
    IntoEvent(Event),
}

/// A framework analyzer.
pub trait Plugin: Send + Sync {
    /// Name used in configuration and diagnostics.
    fn name(&self) -> &str;

    fn member_hook(
        &self,
        _ctx: &MemberContext<'_>,
        _member: &ClassMember,
    ) -> Result<MemberOutcome, PluginError> {
        Ok(MemberOutcome::Unchanged)
    }

    fn class_hook(
        &self,
        _ctx: &ClassContext<'_>,
        _class: &ClassDoc,
    ) -> Result<Option<ClassDoc>, PluginError> {
        Ok(None)
    }

    fn module_hook(
        &self,
        _ctx: &ModuleContext<'_>,
        _facts: &ModuleFacts,
    ) -> Result<Option<ModuleFacts>, PluginError> {
        Ok(None)
    }
}

/// Factory function type for creating plugin instances.
pub type PluginFactory = fn() -> Box<dyn Plugin>;

lazy_static::lazy_static! {
    /// Global plugin registry mapping names to factories.
    static ref REGISTRY: RwLock<HashMap<String, PluginFactory>> = RwLock::new(HashMap::new());
}

static BUILTINS: Once = Once::new();

/// Register a plugin factory under a name. Replaces an existing entry.
pub fn register(name: &str, factory: PluginFactory) {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry.insert(name.to_string(), factory);
}

/// Construct a plugin by name. Returns None if nothing is registered.
pub fn for_name(name: &str) -> Option<Box<dyn Plugin>> {
    init();
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.get(name).map(|factory| factory())
}

/// All registered plugin names, sorted.
pub fn available() -> Vec<String> {
    init();
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<_> = registry.keys().cloned().collect();
    names.sort();
    names
}

/// Register the built-in plugins enabled at compile time.
pub fn init() {
    BUILTINS.call_once(|| {
        #[cfg(feature = "lit")]
        register("lit", lit::factory);
        #[cfg(feature = "fast")]
        register("fast", fast::factory);
        #[cfg(feature = "stencil")]
        register("stencil", stencil::factory);
    });
}

/// First decorator with the given name.
pub fn find_decorator<'a>(decorators: &'a [Decorator], name: &str) -> Option<&'a Decorator> {
    decorators.iter().find(|d| d.name == name)
}

/// Ordered list of plugins applied to every module.
#[derive(Default)]
pub struct PluginPipeline {
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl PluginPipeline {
    /// Pipeline with an explicit plugin list, in order.
    pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Build a pipeline from configured names.
    ///
    /// Names that are unknown or compiled out are reported once each as
    /// `plugin-unavailable` and skipped; duplicates are ignored.
    pub fn from_names(names: &[String]) -> (Self, Vec<Diagnostic>) {
        let mut plugins = Vec::new();
        let mut diagnostics = Vec::new();
        let mut seen = Vec::new();

        for name in names {
            if seen.contains(name) {
                continue;
            }
            seen.push(name.clone());

            match for_name(name) {
                Some(plugin) => {
                    debug!(plugin = %name, "plugin enabled");
                    plugins.push(plugin);
                }
                None => {
                    let message = if BUILTIN_PLUGINS.contains(&name.as_str()) {
                        format!(
                            "plugin '{}' is not available (built without the `{}` feature)",
                            name, name
                        )
                    } else {
                        format!("plugin '{}' is not available", name)
                    };
                    warn!("{}", message);
                    diagnostics.push(Diagnostic::new(
                        "",
                        DiagnosticKind::PluginUnavailable,
                        message,
                    ));
                }
            }
        }
        (Self { plugins }, diagnostics)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run member hooks, then class hooks, for one analyzed class and
    /// assemble the final class document.
    pub fn run_class(
        &self,
        module: &str,
        analyzed: AnalyzedClass,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ClassDoc {
        let AnalyzedClass {
            mut doc,
            members,
            decorators,
            span,
        } = analyzed;
        let class_name = doc.name.clone();
        let mut partial = false;
        let mut out = Vec::with_capacity(members.len());

        for entry in members {
            let ctx = MemberContext {
                module,
                class_name: &class_name,
                decorators: &entry.decorators,
                initializer: entry.initializer.as_ref(),
            };
            let mut failures = Vec::new();
            self.run_member(&ctx, entry.member, 0, &mut out, &mut doc.events, &mut failures);
            for (plugin, err) in failures {
                partial = true;
                diagnostics.push(
                    Diagnostic::new(
                        module,
                        DiagnosticKind::PluginFailure,
                        format!("{} member hook on {}: {}", plugin, class_name, err.message),
                    )
                    .at_line(span.start_line),
                );
            }
        }
        doc.members = merge_duplicate_members(out);

        for plugin in &self.plugins {
            let ctx = ClassContext {
                module,
                decorators: &decorators,
            };
            match isolate(plugin.name(), || plugin.class_hook(&ctx, &doc)) {
                Ok(Some(next)) => doc = next,
                Ok(None) => {}
                Err(err) => {
                    partial = true;
                    diagnostics.push(
                        Diagnostic::new(
                            module,
                            DiagnosticKind::PluginFailure,
                            format!("{} class hook on {}: {}", plugin.name(), class_name, err.message),
                        )
                        .at_line(span.start_line),
                    );
                }
            }
        }

        link_attributes(&mut doc);
        doc.partial |= partial;
        doc
    }

    fn run_member(
        &self,
        ctx: &MemberContext<'_>,
        mut member: ClassMember,
        start: usize,
        out: &mut Vec<ClassMember>,
        events: &mut Vec<Event>,
        failures: &mut Vec<(String, PluginError)>,
    ) {
        for (index, plugin) in self.plugins.iter().enumerate().skip(start) {
            match isolate(plugin.name(), || plugin.member_hook(ctx, &member)) {
                Ok(MemberOutcome::Unchanged) => {}
                Ok(MemberOutcome::Replace(next)) => member = next,
                Ok(MemberOutcome::Remove) => return,
                Ok(MemberOutcome::IntoEvent(event)) => {
                    if events.iter().all(|e| e.name != event.name) {
                        events.push(event);
                    }
                    return;
                }
                Ok(MemberOutcome::Expand(members)) => {
                    let synthesized = MemberContext {
                        module: ctx.module,
                        class_name: ctx.class_name,
                        decorators: &[],
                        initializer: None,
                    };
                    for next in members {
                        self.run_member(&synthesized, next, index + 1, out, events, failures);
                    }
                    return;
                }
                Err(err) => failures.push((plugin.name().to_string(), err)),
            }
        }
        out.push(member);
    }

    /// Run module hooks in order over one module's facts.
    pub fn run_module(
        &self,
        mut facts: ModuleFacts,
        class_decorators: &BTreeMap<String, Vec<Decorator>>,
    ) -> ModuleFacts {
        for plugin in &self.plugins {
            let path = facts.path.clone();
            let ctx = ModuleContext {
                path: &path,
                class_decorators,
            };
            let result = isolate(plugin.name(), || plugin.module_hook(&ctx, &facts)).and_then(
                |next| match next {
                    Some(next) if next.path != path => Err(PluginError::new(
                        plugin.name(),
                        format!("module hook may not rewrite module path to {}", next.path),
                    )),
                    other => Ok(other),
                },
            );

            match result {
                Ok(Some(next)) => facts = next,
                Ok(None) => {}
                Err(err) => {
                    facts.partial = true;
                    facts.diagnostics.push(Diagnostic::new(
                        path.as_str(),
                        DiagnosticKind::PluginFailure,
                        format!("{} module hook: {}", plugin.name(), err.message),
                    ));
                }
            }
        }
        facts
    }
}

/// Run a hook, turning panics into plugin errors.
fn isolate<T>(
    plugin: &str,
    hook: impl FnOnce() -> Result<T, PluginError>,
) -> Result<T, PluginError> {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "hook panicked".to_string());
            warn!(plugin, "plugin hook panicked: {}", message);
            Err(PluginError::new(plugin, message))
        }
    }
}

/// Collapse members sharing `(name, static, kind)`: the first keeps its
/// position, later ones fill in what it lacks.
fn merge_duplicate_members(members: Vec<ClassMember>) -> Vec<ClassMember> {
    let mut merged: Vec<ClassMember> = Vec::with_capacity(members.len());

    for member in members {
        let existing = merged
            .iter_mut()
            .find(|m| m.name == member.name && m.is_static == member.is_static && m.kind == member.kind);
        let Some(existing) = existing else {
            merged.push(member);
            continue;
        };

        if existing.privacy.is_none() {
            existing.privacy = member.privacy;
        }
        if existing.summary.is_none() {
            existing.summary = member.summary;
        }
        if existing.description.is_none() {
            existing.description = member.description;
        }
        if existing.type_ref.is_none() {
            existing.type_ref = member.type_ref;
        }
        if existing.default.is_none() {
            existing.default = member.default;
        }
        if existing.attribute.is_none() {
            existing.attribute = member.attribute;
        }
        if existing.deprecated.is_none() {
            existing.deprecated = member.deprecated;
        }
        existing.readonly |= member.readonly;
        existing.reflects |= member.reflects;
        for tag in member.annotations.iter() {
            existing.annotations.insert(tag);
        }
    }
    merged
}

/// Lowercased type name for a constructor passed as `type:`.
pub fn type_from_constructor(value: &Value) -> Option<&'static str> {
    match value.as_ident()? {
        "String" => Some("string"),
        "Number" => Some("number"),
        "Boolean" => Some("boolean"),
        "Array" => Some("array"),
        "Object" => Some("object"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::class::AnalyzedMember;
    use crate::analysis::facts::Span;
    use crate::manifest::TypeRef;

    struct Renamer;

    impl Plugin for Renamer {
        fn name(&self) -> &str {
            "renamer"
        }

        fn member_hook(
            &self,
            _ctx: &MemberContext<'_>,
            member: &ClassMember,
        ) -> Result<MemberOutcome, PluginError> {
            let mut next = member.clone();
            next.type_ref = Some(TypeRef::new("renamed"));
            Ok(MemberOutcome::Replace(next))
        }
    }

    struct Observer;

    impl Plugin for Observer {
        fn name(&self) -> &str {
            "observer"
        }

        fn member_hook(
            &self,
            _ctx: &MemberContext<'_>,
            member: &ClassMember,
        ) -> Result<MemberOutcome, PluginError> {
            // Sees the result of the earlier plugin.
            if member.type_text() == Some("renamed") {
                let mut next = member.clone();
                next.description = Some("observed".to_string());
                return Ok(MemberOutcome::Replace(next));
            }
            Ok(MemberOutcome::Unchanged)
        }
    }

    struct Panicker;

    impl Plugin for Panicker {
        fn name(&self) -> &str {
            "panicker"
        }

        fn class_hook(
            &self,
            _ctx: &ClassContext<'_>,
            _class: &ClassDoc,
        ) -> Result<Option<ClassDoc>, PluginError> {
            panic!("boom");
        }

        fn module_hook(
            &self,
            _ctx: &ModuleContext<'_>,
            _facts: &ModuleFacts,
        ) -> Result<Option<ModuleFacts>, PluginError> {
            Err(PluginError::new("panicker", "refused"))
        }
    }

    fn analyzed(members: &[&str]) -> AnalyzedClass {
        AnalyzedClass {
            doc: ClassDoc::new("MyElement"),
            members: members
                .iter()
                .map(|n| AnalyzedMember::new(ClassMember::field(*n)))
                .collect(),
            decorators: Vec::new(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_later_plugins_observe_earlier_ones() {
        let pipeline = PluginPipeline::new(vec![Box::new(Renamer), Box::new(Observer)]);
        let mut diagnostics = Vec::new();
        let doc = pipeline.run_class("a.js", analyzed(&["x"]), &mut diagnostics);

        assert_eq!(doc.members[0].type_text(), Some("renamed"));
        assert_eq!(doc.members[0].description.as_deref(), Some("observed"));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_failing_hooks_are_isolated() {
        let pipeline = PluginPipeline::new(vec![Box::new(Panicker), Box::new(Renamer)]);
        let mut diagnostics = Vec::new();
        let doc = pipeline.run_class("a.js", analyzed(&["x"]), &mut diagnostics);

        // The member hook of the healthy plugin still ran.
        assert_eq!(doc.members[0].type_text(), Some("renamed"));
        assert!(doc.partial);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PluginFailure);

        let facts = pipeline.run_module(ModuleFacts::empty("a.js"), &BTreeMap::new());
        assert!(facts.partial);
        assert_eq!(facts.diagnostics.len(), 1);
    }

    #[test]
    fn test_unknown_plugin_reported_once() {
        let names = vec![
            "no-such-plugin".to_string(),
            "no-such-plugin".to_string(),
        ];
        let (pipeline, diagnostics) = PluginPipeline::from_names(&names);
        assert!(pipeline.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::PluginUnavailable);
    }

    #[test]
    fn test_registry_accepts_custom_plugins() {
        fn renamer() -> Box<dyn Plugin> {
            Box::new(Renamer)
        }
        register("renamer-test", renamer);
        assert!(available().contains(&"renamer-test".to_string()));
        assert_eq!(for_name("renamer-test").unwrap().name(), "renamer");
    }

    #[test]
    fn test_merge_duplicate_members() {
        let mut first = ClassMember::field("name");
        first.attribute = Some("name".to_string());
        let mut second = ClassMember::field("name");
        second.default = Some("'World'".to_string());
        let merged = merge_duplicate_members(vec![first, ClassMember::method("go"), second]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].default.as_deref(), Some("'World'"));
        assert_eq!(merged[0].attribute.as_deref(), Some("name"));
    }
}
