//! Lit (`LitElement`) conventions.

use crate::analysis::facts::DefinitionRecord;
use crate::analysis::nodes::Value;
use crate::analysis::ModuleFacts;
use crate::error::PluginError;
use crate::manifest::{ClassMember, MemberKind, Privacy, Reference, TypeRef};

use super::{
    find_decorator, type_from_constructor, MemberContext, MemberOutcome, ModuleContext, Plugin,
};

/// Statics that configure the element rather than document it.
const CONFIG_STATICS: &[&str] = &[
    "styles",
    "properties",
    "shadowRootOptions",
    "elementProperties",
    "elementStyles",
];

/// ReactiveElement/LitElement lifecycle methods.
const LIFECYCLE_METHODS: &[&str] = &[
    "render",
    "requestUpdate",
    "performUpdate",
    "scheduleUpdate",
    "shouldUpdate",
    "willUpdate",
    "update",
    "firstUpdated",
    "updated",
    "createRenderRoot",
    "getUpdateComplete",
    "connectedCallback",
    "disconnectedCallback",
    "attributeChangedCallback",
];

pub struct LitPlugin;

pub fn factory() -> Box<dyn Plugin> {
    Box::new(LitPlugin)
}

impl Plugin for LitPlugin {
    fn name(&self) -> &str {
        "lit"
    }

    fn member_hook(
        &self,
        ctx: &MemberContext<'_>,
        member: &ClassMember,
    ) -> Result<MemberOutcome, PluginError> {
        if member.is_static && CONFIG_STATICS.contains(&member.name.as_str()) {
            if member.name == "properties" {
                if let Some(Value::Object(entries)) = ctx.initializer {
                    return Ok(MemberOutcome::Expand(
                        entries
                            .iter()
                            .map(|(name, options)| reactive_property(name, Some(options)))
                            .collect(),
                    ));
                }
            }
            return Ok(MemberOutcome::Remove);
        }

        if member.kind == MemberKind::Method
            && !member.is_static
            && LIFECYCLE_METHODS.contains(&member.name.as_str())
        {
            return Ok(MemberOutcome::Remove);
        }

        if let Some(decorator) = ctx.decorator("property") {
            let mut next = apply_property_options(member.clone(), decorator.argument());
            if next.privacy.is_none() && member.name.starts_with('_') {
                next.privacy = Some(Privacy::Private);
            }
            return Ok(MemberOutcome::Replace(next));
        }

        if ctx.decorator("state").is_some() || ctx.decorator("internalProperty").is_some() {
            let mut next = member.clone();
            next.attribute = None;
            next.reflects = false;
            return Ok(MemberOutcome::Replace(next));
        }

        Ok(MemberOutcome::Unchanged)
    }

    fn module_hook(
        &self,
        ctx: &ModuleContext<'_>,
        facts: &ModuleFacts,
    ) -> Result<Option<ModuleFacts>, PluginError> {
        let mut next = facts.clone();
        let mut changed = false;

        for (class, decorators) in ctx.class_decorators {
            let Some(decorator) = find_decorator(decorators, "customElement") else {
                continue;
            };
            let tag = decorator
                .argument()
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PluginError::new("lit", format!("@customElement on {} has no tag name", class))
                })?;

            next.definitions.push(DefinitionRecord {
                tag: tag.to_string(),
                class: Reference::local(class.clone(), ctx.path),
                span: Default::default(),
            });
            changed = true;
        }

        Ok(changed.then_some(next))
    }
}

/// Field for one entry of `static properties`.
fn reactive_property(name: &str, options: Option<&Value>) -> ClassMember {
    let mut field = ClassMember::field(name);
    if options.and_then(|o| o.get("state")).and_then(Value::as_bool) == Some(true) {
        return field;
    }
    field = apply_property_options(field, options);
    field
}

/// Apply `{ type, attribute, reflect }` property options.
fn apply_property_options(mut member: ClassMember, options: Option<&Value>) -> ClassMember {
    if member.type_ref.is_none() {
        member.type_ref = options
            .and_then(|o| o.get("type"))
            .and_then(type_from_constructor)
            .map(TypeRef::new);
    }

    member.attribute = match options.and_then(|o| o.get("attribute")) {
        Some(Value::Bool(false)) => None,
        Some(Value::String(name)) => Some(name.clone()),
        _ => Some(member.name.to_ascii_lowercase()),
    };
    member.reflects = options
        .and_then(|o| o.get("reflect"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    member
}
