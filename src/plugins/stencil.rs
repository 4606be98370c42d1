//! Stencil component conventions.

use crate::analysis::class::camel_to_kebab;
use crate::analysis::facts::DefinitionRecord;
use crate::analysis::nodes::Value;
use crate::analysis::ModuleFacts;
use crate::error::PluginError;
use crate::manifest::{ClassDoc, ClassMember, Event, MemberKind, Reference, TypeRef};

use super::{
    find_decorator, ClassContext, MemberContext, MemberOutcome, ModuleContext, Plugin,
};

const LIFECYCLE_METHODS: &[&str] = &[
    "connectedCallback",
    "disconnectedCallback",
    "componentWillLoad",
    "componentDidLoad",
    "componentShouldUpdate",
    "componentWillRender",
    "componentDidRender",
    "componentWillUpdate",
    "componentDidUpdate",
    "render",
];

pub struct StencilPlugin;

pub fn factory() -> Box<dyn Plugin> {
    Box::new(StencilPlugin)
}

/// Tag from `@Component({ tag: 'x' })`.
fn component_tag(decorators: &[crate::analysis::nodes::Decorator]) -> Option<String> {
    find_decorator(decorators, "Component")?
        .argument()?
        .get("tag")?
        .as_str()
        .map(str::to_string)
}

impl Plugin for StencilPlugin {
    fn name(&self) -> &str {
        "stencil"
    }

    fn member_hook(
        &self,
        ctx: &MemberContext<'_>,
        member: &ClassMember,
    ) -> Result<MemberOutcome, PluginError> {
        if ctx.decorator("Element").is_some() {
            return Ok(MemberOutcome::Remove);
        }

        if let Some(decorator) = ctx.decorator("Event") {
            let options = decorator.argument();
            let name = options
                .and_then(|o| o.get("eventName"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| member.name.clone());
            let detail = member
                .type_text()
                .and_then(|t| t.strip_prefix("EventEmitter"))
                .and_then(|t| t.strip_prefix('<'))
                .and_then(|t| t.strip_suffix('>'))
                .unwrap_or("any");

            return Ok(MemberOutcome::IntoEvent(Event {
                name,
                description: member.description.clone(),
                type_ref: Some(TypeRef::new(format!("CustomEvent<{}>", detail))),
                inherited_from: None,
                annotations: member.annotations.clone(),
            }));
        }

        if let Some(decorator) = ctx.decorator("Prop") {
            let options = decorator.argument();
            let mut next = member.clone();
            next.attribute = Some(
                options
                    .and_then(|o| o.get("attribute"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| camel_to_kebab(&member.name)),
            );
            next.reflects = options
                .and_then(|o| o.get("reflect"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            return Ok(MemberOutcome::Replace(next));
        }

        if member.kind == MemberKind::Method
            && !member.is_static
            && LIFECYCLE_METHODS.contains(&member.name.as_str())
        {
            return Ok(MemberOutcome::Remove);
        }

        Ok(MemberOutcome::Unchanged)
    }

    fn class_hook(
        &self,
        ctx: &ClassContext<'_>,
        class: &ClassDoc,
    ) -> Result<Option<ClassDoc>, PluginError> {
        let Some(tag) = component_tag(ctx.decorators) else {
            return Ok(None);
        };
        let mut next = class.clone();
        next.tag_name = Some(tag);
        next.custom_element = true;
        Ok(Some(next))
    }

    fn module_hook(
        &self,
        ctx: &ModuleContext<'_>,
        facts: &ModuleFacts,
    ) -> Result<Option<ModuleFacts>, PluginError> {
        let mut next = facts.clone();
        let mut changed = false;

        for (class, decorators) in ctx.class_decorators {
            let Some(tag) = component_tag(decorators) else {
                continue;
            };
            next.definitions.push(DefinitionRecord {
                tag,
                class: Reference::local(class.clone(), ctx.path),
                span: Default::default(),
            });
            changed = true;
        }
        Ok(changed.then_some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::nodes::Decorator;

    fn ctx(decorators: &[Decorator]) -> MemberContext<'_> {
        MemberContext {
            module: "src/my-comp.tsx",
            class_name: "MyComp",
            decorators,
            initializer: None,
        }
    }

    #[test]
    fn test_prop_attribute_is_kebab_case() {
        let decorators = vec![Decorator {
            name: "Prop".to_string(),
            arguments: Vec::new(),
        }];
        let outcome = StencilPlugin
            .member_hook(&ctx(&decorators), &ClassMember::field("firstName"))
            .unwrap();
        let MemberOutcome::Replace(member) = outcome else {
            panic!("expected replacement");
        };
        assert_eq!(member.attribute.as_deref(), Some("first-name"));
    }

    #[test]
    fn test_event_emitter_becomes_event() {
        let decorators = vec![Decorator {
            name: "Event".to_string(),
            arguments: vec![Value::Object(vec![(
                "eventName".to_string(),
                Value::String("todoCompleted".to_string()),
            )])],
        }];
        let mut field = ClassMember::field("completed");
        field.type_ref = Some(TypeRef::new("EventEmitter<Todo>"));

        let outcome = StencilPlugin.member_hook(&ctx(&decorators), &field).unwrap();
        let MemberOutcome::IntoEvent(event) = outcome else {
            panic!("expected event");
        };
        assert_eq!(event.name, "todoCompleted");
        assert_eq!(event.type_ref.unwrap().text, "CustomEvent<Todo>");
    }

    #[test]
    fn test_component_sets_tag() {
        let decorators = vec![Decorator {
            name: "Component".to_string(),
            arguments: vec![Value::Object(vec![(
                "tag".to_string(),
                Value::String("my-comp".to_string()),
            )])],
        }];
        let ctx = ClassContext {
            module: "src/my-comp.tsx",
            decorators: &decorators,
        };
        let next = StencilPlugin
            .class_hook(&ctx, &ClassDoc::new("MyComp"))
            .unwrap()
            .unwrap();
        assert_eq!(next.tag_name.as_deref(), Some("my-comp"));
        assert!(next.custom_element);
    }
}
