//! FAST element conventions.

use crate::analysis::facts::DefinitionRecord;
use crate::analysis::nodes::Value;
use crate::analysis::ModuleFacts;
use crate::error::PluginError;
use crate::manifest::{ClassMember, Reference, TypeRef};

use super::{find_decorator, MemberContext, MemberOutcome, ModuleContext, Plugin};

pub struct FastPlugin;

pub fn factory() -> Box<dyn Plugin> {
    Box::new(FastPlugin)
}

impl Plugin for FastPlugin {
    fn name(&self) -> &str {
        "fast"
    }

    fn member_hook(
        &self,
        ctx: &MemberContext<'_>,
        member: &ClassMember,
    ) -> Result<MemberOutcome, PluginError> {
        let Some(decorator) = ctx.decorator("attr") else {
            return Ok(MemberOutcome::Unchanged);
        };
        let options = decorator.argument();

        let mut next = member.clone();
        next.attribute = Some(
            options
                .and_then(|o| o.get("attribute"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| member.name.to_ascii_lowercase()),
        );

        let mode = options.and_then(|o| o.get("mode")).and_then(Value::as_str);
        // FAST attributes reflect unless they only read from the view.
        next.reflects = mode != Some("fromView");
        if mode == Some("boolean") {
            next.type_ref = Some(TypeRef::new("boolean"));
        }
        Ok(MemberOutcome::Replace(next))
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
            // `@customElement('x')` or `@customElement({ name: 'x', template })`.
            let tag = match decorator.argument() {
                Some(Value::String(tag)) => tag.clone(),
                Some(options) => match options.get("name").and_then(Value::as_str) {
                    Some(tag) => tag.to_string(),
                    None => {
                        return Err(PluginError::new(
                            "fast",
                            format!("@customElement on {} has no name", class),
                        ))
                    }
                },
                None => continue,
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
    use crate::manifest::{ClassDoc, Declaration};
    use std::collections::BTreeMap;

    #[test]
    fn test_attr_boolean_mode() {
        let decorators = vec![Decorator {
            name: "attr".to_string(),
            arguments: vec![Value::Object(vec![(
                "mode".to_string(),
                Value::String("boolean".to_string()),
            )])],
        }];
        let ctx = MemberContext {
            module: "a.ts",
            class_name: "MyButton",
            decorators: &decorators,
            initializer: None,
        };
        let outcome = FastPlugin
            .member_hook(&ctx, &ClassMember::field("disabled"))
            .unwrap();
        let MemberOutcome::Replace(member) = outcome else {
            panic!("expected replacement");
        };
        assert_eq!(member.attribute.as_deref(), Some("disabled"));
        assert_eq!(member.type_text(), Some("boolean"));
        assert!(member.reflects);
    }

    #[test]
    fn test_custom_element_object_form() {
        let mut facts = ModuleFacts::empty("src/button.ts");
        facts
            .declarations
            .push(Declaration::Class(ClassDoc::new("MyButton")));

        let mut class_decorators = BTreeMap::new();
        class_decorators.insert(
            "MyButton".to_string(),
            vec![Decorator {
                name: "customElement".to_string(),
                arguments: vec![Value::Object(vec![(
                    "name".to_string(),
                    Value::String("my-button".to_string()),
                )])],
            }],
        );
        let ctx = ModuleContext {
            path: "src/button.ts",
            class_decorators: &class_decorators,
        };

        let next = FastPlugin.module_hook(&ctx, &facts).unwrap().unwrap();
        assert_eq!(next.definitions.len(), 1);
        assert_eq!(next.definitions[0].tag, "my-button");
        assert_eq!(
            next.definitions[0].class,
            Reference::local("MyButton", "src/button.ts")
        );
    }
}
