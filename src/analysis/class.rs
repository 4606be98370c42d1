//! Class analysis: members, heritage and element metadata for one class node.
//!
//! Members come out in source order. Getter/setter pairs collapse into one
//! field at the position of the first accessor, and `this.x = ...`
//! assignments in the constructor become fields at the constructor's
//! position unless the field is declared in the body.

use std::collections::HashMap;

use tree_sitter::Node;

use crate::analysis::facts::{ModuleFacts, Span};
use crate::analysis::jsdoc::{leading_jsdoc, JsDoc};
use crate::analysis::nodes::{
    decorators_of, has_token, literal_type, named_children, property_name, string_value, text,
    unwrap_parens, visit, Decorator, Value,
};
use crate::manifest::{
    Attribute, ClassDoc, ClassMember, CssPart, CssProperty, Event, MemberKind, Parameter,
    Privacy, Reference, ReturnDoc, Slot, TypeRef,
};

/// A member with the syntax-level details plugins look at.
#[derive(Debug, Clone)]
pub struct AnalyzedMember {
    pub member: ClassMember,
    pub decorators: Vec<Decorator>,
    /// Field initializer, or the value returned by a getter.
    pub initializer: Option<Value>,
    from_constructor: bool,
}

impl AnalyzedMember {
    pub fn new(member: ClassMember) -> Self {
        Self {
            member,
            decorators: Vec::new(),
            initializer: None,
            from_constructor: false,
        }
    }

    fn key(&self) -> (String, bool) {
        (self.member.name.clone(), self.member.is_static)
    }
}

/// Output of the class analyzer, before plugin hooks run.
#[derive(Debug, Clone)]
pub struct AnalyzedClass {
    /// Class document without members.
    pub doc: ClassDoc,
    pub members: Vec<AnalyzedMember>,
    /// Class decorators, including those written before `export`.
    pub decorators: Vec<Decorator>,
    pub span: Span,
}

/// Analyze a class declaration or class expression node.
///
/// `hole` names the mixin parameter standing in for the superclass; an
/// `extends` clause naming it produces no superclass edge.
pub fn analyze_class(
    node: Node,
    source: &[u8],
    facts: &ModuleFacts,
    name: &str,
    hole: Option<&str>,
    jsdoc: Option<&JsDoc>,
) -> AnalyzedClass {
    let mut doc = ClassDoc::new(name);
    if let Some(jsdoc) = jsdoc {
        apply_class_jsdoc(&mut doc, jsdoc);
    }

    if let Some(expr) = heritage_expression(node) {
        let (superclass, mixins) = parse_heritage(expr, source, facts, hole);
        doc.superclass = superclass;
        doc.mixins = mixins;
    }

    let mut decorators = Vec::new();
    if let Some(parent) = node.parent() {
        if parent.kind() == "export_statement" {
            decorators.extend(decorators_of(parent, source));
        }
    }
    decorators.extend(decorators_of(node, source));

    let mut members = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        members = collect_members(body, source, &mut doc);
        for event in dispatched_events(body, source) {
            match doc.events.iter_mut().find(|e| e.name == event.name) {
                Some(existing) => {
                    if existing.type_ref.is_none() {
                        existing.type_ref = event.type_ref;
                    }
                }
                None => doc.events.push(event),
            }
        }
    }

    AnalyzedClass {
        doc,
        members,
        decorators,
        span: Span::from_node(node),
    }
}

/// The expression after `extends`, for both grammars.
fn heritage_expression(node: Node) -> Option<Node> {
    let mut walk = node.walk();
    let heritage = node
        .children(&mut walk)
        .find(|c| c.kind() == "class_heritage")?;

    for child in named_children(heritage) {
        match child.kind() {
            "extends_clause" => return child.child_by_field_name("value"),
            "implements_clause" => {}
            _ => return Some(child),
        }
    }
    None
}

/// Split `A(B(Base))` into superclass `Base` and mixins `[A, B]`.
pub fn parse_heritage(
    expr: Node,
    source: &[u8],
    facts: &ModuleFacts,
    hole: Option<&str>,
) -> (Option<Reference>, Vec<Reference>) {
    let mut mixins = Vec::new();
    let mut current = unwrap_parens(expr);

    loop {
        match current.kind() {
            "call_expression" => {
                if let Some(callee) = current.child_by_field_name("function") {
                    if callee.kind() == "identifier" {
                        mixins.push(facts.reference_for(text(callee, source)));
                    }
                }
                let first_arg = current
                    .child_by_field_name("arguments")
                    .and_then(|args| named_children(args).into_iter().next());
                match first_arg {
                    Some(arg) => current = unwrap_parens(arg),
                    None => return (None, mixins),
                }
            }
            "identifier" => {
                let name = text(current, source);
                if Some(name) == hole {
                    return (None, mixins);
                }
                return (Some(facts.reference_for(name)), mixins);
            }
            "member_expression" => {
                // `window.HTMLElement`, `ns.Base`: only the last segment names the class.
                let superclass = current
                    .child_by_field_name("property")
                    .map(|p| Reference::external(text(p, source)));
                return (superclass, mixins);
            }
            _ => return (None, mixins),
        }
    }
}

fn apply_class_jsdoc(doc: &mut ClassDoc, jsdoc: &JsDoc) {
    doc.description = jsdoc.description.clone();
    doc.summary = jsdoc.summary();
    doc.deprecated = jsdoc.deprecated();
    doc.annotations = jsdoc.annotations();

    if let Some(tag) = jsdoc.tag(&["tag", "tagname"]).and_then(|t| t.text()) {
        doc.tag_name = Some(tag);
    }

    for tag in jsdoc.tags_named(&["attr", "attribute"]) {
        let Some(name) = tag.name.clone().filter(|n| !n.is_empty()) else {
            continue;
        };
        doc.attributes.push(Attribute {
            name,
            description: tag.description.clone(),
            type_ref: tag.type_text.clone().map(TypeRef::new),
            default: tag.default.clone(),
            ..Default::default()
        });
    }

    for tag in jsdoc.tags_named(&["fires", "event"]) {
        let Some(name) = tag.name.clone().filter(|n| !n.is_empty()) else {
            continue;
        };
        doc.events.push(Event {
            name,
            description: tag.description.clone(),
            type_ref: tag.type_text.clone().map(TypeRef::new),
            ..Default::default()
        });
    }

    for tag in jsdoc.tags_named(&["slot"]) {
        doc.slots.push(Slot {
            name: tag.name.clone().unwrap_or_default(),
            description: tag.description.clone(),
        });
    }

    for tag in jsdoc.tags_named(&["cssprop", "cssproperty"]) {
        let Some(name) = tag.name.clone() else {
            continue;
        };
        doc.css_properties.push(CssProperty {
            name,
            syntax: tag.type_text.clone(),
            default: tag.default.clone(),
            description: tag.description.clone(),
        });
    }

    for tag in jsdoc.tags_named(&["csspart"]) {
        let Some(name) = tag.name.clone() else {
            continue;
        };
        doc.css_parts.push(CssPart {
            name,
            description: tag.description.clone(),
        });
    }
}

/// Walk the class body in source order.
fn collect_members(body: Node, source: &[u8], doc: &mut ClassDoc) -> Vec<AnalyzedMember> {
    let mut members: Vec<AnalyzedMember> = Vec::new();
    // (name, static) -> (index, has getter, has setter)
    let mut accessors: HashMap<(String, bool), (usize, bool, bool)> = HashMap::new();
    let mut pending_decorators = Vec::new();

    for child in named_children(body) {
        match child.kind() {
            "decorator" => {
                if let Some(d) = Decorator::from_node(child, source) {
                    pending_decorators.push(d);
                }
            }
            "field_definition" | "public_field_definition" => {
                let outer = std::mem::take(&mut pending_decorators);
                let Some(mut entry) = analyze_field(child, source) else {
                    continue;
                };
                if entry.member.is_static && entry.member.name == "observedAttributes" {
                    if let Some(Value::Array(items)) = entry.initializer {
                        add_observed_attributes(doc, &items);
                    }
                    continue;
                }
                let mut decorators = outer;
                decorators.append(&mut entry.decorators);
                entry.decorators = decorators;
                members.push(entry);
            }
            "method_definition" | "abstract_method_signature" | "method_signature" => {
                let outer = std::mem::take(&mut pending_decorators);
                analyze_method(child, source, outer, doc, &mut members, &mut accessors);
            }
            _ => pending_decorators.clear(),
        }
    }

    for (index, has_get, has_set) in accessors.values() {
        if *has_get && !*has_set {
            members[*index].member.readonly = true;
        }
    }

    fold_constructor_fields(members)
}

/// Merge constructor-assigned fields into body declarations of the same name.
fn fold_constructor_fields(members: Vec<AnalyzedMember>) -> Vec<AnalyzedMember> {
    let declared: HashMap<(String, bool), usize> = members
        .iter()
        .enumerate()
        .filter(|(_, m)| !m.from_constructor && m.member.kind == MemberKind::Field)
        .map(|(i, m)| (m.key(), i))
        .collect();

    let mut merged = members.clone();
    let mut keep = vec![true; members.len()];
    for (i, entry) in members.iter().enumerate() {
        if !entry.from_constructor {
            continue;
        }
        if let Some(&target) = declared.get(&entry.key()) {
            let field = &mut merged[target].member;
            if field.default.is_none() {
                field.default = entry.member.default.clone();
            }
            if field.type_ref.is_none() {
                field.type_ref = entry.member.type_ref.clone();
            }
            if merged[target].initializer.is_none() {
                merged[target].initializer = entry.initializer.clone();
            }
            keep[i] = false;
        }
    }

    merged
        .into_iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then_some(m))
        .collect()
}

fn analyze_field(node: Node, source: &[u8]) -> Option<AnalyzedMember> {
    let name_node = node
        .child_by_field_name("property")
        .or_else(|| node.child_by_field_name("name"))?;

    let mut member = ClassMember::field(property_name(name_node, source));
    member.is_static = has_token(node, "static");
    member.readonly = has_token(node, "readonly");
    member.privacy = syntactic_privacy(node, name_node, source);
    member.type_ref = node
        .child_by_field_name("type")
        .and_then(|t| annotation_text(t, source))
        .map(TypeRef::new);

    let mut entry = AnalyzedMember::new(member);
    if let Some(value) = node.child_by_field_name("value") {
        entry.member.default = Some(text(value, source).to_string());
        entry.initializer = Some(Value::from_node(value, source));
        if entry.member.type_ref.is_none() {
            entry.member.type_ref = literal_type(value).map(TypeRef::new);
        }
    }
    entry.decorators = decorators_of(node, source);

    if let Some(jsdoc) = leading_jsdoc(node, source) {
        apply_member_jsdoc(&mut entry.member, &jsdoc);
    }
    Some(entry)
}

fn analyze_method(
    node: Node,
    source: &[u8],
    outer_decorators: Vec<Decorator>,
    doc: &mut ClassDoc,
    members: &mut Vec<AnalyzedMember>,
    accessors: &mut HashMap<(String, bool), (usize, bool, bool)>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = property_name(name_node, source);
    let is_static = has_token(node, "static");
    let is_get = has_token(node, "get");
    let is_set = has_token(node, "set");
    let jsdoc = leading_jsdoc(node, source);

    if name == "constructor" && !is_static {
        if let Some(body) = node.child_by_field_name("body") {
            members.extend(constructor_fields(body, source));
        }
        return;
    }

    if is_static && is_get && name == "observedAttributes" {
        if let Some(Value::Array(items)) = returned_value(node, source) {
            add_observed_attributes(doc, &items);
        }
        return;
    }

    let mut decorators = outer_decorators;
    decorators.extend(decorators_of(node, source));

    if is_get || is_set {
        let key = (name.clone(), is_static);
        let (index, has_get, has_set) = match accessors.get(&key) {
            Some(&slot) => slot,
            None => {
                let mut field = ClassMember::field(name.clone());
                field.is_static = is_static;
                field.privacy = syntactic_privacy(node, name_node, source);
                members.push(AnalyzedMember::new(field));
                (members.len() - 1, false, false)
            }
        };

        let entry = &mut members[index];
        entry.decorators.extend(decorators);
        if is_get {
            if entry.member.type_ref.is_none() {
                entry.member.type_ref = node
                    .child_by_field_name("return_type")
                    .and_then(|t| annotation_text(t, source))
                    .map(TypeRef::new);
            }
            if entry.initializer.is_none() {
                entry.initializer = returned_value(node, source);
            }
        } else if entry.member.type_ref.is_none() {
            entry.member.type_ref = node
                .child_by_field_name("parameters")
                .and_then(|p| parameters(p, source, None).into_iter().next())
                .and_then(|p| p.type_ref);
        }
        if let Some(jsdoc) = jsdoc {
            apply_member_jsdoc(&mut entry.member, &jsdoc);
        }
        accessors.insert(key, (index, has_get || is_get, has_set || is_set));
        return;
    }

    let mut method = ClassMember::method(name);
    method.is_static = is_static;
    method.privacy = syntactic_privacy(node, name_node, source);
    if let Some(params) = node.child_by_field_name("parameters") {
        method.parameters = parameters(params, source, jsdoc.as_ref());
    }
    method.return_doc = return_doc(node, source, jsdoc.as_ref());
    if let Some(jsdoc) = jsdoc {
        apply_member_jsdoc(&mut method, &jsdoc);
    }

    let mut entry = AnalyzedMember::new(method);
    entry.decorators = decorators;
    members.push(entry);
}

/// `this.x = value;` statements directly in a constructor body.
fn constructor_fields(body: Node, source: &[u8]) -> Vec<AnalyzedMember> {
    let mut fields: Vec<AnalyzedMember> = Vec::new();

    for statement in named_children(body) {
        if statement.kind() != "expression_statement" {
            continue;
        }
        let Some(expr) = named_children(statement).into_iter().next() else {
            continue;
        };
        if expr.kind() != "assignment_expression" {
            continue;
        }
        let (Some(left), Some(right)) = (
            expr.child_by_field_name("left"),
            expr.child_by_field_name("right"),
        ) else {
            continue;
        };
        if left.kind() != "member_expression" {
            continue;
        }
        let is_this = left
            .child_by_field_name("object")
            .map(|o| o.kind() == "this")
            .unwrap_or(false);
        let Some(property) = left.child_by_field_name("property") else {
            continue;
        };
        if !is_this {
            continue;
        }

        let name = property_name(property, source);
        if fields.iter().any(|f| f.member.name == name) {
            continue;
        }

        let mut field = ClassMember::field(name);
        if property.kind() == "private_property_identifier" {
            field.privacy = Some(Privacy::Private);
        }
        field.default = Some(text(right, source).to_string());
        field.type_ref = literal_type(right).map(TypeRef::new);
        if let Some(jsdoc) = leading_jsdoc(statement, source) {
            apply_member_jsdoc(&mut field, &jsdoc);
        }

        let mut entry = AnalyzedMember::new(field);
        entry.initializer = Some(Value::from_node(right, source));
        entry.from_constructor = true;
        fields.push(entry);
    }
    fields
}

/// Privacy from syntax: TypeScript modifiers, then `#name`.
fn syntactic_privacy(node: Node, name_node: Node, source: &[u8]) -> Option<Privacy> {
    let mut walk = node.walk();
    let modifier = node
        .children(&mut walk)
        .find(|c| c.kind() == "accessibility_modifier")
        .and_then(|m| Privacy::parse(text(m, source).trim()));
    if modifier.is_some() {
        return modifier;
    }
    (name_node.kind() == "private_property_identifier").then_some(Privacy::Private)
}

/// Documentation overrides syntax for privacy; types and defaults only
/// fill gaps.
fn apply_member_jsdoc(member: &mut ClassMember, jsdoc: &JsDoc) {
    member.description = jsdoc.description.clone().or(member.description.take());
    member.summary = jsdoc.summary().or(member.summary.take());
    if let Some(deprecated) = jsdoc.deprecated() {
        member.deprecated = Some(deprecated);
    }
    for tag in jsdoc.annotations().iter() {
        member.annotations.insert(tag);
    }
    if let Some(privacy) = jsdoc.privacy() {
        member.privacy = Some(privacy);
    }
    if jsdoc.has("readonly") {
        member.readonly = true;
    }
    if member.type_ref.is_none() {
        member.type_ref = jsdoc.type_text().map(TypeRef::new);
    }
    if member.kind == MemberKind::Field {
        if member.default.is_none() {
            member.default = jsdoc.default_value();
        }
        if let Some(tag) = jsdoc.tag(&["attr", "attribute"]) {
            let name = tag
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| member.name.to_ascii_lowercase());
            member.attribute = Some(name);
        }
        if jsdoc.has("reflect") || jsdoc.has("reflects") {
            member.reflects = true;
        }
    }
}

/// Text of a `: T` annotation without the colon.
pub fn annotation_text(node: Node, source: &[u8]) -> Option<String> {
    let raw = text(node, source).trim();
    let raw = raw.strip_prefix(':').unwrap_or(raw).trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Parse a `formal_parameters` node, enriched by `@param` tags.
pub fn parameters(node: Node, source: &[u8], jsdoc: Option<&JsDoc>) -> Vec<Parameter> {
    let mut params = Vec::new();

    for child in named_children(node) {
        let mut param = Parameter::default();
        let mut pattern = child;

        match child.kind() {
            "required_parameter" | "optional_parameter" => {
                param.optional = child.kind() == "optional_parameter";
                param.type_ref = child
                    .child_by_field_name("type")
                    .and_then(|t| annotation_text(t, source))
                    .map(TypeRef::new);
                if let Some(value) = child.child_by_field_name("value") {
                    param.default = Some(text(value, source).to_string());
                    param.optional = true;
                }
                match child.child_by_field_name("pattern") {
                    Some(p) => pattern = p,
                    None => continue,
                }
            }
            "assignment_pattern" => {
                if let Some(right) = child.child_by_field_name("right") {
                    param.default = Some(text(right, source).to_string());
                }
                param.optional = true;
                match child.child_by_field_name("left") {
                    Some(left) => pattern = left,
                    None => continue,
                }
            }
            "decorator" => continue,
            _ => {}
        }

        if pattern.kind() == "rest_pattern" {
            param.rest = true;
            pattern = named_children(pattern).into_iter().next().unwrap_or(pattern);
        }
        param.name = text(pattern, source).to_string();

        if let Some(tag) = jsdoc.and_then(|d| d.param(&param.name)) {
            if param.type_ref.is_none() {
                param.type_ref = tag.type_text.clone().map(TypeRef::new);
            }
            if param.default.is_none() {
                param.default = tag.default.clone();
            }
            param.optional |= tag.optional;
            param.description = tag.description.clone();
        }
        params.push(param);
    }
    params
}

/// Return type and description of a function-like node.
pub fn return_doc(node: Node, source: &[u8], jsdoc: Option<&JsDoc>) -> Option<ReturnDoc> {
    let mut ret = ReturnDoc {
        type_ref: node
            .child_by_field_name("return_type")
            .and_then(|t| annotation_text(t, source))
            .map(TypeRef::new),
        description: None,
    };
    if let Some(tag) = jsdoc.and_then(JsDoc::returns) {
        if ret.type_ref.is_none() {
            ret.type_ref = tag.type_text.clone().map(TypeRef::new);
        }
        ret.description = tag.text();
    }
    (ret.type_ref.is_some() || ret.description.is_some()).then_some(ret)
}

/// Value of the first `return` statement directly in a method body.
fn returned_value(node: Node, source: &[u8]) -> Option<Value> {
    let body = node.child_by_field_name("body")?;
    named_children(body)
        .into_iter()
        .find(|s| s.kind() == "return_statement")
        .and_then(|ret| named_children(ret).into_iter().next())
        .map(|expr| Value::from_node(expr, source))
}

fn add_observed_attributes(doc: &mut ClassDoc, items: &[Value]) {
    for name in items.iter().filter_map(Value::as_str) {
        if doc.attribute(name).is_none() {
            doc.attributes.push(Attribute::new(name));
        }
    }
}

/// Events from `this.dispatchEvent(new SomeEvent('name', ...))`.
fn dispatched_events(body: Node, source: &[u8]) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();

    visit(body, &mut |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let is_dispatch = node
            .child_by_field_name("function")
            .filter(|f| f.kind() == "member_expression")
            .and_then(|f| f.child_by_field_name("property"))
            .map(|p| text(p, source) == "dispatchEvent")
            .unwrap_or(false);
        if !is_dispatch {
            return;
        }

        let Some(arg) = node
            .child_by_field_name("arguments")
            .and_then(|a| named_children(a).into_iter().next())
        else {
            return;
        };
        if arg.kind() != "new_expression" {
            return;
        }
        let constructor = arg
            .child_by_field_name("constructor")
            .map(|c| text(c, source).to_string());
        let name = arg
            .child_by_field_name("arguments")
            .and_then(|a| named_children(a).into_iter().next())
            .and_then(|first| string_value(first, source));

        if let Some(name) = name {
            if events.iter().all(|e| e.name != name) {
                let mut event = Event::new(name);
                event.type_ref = constructor.map(TypeRef::new);
                events.push(event);
            }
        }
    });
    events
}

/// Give fields carrying an attribute name a matching class attribute, and
/// attach `fieldName` to attributes that match a field.
pub fn link_attributes(doc: &mut ClassDoc) {
    let linked: Vec<(String, ClassMember)> = doc
        .members
        .iter()
        .filter(|m| m.kind == MemberKind::Field && !m.is_static)
        .filter_map(|m| m.attribute.clone().map(|a| (a, m.clone())))
        .collect();

    for (attr_name, field) in linked {
        match doc.attributes.iter_mut().find(|a| a.name == attr_name) {
            Some(attr) => {
                if attr.field_name.is_none() {
                    attr.field_name = Some(field.name.clone());
                }
                if attr.type_ref.is_none() {
                    attr.type_ref = field.type_ref.clone();
                }
                if attr.default.is_none() {
                    attr.default = field.default.clone();
                }
                if attr.description.is_none() {
                    attr.description = field.description.clone();
                }
                for tag in field.annotations.iter() {
                    attr.annotations.insert(tag);
                }
            }
            None => doc.attributes.push(Attribute {
                name: attr_name,
                description: field.description.clone(),
                type_ref: field.type_ref.clone(),
                default: field.default.clone(),
                field_name: Some(field.name.clone()),
                inherited_from: None,
                annotations: field.annotations.clone(),
            }),
        }
    }

    for attr in doc.attributes.iter_mut().filter(|a| a.field_name.is_none()) {
        let camel = kebab_to_camel(&attr.name);
        if let Some(field) = doc
            .members
            .iter_mut()
            .find(|m| m.kind == MemberKind::Field && !m.is_static && m.name == camel)
        {
            attr.field_name = Some(field.name.clone());
            if field.attribute.is_none() {
                field.attribute = Some(attr.name.clone());
            }
            if attr.type_ref.is_none() {
                attr.type_ref = field.type_ref.clone();
            }
        }
    }
}

/// `my-attr` to `myAttr`.
pub fn kebab_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `myProp` to `my-prop`.
pub fn camel_to_kebab(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
