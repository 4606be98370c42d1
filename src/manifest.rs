//! Manifest document types.
//!
//! These structs serialize to the custom elements manifest JSON shape. Fields
//! marked `#[serde(skip)]` carry analysis state (documentation annotations,
//! partial markers) that is used while linking but never emitted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Schema version written to every emitted manifest.
pub const SCHEMA_VERSION: &str = "1.0.0";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Top-level manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            readme: None,
            modules: Vec::new(),
        }
    }
}

impl Manifest {
    /// Find a module by path.
    pub fn module(&self, path: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.path == path)
    }

    /// All custom element definitions, in module order.
    pub fn custom_element_definitions(&self) -> impl Iterator<Item = (&Module, &Export)> {
        self.modules.iter().flat_map(|m| {
            m.exports
                .iter()
                .filter(|e| e.kind == ExportKind::CustomElementDefinition)
                .map(move |e| (m, e))
        })
    }

    /// Find a class or mixin declaration by module path and name.
    pub fn class(&self, module: &str, name: &str) -> Option<&ClassDoc> {
        self.module(module)?.class(name)
    }
}

/// Module kind discriminant. Only JavaScript modules are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    #[default]
    JavascriptModule,
}

/// One analyzed source module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    #[serde(default)]
    pub kind: ModuleKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub declarations: Vec<Declaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,
    /// Set when a module-level plugin hook failed for this module.
    #[serde(skip)]
    pub partial: bool,
}

impl Module {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            kind: ModuleKind::JavascriptModule,
            path: path.into(),
            summary: None,
            description: None,
            declarations: Vec::new(),
            exports: Vec::new(),
            partial: false,
        }
    }

    /// Find a declaration by name.
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name() == name)
    }

    /// Find a class or mixin declaration by name.
    pub fn class(&self, name: &str) -> Option<&ClassDoc> {
        self.declaration(name).and_then(Declaration::as_class)
    }

    /// Find an export by exported name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Declaration {
    Class(ClassDoc),
    Mixin(ClassDoc),
    Function(FunctionDoc),
    Variable(VariableDoc),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Class(c) | Declaration::Mixin(c) => &c.name,
            Declaration::Function(f) => &f.name,
            Declaration::Variable(v) => &v.name,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Declaration::Class(_) => "class",
            Declaration::Mixin(_) => "mixin",
            Declaration::Function(_) => "function",
            Declaration::Variable(_) => "variable",
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Declaration::Class(c) | Declaration::Mixin(c) => &c.annotations,
            Declaration::Function(f) => &f.annotations,
            Declaration::Variable(v) => &v.annotations,
        }
    }

    /// Class or mixin body, if this is one.
    pub fn as_class(&self) -> Option<&ClassDoc> {
        match self {
            Declaration::Class(c) | Declaration::Mixin(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassDoc> {
        match self {
            Declaration::Class(c) | Declaration::Mixin(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_mixin(&self) -> bool {
        matches!(self, Declaration::Mixin(_))
    }
}

/// Set of documentation tag names attached to a node (`ignore`, `internal`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations(BTreeSet<String>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: impl Into<String>) {
        self.0.insert(tag.into().to_ascii_lowercase());
    }

    pub fn has(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Annotations {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut annotations = Annotations::new();
        for tag in iter {
            annotations.insert(tag);
        }
        annotations
    }
}

/// A `{name, module, package}` pointer at a declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl Reference {
    pub fn local(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: None,
            module: Some(module.into()),
        }
    }

    pub fn package(name: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: Some(package.into()),
            module: None,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: None,
            module: None,
        }
    }
}

/// `{"text": "..."}` type wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub text: String,
}

impl TypeRef {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// `deprecated` is either a bare flag or a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Deprecation {
    Flag(bool),
    Reason(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Protected,
    Private,
}

impl Privacy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Privacy::Public),
            "protected" => Some(Privacy::Protected),
            "private" => Some(Privacy::Private),
            _ => None,
        }
    }
}

/// Class or mixin declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css_properties: Vec<CssProperty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css_parts: Vec<CssPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<Slot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ClassMember>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<Reference>,
    /// Mixin function parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub custom_element: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    #[serde(skip)]
    pub annotations: Annotations,
    /// Set when a plugin hook failed while this declaration was processed.
    #[serde(skip)]
    pub partial: bool,
}

impl ClassDoc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn member(&self, name: &str) -> Option<&ClassMember> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Field,
    Method,
}

/// A field or method on a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassMember {
    pub kind: MemberKind,
    pub name: String,
    #[serde(rename = "static", default, skip_serializing_if = "is_false")]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<Privacy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reflects: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_doc: Option<ReturnDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<Reference>,
    #[serde(skip)]
    pub annotations: Annotations,
}

impl ClassMember {
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Field, name)
    }

    pub fn method(name: impl Into<String>) -> Self {
        Self::new(MemberKind::Method, name)
    }

    fn new(kind: MemberKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            is_static: false,
            privacy: None,
            summary: None,
            description: None,
            type_ref: None,
            default: None,
            readonly: false,
            attribute: None,
            reflects: false,
            parameters: Vec::new(),
            return_doc: None,
            deprecated: None,
            inherited_from: None,
            annotations: Annotations::new(),
        }
    }

    pub fn type_text(&self) -> Option<&str> {
        self.type_ref.as_ref().map(|t| t.text.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub rest: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnDoc {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<Reference>,
    #[serde(skip)]
    pub annotations: Annotations,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<Reference>,
    #[serde(skip)]
    pub annotations: Annotations,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssProperty {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssPart {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    pub return_doc: Option<ReturnDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    #[serde(skip)]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<TypeRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
    #[serde(skip)]
    pub annotations: Annotations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    #[serde(rename = "js")]
    Js,
    #[serde(rename = "custom-element-definition")]
    CustomElementDefinition,
}

/// A resolved module export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub kind: ExportKind,
    pub name: String,
    pub declaration: Reference,
}

impl Export {
    pub fn js(name: impl Into<String>, declaration: Reference) -> Self {
        Self {
            kind: ExportKind::Js,
            name: name.into(),
            declaration,
        }
    }

    pub fn definition(tag: impl Into<String>, declaration: Reference) -> Self {
        Self {
            kind: ExportKind::CustomElementDefinition,
            name: tag.into(),
            declaration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_kind_discriminant() {
        let decl = Declaration::Variable(VariableDoc {
            name: "variable".to_string(),
            default: Some("'hello'".to_string()),
            ..Default::default()
        });
        let json = serde_json::to_value(&decl).unwrap();
        assert_eq!(json["kind"], "variable");
        assert_eq!(json["name"], "variable");
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn test_annotations_are_not_serialized() {
        let mut member = ClassMember::field("secret");
        member.annotations.insert("Internal");
        let json = serde_json::to_string(&member).unwrap();
        assert!(!json.contains("internal"));
        assert!(member.annotations.has("internal"));
    }

    #[test]
    fn test_manifest_deserializes_package_shape() {
        let json = r#"{
            "schemaVersion": "1.0.0",
            "modules": [{
                "kind": "javascript-module",
                "path": "src/base.js",
                "declarations": [{
                    "kind": "class",
                    "name": "Base",
                    "members": [{"kind": "field", "name": "value", "static": true}],
                    "superclass": {"name": "HTMLElement", "package": "global:"}
                }],
                "exports": [{"kind": "js", "name": "Base", "declaration": {"name": "Base", "module": "src/base.js"}}]
            }]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        let base = manifest.class("src/base.js", "Base").unwrap();
        assert!(base.members[0].is_static);
        assert_eq!(
            base.superclass.as_ref().unwrap().package.as_deref(),
            Some("global:")
        );
    }
}
