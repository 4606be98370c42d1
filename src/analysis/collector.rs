//! Declaration collector: one ordered pass over a module's top level.
//!
//! Produces declarations, export records, imports and registrations. Each
//! class found is run through the class analyzer and the plugin pipeline as
//! soon as it is seen; module hooks run once at the end.

use std::collections::BTreeMap;

use streaming_iterator::StreamingIterator;
use tracing::{debug, warn};
use tree_sitter::{Node, Query, QueryCursor};

use crate::analysis::class::{analyze_class, annotation_text, parameters, return_doc};
use crate::analysis::facts::{
    DefinitionRecord, ExportRecord, ImportBinding, ModuleFacts, Span, Specifier,
};
use crate::analysis::jsdoc::{declaration_jsdoc, leading_jsdoc, JsDoc};
use crate::analysis::nodes::{literal_type, named_children, string_value, text, unwrap_parens, visit, Decorator};
use crate::analysis::ParsedModule;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::manifest::{Declaration, FunctionDoc, Reference, TypeRef, VariableDoc};
use crate::plugins::PluginPipeline;

/// Registration calls: `customElements.define(...)`, with or without a
/// `window.` / `globalThis.` prefix.
const DEFINE_QUERY: &str = r#"
(call_expression
  function: (member_expression
    object: (_) @object
    property: (property_identifier) @method)
  arguments: (arguments) @args) @call
"#;

/// Collect everything the per-module phases produce for one parsed module.
pub fn collect_module(parsed: &ParsedModule, pipeline: &PluginPipeline) -> ModuleFacts {
    let mut collector = Collector {
        parsed,
        pipeline,
        facts: ModuleFacts::empty(&parsed.path),
        class_decorators: BTreeMap::new(),
        constants: BTreeMap::new(),
        anonymous: 0,
    };

    if parsed.has_errors() {
        let line = first_error_line(parsed.root());
        warn!(module = %parsed.path, line, "syntax errors, analyzing recovered tree");
        collector.facts.diagnostics.push(
            Diagnostic::new(
                parsed.path.as_str(),
                DiagnosticKind::SyntaxError,
                "source contains syntax errors; results may be incomplete",
            )
            .at_line(line),
        );
    }

    collector.collect_module_doc();
    collector.collect_imports();
    collector.collect_top_level();
    collector.collect_definitions();

    let Collector {
        facts,
        class_decorators,
        ..
    } = collector;
    debug!(
        module = %facts.path,
        declarations = facts.declarations.len(),
        exports = facts.exports.len(),
        definitions = facts.definitions.len(),
        "collected module"
    );
    pipeline.run_module(facts, &class_decorators)
}

fn first_error_line(root: Node) -> usize {
    let mut line = None;
    visit(root, &mut |n| {
        if line.is_none() && (n.is_error() || n.is_missing()) {
            line = Some(n.start_position().row + 1);
        }
    });
    line.unwrap_or(1)
}

struct Collector<'a> {
    parsed: &'a ParsedModule,
    pipeline: &'a PluginPipeline,
    facts: ModuleFacts,
    class_decorators: BTreeMap<String, Vec<Decorator>>,
    /// Top-level bindings initialized with a plain string literal.
    constants: BTreeMap<String, String>,
    anonymous: usize,
}

impl<'a> Collector<'a> {
    fn source(&self) -> &'a [u8] {
        &self.parsed.source
    }

    fn synthesize_name(&mut self) -> String {
        let name = format!("anonymous_{}", self.anonymous);
        self.anonymous += 1;
        name
    }

    /// `/** @module */` or `/** @fileoverview */` at the top of the file.
    fn collect_module_doc(&mut self) {
        let parsed = self.parsed;
        let root = parsed.root();
        let mut walk = root.walk();
        let Some(first) = root.named_children(&mut walk).next() else {
            return;
        };
        if first.kind() != "comment" {
            return;
        }
        let Some(doc) = JsDoc::parse(text(first, self.source())) else {
            return;
        };
        if doc.has("module") || doc.has("fileoverview") || doc.has("file") {
            self.facts.summary = doc.summary();
            self.facts.description = doc.description.clone().or_else(|| {
                doc.tag(&["fileoverview", "file"]).and_then(|t| t.text())
            });
        }
    }

    fn collect_imports(&mut self) {
        let parsed = self.parsed;
        let root = parsed.root();
        for statement in named_children(root) {
            if statement.kind() != "import_statement" {
                continue;
            }
            let Some(source) = statement
                .child_by_field_name("source")
                .and_then(|s| string_value(s, self.source()))
            else {
                continue;
            };
            let specifier = Specifier::parse(&source, &self.parsed.path);

            for clause in named_children(statement) {
                if clause.kind() != "import_clause" {
                    continue;
                }
                for part in named_children(clause) {
                    self.collect_import_part(part, &specifier);
                }
            }
        }
    }

    fn collect_import_part(&mut self, part: Node<'a>, specifier: &Specifier) {
        let source = self.source();
        match part.kind() {
            "identifier" => self.facts.imports.push(ImportBinding {
                local: text(part, source).to_string(),
                imported: "default".to_string(),
                source: specifier.clone(),
            }),
            "namespace_import" => {
                if let Some(local) = named_children(part).into_iter().next() {
                    self.facts.imports.push(ImportBinding {
                        local: text(local, source).to_string(),
                        imported: "*".to_string(),
                        source: specifier.clone(),
                    });
                }
            }
            "named_imports" => {
                for spec in named_children(part) {
                    if spec.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(name) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let imported = text(name, source).to_string();
                    let local = spec
                        .child_by_field_name("alias")
                        .map(|a| text(a, source).to_string())
                        .unwrap_or_else(|| imported.clone());
                    self.facts.imports.push(ImportBinding {
                        local,
                        imported,
                        source: specifier.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    fn collect_top_level(&mut self) {
        let parsed = self.parsed;
        for node in named_children(parsed.root()) {
            match node.kind() {
                "export_statement" => self.collect_export(node),
                _ => {
                    self.collect_declaration(node, false);
                }
            }
        }
    }

    /// Collect a declaration statement. Returns the declared names.
    fn collect_declaration(&mut self, node: Node<'a>, is_default: bool) -> Vec<String> {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                let name = match node.child_by_field_name("name") {
                    Some(n) => text(n, self.source()).to_string(),
                    None => self.synthesize_name(),
                };
                let jsdoc = declaration_jsdoc(node, self.source());
                self.collect_class(node, name.clone(), jsdoc.as_ref());
                vec![name]
            }
            "lexical_declaration" | "variable_declaration" => self.collect_variables(node),
            "function_declaration" | "generator_function_declaration" => {
                let name = match node.child_by_field_name("name") {
                    Some(n) => text(n, self.source()).to_string(),
                    None if is_default => self.synthesize_name(),
                    None => return Vec::new(),
                };
                let jsdoc = declaration_jsdoc(node, self.source());
                self.collect_function(node, name.clone(), jsdoc.as_ref());
                vec![name]
            }
            _ => Vec::new(),
        }
    }

    fn collect_export(&mut self, node: Node<'a>) {
        let source = self.source();
        let is_default = node
            .children(&mut node.walk())
            .any(|c| !c.is_named() && c.kind() == "default");
        let from = node
            .child_by_field_name("source")
            .and_then(|s| string_value(s, source))
            .map(|s| Specifier::parse(&s, &self.parsed.path));

        if let Some(declaration) = node.child_by_field_name("declaration") {
            for name in self.collect_declaration(declaration, is_default) {
                let exported = if is_default {
                    "default".to_string()
                } else {
                    name.clone()
                };
                self.facts.exports.push(ExportRecord::Local {
                    exported,
                    local: name,
                });
            }
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            if let Some(local) = self.collect_default_value(node, value) {
                self.facts.exports.push(ExportRecord::Local {
                    exported: "default".to_string(),
                    local,
                });
            }
            return;
        }

        let mut saw_clause = false;
        for child in named_children(node) {
            match child.kind() {
                "export_clause" => {
                    saw_clause = true;
                    for spec in named_children(child) {
                        self.collect_export_specifier(spec, from.as_ref());
                    }
                }
                "namespace_export" => {
                    saw_clause = true;
                    debug!(module = %self.parsed.path, "skipping namespace re-export");
                }
                _ => {}
            }
        }

        if !saw_clause {
            if let Some(from) = from {
                self.facts.exports.push(ExportRecord::Star { source: from });
            }
        }
    }

    fn collect_export_specifier(&mut self, spec: Node, from: Option<&Specifier>) {
        if spec.kind() != "export_specifier" {
            return;
        }
        let source = self.source();
        let Some(name) = spec.child_by_field_name("name") else {
            return;
        };
        let local = export_name(name, source);
        let exported = spec
            .child_by_field_name("alias")
            .map(|a| export_name(a, source))
            .unwrap_or_else(|| local.clone());

        let record = match from {
            Some(from) => ExportRecord::ReExport {
                exported,
                imported: local,
                source: from.clone(),
            },
            None => ExportRecord::Local { exported, local },
        };
        self.facts.exports.push(record);
    }

    /// `export default <expr>`. Returns the local name it exports.
    fn collect_default_value(&mut self, statement: Node<'a>, value: Node<'a>) -> Option<String> {
        let source = self.source();
        let value = unwrap_parens(value);
        match value.kind() {
            "identifier" => Some(text(value, source).to_string()),
            "class" => {
                let name = match value.child_by_field_name("name") {
                    Some(n) => text(n, source).to_string(),
                    None => self.synthesize_name(),
                };
                let jsdoc = leading_jsdoc(statement, source);
                self.collect_class(value, name.clone(), jsdoc.as_ref());
                Some(name)
            }
            "arrow_function" | "function_expression" | "function" => {
                let name = match value.child_by_field_name("name") {
                    Some(n) => text(n, source).to_string(),
                    None => self.synthesize_name(),
                };
                let jsdoc = leading_jsdoc(statement, source);
                self.collect_function(value, name.clone(), jsdoc.as_ref());
                Some(name)
            }
            _ => None,
        }
    }

    /// One declaration per binding of a `const`/`let`/`var` statement.
    fn collect_variables(&mut self, node: Node<'a>) -> Vec<String> {
        let source = self.source();
        let statement_doc = declaration_jsdoc(node, source);
        let mut names = Vec::new();

        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                // Destructuring patterns declare nothing documentable.
                continue;
            }
            let name = text(name_node, source).to_string();
            let jsdoc = leading_jsdoc(declarator, source).or_else(|| statement_doc.clone());
            let value = declarator.child_by_field_name("value").map(unwrap_parens);

            match value.map(|v| (v, v.kind())) {
                Some((value, "class")) => self.collect_class(value, name.clone(), jsdoc.as_ref()),
                Some((value, "arrow_function" | "function_expression" | "function")) => {
                    self.collect_function(value, name.clone(), jsdoc.as_ref())
                }
                _ => {
                    let mut variable = VariableDoc {
                        name: name.clone(),
                        ..Default::default()
                    };
                    variable.type_ref = declarator
                        .child_by_field_name("type")
                        .and_then(|t| annotation_text(t, source))
                        .or_else(|| jsdoc.as_ref().and_then(JsDoc::type_text))
                        .or_else(|| value.and_then(literal_type).map(str::to_string))
                        .map(TypeRef::new);
                    variable.default = value.map(|v| text(v, source).to_string());
                    if let Some(literal) = value.and_then(|v| string_value(v, source)) {
                        self.constants.insert(name.clone(), literal);
                    }
                    if let Some(jsdoc) = &jsdoc {
                        variable.summary = jsdoc.summary();
                        variable.description = jsdoc.description.clone();
                        variable.deprecated = jsdoc.deprecated();
                        variable.annotations = jsdoc.annotations();
                    }
                    self.facts.declarations.push(Declaration::Variable(variable));
                }
            }
            names.push(name);
        }
        names
    }

    /// A function, or a mixin when it returns a class built on its parameter.
    fn collect_function(&mut self, node: Node<'a>, name: String, jsdoc: Option<&JsDoc>) {
        let source = self.source();
        let params = function_parameters(node)
            .map(|p| parameters(p, source, jsdoc))
            .unwrap_or_default();

        if let Some((class_node, hole)) = mixin_class(node, source) {
            let analyzed = analyze_class(
                class_node,
                source,
                &self.facts,
                &name,
                Some(hole.as_str()),
                jsdoc,
            );
            self.class_decorators
                .insert(name.clone(), analyzed.decorators.clone());
            let mut doc = self
                .pipeline
                .run_class(&self.parsed.path, analyzed, &mut self.facts.diagnostics);
            doc.parameters = params;
            self.facts.declarations.push(Declaration::Mixin(doc));
            return;
        }

        let mut function = FunctionDoc {
            name,
            parameters: params,
            return_doc: return_doc(node, source, jsdoc),
            ..Default::default()
        };
        if let Some(jsdoc) = jsdoc {
            function.summary = jsdoc.summary();
            function.description = jsdoc.description.clone();
            function.deprecated = jsdoc.deprecated();
            function.annotations = jsdoc.annotations();
        }
        self.facts.declarations.push(Declaration::Function(function));
    }

    fn collect_class(&mut self, node: Node<'a>, name: String, jsdoc: Option<&JsDoc>) {
        let analyzed = analyze_class(node, self.source(), &self.facts, &name, None, jsdoc);
        self.class_decorators
            .insert(name, analyzed.decorators.clone());
        let doc = self
            .pipeline
            .run_class(&self.parsed.path, analyzed, &mut self.facts.diagnostics);
        self.facts.declarations.push(Declaration::Class(doc));
    }

    /// Registrations anywhere in the tree.
    fn collect_definitions(&mut self) {
        let parsed = self.parsed;
        let source = self.source();
        let query = match Query::new(&parsed.ts_language(), DEFINE_QUERY) {
            Ok(query) => query,
            Err(e) => {
                warn!(module = %parsed.path, "registration query failed: {}", e);
                return;
            }
        };

        let mut calls = Vec::new();
        {
            let mut cursor = QueryCursor::new();
            let mut matches = cursor.matches(&query, parsed.root(), source);
            while let Some(m) = matches.next() {
                let mut object = None;
                let mut method = None;
                let mut args = None;
                let mut call = None;
                for capture in m.captures {
                    match query.capture_names()[capture.index as usize] {
                        "object" => object = Some(capture.node),
                        "method" => method = Some(capture.node),
                        "args" => args = Some(capture.node),
                        "call" => call = Some(capture.node),
                        _ => {}
                    }
                }
                if let (Some(object), Some(method), Some(args), Some(call)) =
                    (object, method, args, call)
                {
                    let target = text(object, source);
                    let is_registry = target == "customElements"
                        || target.ends_with(".customElements");
                    if is_registry && text(method, source) == "define" {
                        calls.push((call, args));
                    }
                }
            }
        }

        calls.sort_by_key(|(call, _)| call.start_byte());
        for (call, args) in calls {
            self.collect_definition(call, args);
        }
    }

    fn collect_definition(&mut self, call: Node<'a>, args: Node<'a>) {
        let source = self.source();
        let args = named_children(args);
        let (Some(tag_node), Some(class_node)) = (args.first(), args.get(1)) else {
            return;
        };

        let Some(tag) = self.static_string(*tag_node) else {
            debug!(module = %self.parsed.path, "registration with a non-literal tag name");
            return;
        };

        let class_node = unwrap_parens(*class_node);
        let class = match class_node.kind() {
            "identifier" => self.facts.reference_for(text(class_node, source)),
            "class" => {
                let name = match class_node.child_by_field_name("name") {
                    Some(n) => text(n, source).to_string(),
                    None => self.synthesize_name(),
                };
                self.collect_class(class_node, name.clone(), None);
                Reference::local(name, self.parsed.path.clone())
            }
            _ => {
                debug!(module = %self.parsed.path, tag = %tag, "registration of a non-class expression");
                return;
            }
        };

        self.facts.definitions.push(DefinitionRecord {
            tag,
            class,
            span: Span::from_node(call),
        });
    }

    /// A string literal, or an identifier bound to one in this module.
    fn static_string(&self, node: Node) -> Option<String> {
        let source = self.source();
        if let Some(value) = string_value(node, source) {
            return Some(value);
        }
        if node.kind() != "identifier" {
            return None;
        }
        self.constants.get(text(node, source)).cloned()
    }
}

/// Text of an export name, which may be a string in `export { a as "b" }`.
fn export_name(node: Node, source: &[u8]) -> String {
    string_value(node, source).unwrap_or_else(|| text(node, source).to_string())
}

fn function_parameters(node: Node) -> Option<Node> {
    node.child_by_field_name("parameters")
}

/// Name of the first parameter of a function-like node.
fn first_parameter(node: Node, source: &[u8]) -> Option<String> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return Some(text(single, source).to_string());
    }
    let params = function_parameters(node)?;
    let first = named_children(params).into_iter().next()?;
    let pattern = match first.kind() {
        "required_parameter" | "optional_parameter" => first.child_by_field_name("pattern")?,
        "assignment_pattern" => first.child_by_field_name("left")?,
        _ => first,
    };
    (pattern.kind() == "identifier").then(|| text(pattern, source).to_string())
}

/// The class a mixin function returns, with the name of its base parameter.
fn mixin_class<'t>(node: Node<'t>, source: &[u8]) -> Option<(Node<'t>, String)> {
    let hole = first_parameter(node, source)?;
    let body = unwrap_parens(node.child_by_field_name("body")?);

    if body.kind() == "class" {
        return Some((body, hole));
    }
    if body.kind() != "statement_block" {
        return None;
    }

    let statements = named_children(body);
    for statement in &statements {
        if statement.kind() != "return_statement" {
            continue;
        }
        let returned = unwrap_parens(named_children(*statement).into_iter().next()?);
        match returned.kind() {
            "class" => return Some((returned, hole)),
            "identifier" => {
                let wanted = text(returned, source);
                return statements
                    .iter()
                    .find(|s| {
                        s.kind() == "class_declaration"
                            && s.child_by_field_name("name")
                                .map(|n| text(n, source) == wanted)
                                .unwrap_or(false)
                    })
                    .map(|class| (*class, hole));
            }
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::get_provider;
    use std::path::Path;

    fn collect(path: &str, source: &str) -> ModuleFacts {
        let ext = path.rsplit('.').next().unwrap();
        let parsed = get_provider(ext)
            .unwrap()
            .parse(Path::new(path), source.as_bytes())
            .unwrap();
        collect_module(&parsed, &PluginPipeline::default())
    }

    fn names(facts: &ModuleFacts) -> Vec<(&str, &str)> {
        facts
            .declarations
            .iter()
            .map(|d| (d.kind_str(), d.name()))
            .collect()
    }

    #[test]
    fn test_declarations_in_source_order() {
        let facts = collect(
            "src/a.js",
            r#"
export const a = 1, b = 'two';
function helper(x) { return x; }
export class Foo extends HTMLElement {}
let c;
"#,
        );
        assert_eq!(
            names(&facts),
            vec![
                ("variable", "a"),
                ("variable", "b"),
                ("function", "helper"),
                ("class", "Foo"),
                ("variable", "c"),
            ]
        );
        let exported: Vec<_> = facts.exports.iter().filter_map(|e| e.exported()).collect();
        assert_eq!(exported, vec!["a", "b", "Foo"]);
    }

    #[test]
    fn test_default_export_anonymous_class() {
        let facts = collect("src/a.js", "export default class extends HTMLElement {}");
        assert_eq!(names(&facts), vec![("class", "anonymous_0")]);
        assert_eq!(
            facts.exports,
            vec![ExportRecord::Local {
                exported: "default".to_string(),
                local: "anonymous_0".to_string()
            }]
        );
    }

    #[test]
    fn test_reexports_recorded_unresolved() {
        let facts = collect(
            "src/index.js",
            r#"
export { Foo, Bar as Baz } from './foo.js';
export * from './all.js';
export { local };
const local = 1;
"#,
        );
        assert_eq!(
            facts.exports[1],
            ExportRecord::ReExport {
                exported: "Baz".to_string(),
                imported: "Bar".to_string(),
                source: Specifier::Local("src/foo.js".to_string()),
            }
        );
        assert_eq!(
            facts.exports[2],
            ExportRecord::Star {
                source: Specifier::Local("src/all.js".to_string())
            }
        );
        assert_eq!(
            facts.exports[3],
            ExportRecord::Local {
                exported: "local".to_string(),
                local: "local".to_string()
            }
        );
    }

    #[test]
    fn test_binding_doc_overrides_statement_doc() {
        let facts = collect(
            "src/a.js",
            r#"
/** @internal */
export const a = 1, /** @ignore */ b = 2;
"#,
        );
        assert!(facts.declarations[0].annotations().has("internal"));
        assert!(facts.declarations[1].annotations().has("ignore"));
        assert!(!facts.declarations[1].annotations().has("internal"));
    }

    #[test]
    fn test_define_registrations() {
        let facts = collect(
            "src/a.js",
            r#"
import { Imported } from './imported.js';
const TAG = 'my-local';
class Local extends HTMLElement {}
customElements.define(TAG, Local);
window.customElements.define('my-imported', Imported);
customElements.define('my-inline', class extends HTMLElement {});
"#,
        );
        let tags: Vec<_> = facts.definitions.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["my-local", "my-imported", "my-inline"]);
        assert_eq!(
            facts.definitions[0].class,
            Reference::local("Local", "src/a.js")
        );
        assert_eq!(
            facts.definitions[1].class,
            Reference::local("Imported", "src/imported.js")
        );
        assert_eq!(facts.declarations.last().unwrap().name(), "anonymous_0");
    }

    #[test]
    fn test_computed_tag_constants_are_skipped() {
        let facts = collect(
            "src/a.js",
            r#"
const suffix = 'el';
const TAG = 'x-' + suffix;
const ü = 'el';
const WIDE = 'x-' + ü;
const PLAIN = "x-plain";
class El extends HTMLElement {}
customElements.define(TAG, El);
customElements.define(WIDE, El);
customElements.define(PLAIN, El);
"#,
        );
        let tags: Vec<_> = facts.definitions.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["x-plain"]);
    }

    #[test]
    fn test_mixin_declarations() {
        let facts = collect(
            "src/mixins.js",
            r#"
export const Sized = (superClass) => class extends superClass {
    size = 'm';
};
export function Toggled(base) {
    class ToggledElement extends base { open = false; }
    return ToggledElement;
}
export const notAMixin = (x) => x + 1;
"#,
        );
        assert_eq!(
            names(&facts),
            vec![
                ("mixin", "Sized"),
                ("mixin", "Toggled"),
                ("function", "notAMixin"),
            ]
        );
        let sized = facts.declarations[0].as_class().unwrap();
        assert!(sized.superclass.is_none());
        assert_eq!(sized.members[0].name, "size");
        assert_eq!(sized.parameters[0].name, "superClass");
    }

    #[test]
    fn test_syntax_errors_are_diagnosed_not_fatal() {
        let facts = collect("src/a.js", "export class Ok {}\nclass {{{ broken");
        assert!(facts
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::SyntaxError));
        assert_eq!(facts.declarations[0].name(), "Ok");
    }

    #[test]
    fn test_imports() {
        let facts = collect(
            "src/a.ts",
            "import Def, { A as B } from 'pkg';\nimport * as ns from './ns.js';",
        );
        assert_eq!(facts.imports.len(), 3);
        assert_eq!(facts.imports[0].imported, "default");
        assert_eq!(facts.imports[1].local, "B");
        assert_eq!(facts.imports[1].imported, "A");
        assert_eq!(facts.imports[2].imported, "*");
    }
}
