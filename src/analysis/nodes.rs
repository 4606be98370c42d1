//! Small helpers over tree-sitter nodes shared by the collector, the class
//! analyzer and plugins.

use tree_sitter::Node;

/// Source text of a node.
pub fn text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// Named children, skipping comments.
pub fn named_children(node: Node) -> Vec<Node> {
    let mut walk = node.walk();
    node.named_children(&mut walk)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Whether the node has a direct anonymous child token such as `static`.
pub fn has_token(node: Node, token: &str) -> bool {
    let mut walk = node.walk();
    let found = node
        .children(&mut walk)
        .any(|c| !c.is_named() && c.kind() == token);
    found
}

/// Strip any number of wrapping parentheses.
pub fn unwrap_parens(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match named_children(node).into_iter().next() {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Content of a string literal, or of a template string without
/// substitutions.
pub fn string_value(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "string" | "template_string" => {
            let mut walk = node.walk();
            if node
                .named_children(&mut walk)
                .any(|c| c.kind() == "template_substitution")
            {
                return None;
            }
            let raw = text(node, source);
            if raw.len() < 2 {
                return None;
            }
            Some(raw[1..raw.len() - 1].to_string())
        }
        _ => None,
    }
}

/// Type name inferred from a literal initializer.
pub fn literal_type(node: Node) -> Option<&'static str> {
    let node = unwrap_parens(node);
    match node.kind() {
        "string" | "template_string" => Some("string"),
        "number" => Some("number"),
        "true" | "false" => Some("boolean"),
        "unary_expression" => {
            let operand = node.child_by_field_name("argument")?;
            (operand.kind() == "number").then_some("number")
        }
        _ => None,
    }
}

/// Property or member name, keeping the `#` of private names.
pub fn property_name(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "string" => string_value(node, source).unwrap_or_default(),
        "computed_property_name" => text(node, source).to_string(),
        _ => text(node, source).to_string(),
    }
}

/// Call all nodes under `node` in pre-order.
pub fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    let mut descending = true;
    loop {
        if descending {
            f(cursor.node());
            if cursor.goto_first_child() {
                continue;
            }
        }
        if cursor.goto_next_sibling() {
            descending = true;
            continue;
        }
        if !cursor.goto_parent() {
            return;
        }
        if cursor.node() == node {
            return;
        }
        descending = false;
    }
}

/// A statically readable expression value: enough of JavaScript literal
/// syntax for decorator options and `static properties` objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(String),
    Bool(bool),
    /// Bare identifier or member path, e.g. `String` or `Types.Bool`.
    Ident(String),
    /// Object literal entries in source order.
    Object(Vec<(String, Value)>),
    Array(Vec<Value>),
    /// Anything else, as source text.
    Other(String),
}

impl Value {
    pub fn from_node(node: Node, source: &[u8]) -> Value {
        let node = unwrap_parens(node);
        if let Some(s) = string_value(node, source) {
            return Value::String(s);
        }
        match node.kind() {
            "number" => Value::Number(text(node, source).to_string()),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "identifier" | "member_expression" => Value::Ident(text(node, source).to_string()),
            "object" => {
                let mut entries = Vec::new();
                for child in named_children(node) {
                    match child.kind() {
                        "pair" => {
                            let key = child.child_by_field_name("key");
                            let value = child.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value) {
                                entries.push((
                                    property_name(key, source),
                                    Value::from_node(value, source),
                                ));
                            }
                        }
                        "shorthand_property_identifier" => {
                            let name = text(child, source).to_string();
                            entries.push((name.clone(), Value::Ident(name)));
                        }
                        _ => {}
                    }
                }
                Value::Object(entries)
            }
            "array" => Value::Array(
                named_children(node)
                    .into_iter()
                    .map(|c| Value::from_node(c, source))
                    .collect(),
            ),
            _ => Value::Other(text(node, source).to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Identifier text (`String`, `Boolean`, ...).
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Value::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Object property lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Source-like text for use as a default value.
    pub fn to_source(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s),
            Value::Number(n) | Value::Ident(n) | Value::Other(n) => n.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Object(_) => "{...}".to_string(),
            Value::Array(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(Value::to_source)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

/// A decorator application, e.g. `@property({ type: String })`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    /// Callee name without `@`; for member paths only the last segment.
    pub name: String,
    pub arguments: Vec<Value>,
}

impl Decorator {
    pub fn from_node(node: Node, source: &[u8]) -> Option<Decorator> {
        let expr = named_children(node).into_iter().next()?;
        let (callee, arguments) = match expr.kind() {
            "call_expression" => {
                let callee = expr.child_by_field_name("function")?;
                let arguments = expr
                    .child_by_field_name("arguments")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .map(|a| Value::from_node(a, source))
                            .collect()
                    })
                    .unwrap_or_default();
                (callee, arguments)
            }
            _ => (expr, Vec::new()),
        };

        let name = match callee.kind() {
            "member_expression" => callee
                .child_by_field_name("property")
                .map(|p| text(p, source).to_string())?,
            _ => text(callee, source).to_string(),
        };
        Some(Decorator { name, arguments })
    }

    /// First argument, when present.
    pub fn argument(&self) -> Option<&Value> {
        self.arguments.first()
    }
}

/// Parse every `decorator` child of a node.
pub fn decorators_of(node: Node, source: &[u8]) -> Vec<Decorator> {
    let mut walk = node.walk();
    let decorators = node
        .children(&mut walk)
        .filter(|c| c.kind() == "decorator")
        .filter_map(|c| Decorator::from_node(c, source))
        .collect();
    decorators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::get_provider;
    use std::path::Path;

    fn first_of_kind<'t>(root: Node<'t>, kind: &str) -> Option<Node<'t>> {
        let mut found = None;
        visit(root, &mut |n| {
            if found.is_none() && n.kind() == kind {
                found = Some(n);
            }
        });
        found
    }

    #[test]
    fn test_value_from_object_literal() {
        let source = b"const o = { type: String, attribute: 'my-attr', reflect: true, n: 3 };";
        let parsed = get_provider("js")
            .unwrap()
            .parse(Path::new("a.js"), source)
            .unwrap();
        let object = first_of_kind(parsed.root(), "object").unwrap();
        let value = Value::from_node(object, source);

        assert_eq!(value.get("type").and_then(Value::as_ident), Some("String"));
        assert_eq!(value.get("attribute").and_then(Value::as_str), Some("my-attr"));
        assert_eq!(value.get("reflect").and_then(Value::as_bool), Some(true));
        assert_eq!(value.get("n"), Some(&Value::Number("3".to_string())));
    }

    #[test]
    fn test_decorator_parsing() {
        let source = b"class A { @property({ type: Boolean }) open = false; @state() hidden; }";
        let parsed = get_provider("ts")
            .unwrap()
            .parse(Path::new("a.ts"), source)
            .unwrap();
        let field = first_of_kind(parsed.root(), "public_field_definition").unwrap();
        let decorators = decorators_of(field, source);
        assert_eq!(decorators.len(), 1);
        assert_eq!(decorators[0].name, "property");
        assert_eq!(
            decorators[0]
                .argument()
                .and_then(|a| a.get("type"))
                .and_then(Value::as_ident),
            Some("Boolean")
        );
    }

    #[test]
    fn test_string_value_rejects_substitutions() {
        let source = b"const a = 'x'; const b = `y`; const c = `z${a}`;";
        let parsed = get_provider("js")
            .unwrap()
            .parse(Path::new("a.js"), source)
            .unwrap();
        let mut values = Vec::new();
        visit(parsed.root(), &mut |n| {
            if matches!(n.kind(), "string" | "template_string") {
                values.push(string_value(n, source));
            }
        });
        assert_eq!(
            values,
            vec![Some("x".to_string()), Some("y".to_string()), None]
        );
    }
}
