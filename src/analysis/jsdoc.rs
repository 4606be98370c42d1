//! Documentation comment parsing.
//!
//! Handles `/** ... */` blocks: the free-text description followed by
//! `@tag {type} name - description` entries. Tag names become the
//! annotation set used by visibility filtering.

use regex::Regex;

use crate::manifest::{Annotations, Deprecation, Privacy};

lazy_static::lazy_static! {
    /// Leading `*` decoration on a comment line.
    static ref LINE_PREFIX: Regex = Regex::new(r"^\s*\*?\s?").unwrap();

    /// Start of a block tag.
    static ref TAG_START: Regex = Regex::new(r"^@([A-Za-z][\w-]*)\s*(.*)$").unwrap();

    /// `[name=default]` optional-name syntax.
    static ref OPTIONAL_NAME: Regex = Regex::new(r"^\[([^=\]]+)(?:=([^\]]*))?\]$").unwrap();
}

/// Tags whose first word is a name.
const NAMED_TAGS: &[&str] = &[
    "param",
    "arg",
    "argument",
    "attr",
    "attribute",
    "fires",
    "event",
    "slot",
    "cssprop",
    "cssproperty",
    "csspart",
    "prop",
    "property",
];

/// A single block tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsDocTag {
    /// Tag name without `@`, lowercased.
    pub tag: String,
    /// Contents of a leading `{...}` group.
    pub type_text: Option<String>,
    pub name: Option<String>,
    /// Default from `[name=value]`.
    pub default: Option<String>,
    /// Whether the name was written as `[name]`.
    pub optional: bool,
    pub description: Option<String>,
}

impl JsDocTag {
    /// Everything after the tag, for text-valued tags like `@summary`.
    pub fn text(&self) -> Option<String> {
        match (&self.name, &self.description) {
            (Some(name), Some(desc)) => Some(format!("{} {}", name, desc)),
            (Some(name), None) => Some(name.clone()),
            (None, desc) => desc.clone(),
        }
    }
}

/// A parsed documentation comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsDoc {
    pub description: Option<String>,
    pub tags: Vec<JsDocTag>,
}

impl JsDoc {
    /// Parse the raw text of a `/** */` comment. Returns `None` for other
    /// comment styles.
    pub fn parse(raw: &str) -> Option<JsDoc> {
        let body = raw.strip_prefix("/**")?.strip_suffix("*/")?;

        let mut description_lines = Vec::new();
        let mut tag_blocks: Vec<(String, Vec<String>)> = Vec::new();

        for line in body.lines() {
            let line = LINE_PREFIX.replace(line, "");
            let line = line.trim_end();
            if let Some(caps) = TAG_START.captures(line) {
                let tag = caps[1].to_ascii_lowercase();
                tag_blocks.push((tag, vec![caps[2].to_string()]));
            } else if let Some((_, lines)) = tag_blocks.last_mut() {
                lines.push(line.to_string());
            } else {
                description_lines.push(line.to_string());
            }
        }

        let description = join_text(&description_lines);
        let tags = tag_blocks
            .into_iter()
            .map(|(tag, lines)| parse_tag(tag, &lines.join("\n")))
            .collect();

        Some(JsDoc { description, tags })
    }

    /// Tag names on this comment.
    pub fn annotations(&self) -> Annotations {
        self.tags.iter().map(|t| t.tag.clone()).collect()
    }

    pub fn has(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.tag == tag)
    }

    /// First tag with any of the given names.
    pub fn tag(&self, names: &[&str]) -> Option<&JsDocTag> {
        self.tags.iter().find(|t| names.contains(&t.tag.as_str()))
    }

    /// All tags with any of the given names, in order.
    pub fn tags_named<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = &'a JsDocTag> {
        self.tags
            .iter()
            .filter(move |t| names.contains(&t.tag.as_str()))
    }

    pub fn summary(&self) -> Option<String> {
        self.tag(&["summary"]).and_then(JsDocTag::text)
    }

    pub fn deprecated(&self) -> Option<Deprecation> {
        self.tag(&["deprecated"]).map(|t| match t.text() {
            Some(reason) => Deprecation::Reason(reason),
            None => Deprecation::Flag(true),
        })
    }

    /// Explicit privacy tag. `@private` wins over `@protected` over `@public`.
    pub fn privacy(&self) -> Option<Privacy> {
        ["private", "protected", "public"]
            .iter()
            .find(|p| self.has(p))
            .and_then(|p| Privacy::parse(p))
    }

    /// `@type {T}`.
    pub fn type_text(&self) -> Option<String> {
        self.tag(&["type"]).and_then(|t| t.type_text.clone())
    }

    /// `@default value`.
    pub fn default_value(&self) -> Option<String> {
        self.tag(&["default"]).and_then(JsDocTag::text)
    }

    /// `@param` entry for a parameter name.
    pub fn param(&self, name: &str) -> Option<&JsDocTag> {
        self.tags_named(&["param", "arg", "argument"])
            .find(|t| t.name.as_deref() == Some(name))
    }

    /// `@returns` / `@return`.
    pub fn returns(&self) -> Option<&JsDocTag> {
        self.tag(&["returns", "return"])
    }
}

fn join_text(lines: &[String]) -> Option<String> {
    let text = lines.join("\n");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn parse_tag(tag: String, rest: &str) -> JsDocTag {
    let mut rest = rest.trim();
    let mut parsed = JsDocTag {
        tag,
        ..Default::default()
    };

    if rest.starts_with('{') {
        if let Some(end) = matching_brace(rest) {
            parsed.type_text = Some(rest[1..end].trim().to_string());
            rest = rest[end + 1..].trim_start();
        }
    }

    if NAMED_TAGS.contains(&parsed.tag.as_str()) {
        let (word, remainder) = match rest.find(char::is_whitespace) {
            Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
            None => (rest, ""),
        };

        if word == "-" {
            // Unnamed entry, e.g. `@slot - default slot`.
            parsed.name = Some(String::new());
            rest = remainder;
        } else if !word.is_empty() {
            if let Some(caps) = OPTIONAL_NAME.captures(word) {
                parsed.name = Some(caps[1].trim().to_string());
                parsed.default = caps.get(2).map(|m| m.as_str().trim().to_string());
                parsed.optional = true;
            } else {
                parsed.name = Some(word.to_string());
            }
            rest = remainder;
        }
    }

    let rest = rest.strip_prefix('-').unwrap_or(rest).trim();
    if !rest.is_empty() {
        parsed.description = Some(rest.to_string());
    }
    parsed
}

/// Index of the `}` closing the `{` at position 0.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Documentation comment attached to a node: the nearest preceding
/// `/** */` sibling, skipping decorators and plain comments.
pub fn leading_jsdoc(node: tree_sitter::Node, source: &[u8]) -> Option<JsDoc> {
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "decorator" => {}
            "comment" => {
                let text = sibling.utf8_text(source).unwrap_or("");
                if text.starts_with("/**") {
                    return JsDoc::parse(text);
                }
            }
            _ => return None,
        }
        current = sibling.prev_sibling();
    }
    None
}

/// Documentation for a declaration that may be wrapped in an
/// `export` statement.
pub fn declaration_jsdoc(node: tree_sitter::Node, source: &[u8]) -> Option<JsDoc> {
    if let Some(doc) = leading_jsdoc(node, source) {
        return Some(doc);
    }
    match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => leading_jsdoc(parent, source),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_and_simple_tags() {
        let doc = JsDoc::parse(
            r#"/**
 * A fancy element.
 * Second line.
 *
 * @summary Short one
 * @internal
 */"#,
        )
        .unwrap();
        assert_eq!(doc.description.as_deref(), Some("A fancy element.\nSecond line."));
        assert_eq!(doc.summary().as_deref(), Some("Short one"));
        assert!(doc.annotations().has("internal"));
        assert!(!doc.annotations().has("ignore"));
    }

    #[test]
    fn test_single_line_comment() {
        let doc = JsDoc::parse("/** @ignore */").unwrap();
        assert!(doc.has("ignore"));
        assert!(doc.description.is_none());
    }

    #[test]
    fn test_plain_block_comment_is_not_doc() {
        assert!(JsDoc::parse("/* @ignore */").is_none());
    }

    #[test]
    fn test_named_tags_with_types() {
        let doc = JsDoc::parse(
            r#"/**
 * @attr {boolean} disabled - Disables the element
 * @fires my-change - Fired on change
 * @slot - Default slot
 * @slot header - Header content
 * @cssprop {<color>} [--my-color=red] - Main color
 * @param {{a: number}} opts
 */"#,
        )
        .unwrap();

        let attr = doc.tag(&["attr"]).unwrap();
        assert_eq!(attr.type_text.as_deref(), Some("boolean"));
        assert_eq!(attr.name.as_deref(), Some("disabled"));
        assert_eq!(attr.description.as_deref(), Some("Disables the element"));

        let slots: Vec<_> = doc.tags_named(&["slot"]).collect();
        assert_eq!(slots[0].name.as_deref(), Some(""));
        assert_eq!(slots[1].name.as_deref(), Some("header"));

        let prop = doc.tag(&["cssprop"]).unwrap();
        assert_eq!(prop.name.as_deref(), Some("--my-color"));
        assert_eq!(prop.default.as_deref(), Some("red"));
        assert_eq!(prop.type_text.as_deref(), Some("<color>"));

        let param = doc.param("opts").unwrap();
        assert_eq!(param.type_text.as_deref(), Some("{a: number}"));
    }

    #[test]
    fn test_deprecated_and_privacy() {
        let doc = JsDoc::parse("/** @deprecated use other\n * @protected */").unwrap();
        assert_eq!(
            doc.deprecated(),
            Some(Deprecation::Reason("use other".to_string()))
        );
        assert_eq!(doc.privacy(), Some(Privacy::Protected));

        let bare = JsDoc::parse("/** @deprecated */").unwrap();
        assert_eq!(bare.deprecated(), Some(Deprecation::Flag(true)));
    }
}
