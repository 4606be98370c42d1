//! Per-module facts produced by the collector and consumed by linking.

use std::collections::BTreeSet;
use std::fmt;

use crate::diagnostics::Diagnostic;
use crate::manifest::{Declaration, Reference};

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Where an import or re-export points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Specifier {
    /// Relative specifier, normalized against the importing module
    /// (`./base.js` from `src/a.js` becomes `src/base.js`).
    Local(String),
    /// Bare specifier naming a package, with an optional subpath.
    Package { name: String, subpath: Option<String> },
}

impl Specifier {
    /// Classify a raw specifier string written in `from_module`.
    pub fn parse(raw: &str, from_module: &str) -> Self {
        if raw.starts_with("./") || raw.starts_with("../") || raw.starts_with('/') {
            return Specifier::Local(resolve_relative(from_module, raw));
        }

        // `@scope/name/sub` keeps two segments for the package name.
        let mut parts = raw.splitn(if raw.starts_with('@') { 3 } else { 2 }, '/');
        let name = if raw.starts_with('@') {
            let scope = parts.next().unwrap_or_default();
            let pkg = parts.next().unwrap_or_default();
            format!("{}/{}", scope, pkg)
        } else {
            parts.next().unwrap_or_default().to_string()
        };
        let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Specifier::Package { name, subpath }
    }

    /// Reference hint for a binding imported through this specifier.
    pub fn reference(&self, name: &str) -> Reference {
        match self {
            Specifier::Local(path) => Reference::local(name, path.clone()),
            Specifier::Package { name: package, subpath } => Reference {
                name: name.to_string(),
                package: Some(package.clone()),
                module: subpath.clone(),
            },
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specifier::Local(path) => write!(f, "{}", path),
            Specifier::Package { name, subpath: Some(sub) } => write!(f, "{}/{}", name, sub),
            Specifier::Package { name, subpath: None } => write!(f, "{}", name),
        }
    }
}

/// Join a relative specifier onto the directory of `from_module`,
/// collapsing `.` and `..` segments.
pub fn resolve_relative(from_module: &str, raw: &str) -> String {
    let mut segments: Vec<&str> = if raw.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = from_module.split('/').collect();
        dir.pop();
        dir
    };

    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// An export statement entry, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRecord {
    /// `export class X`, `export { a as b }`, `export default X`.
    Local { exported: String, local: String },
    /// `export { a as b } from './other.js'`.
    ReExport {
        exported: String,
        imported: String,
        source: Specifier,
    },
    /// `export * from './other.js'`.
    Star { source: Specifier },
}

impl ExportRecord {
    /// Exported name, if the record names one.
    pub fn exported(&self) -> Option<&str> {
        match self {
            ExportRecord::Local { exported, .. } | ExportRecord::ReExport { exported, .. } => {
                Some(exported)
            }
            ExportRecord::Star { .. } => None,
        }
    }
}

/// A tag name registered against a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRecord {
    pub tag: String,
    /// Reference hint for the registered class; same-module classes carry
    /// this module's path.
    pub class: Reference,
    pub span: Span,
}

/// One imported binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Name bound in the importing module.
    pub local: String,
    /// Name imported from the source module (`default` or `*` for
    /// default and namespace imports).
    pub imported: String,
    pub source: Specifier,
}

/// Everything the per-module phases learned about one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleFacts {
    /// Module path relative to the analysis root.
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Top-level declarations in source order.
    pub declarations: Vec<Declaration>,
    /// Export records in source order.
    pub exports: Vec<ExportRecord>,
    /// Registrations found anywhere in the module.
    pub definitions: Vec<DefinitionRecord>,
    pub imports: Vec<ImportBinding>,
    /// Diagnostics local to this module.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when a module-level plugin hook failed.
    pub partial: bool,
    /// Names of declarations removed by `@ignore`.
    pub ignored: BTreeSet<String>,
}

impl ModuleFacts {
    /// Create empty facts for a module.
    pub fn empty(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name() == name)
    }

    pub fn declaration_mut(&mut self, name: &str) -> Option<&mut Declaration> {
        self.declarations.iter_mut().find(|d| d.name() == name)
    }

    /// Import binding for a local name.
    pub fn import(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|i| i.local == local)
    }

    /// Reference hint for an identifier used in this module: a local
    /// declaration, an imported binding, or an unqualified external name.
    pub fn reference_for(&self, name: &str) -> Reference {
        if self.declaration(name).is_some() {
            return Reference::local(name, self.path.clone());
        }
        match self.import(name) {
            Some(import) if import.imported != "*" => import.source.reference(&import.imported),
            _ => Reference::external(name),
        }
    }

    /// Number of classes and mixins.
    pub fn class_count(&self) -> usize {
        self.declarations
            .iter()
            .filter(|d| d.as_class().is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ClassDoc, Declaration};

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("src/a.js", "./base.js"), "src/base.js");
        assert_eq!(resolve_relative("src/deep/a.js", "../base.js"), "src/base.js");
        assert_eq!(resolve_relative("a.js", "./b.js"), "b.js");
        assert_eq!(resolve_relative("src/a.js", "../../x.js"), "x.js");
    }

    #[test]
    fn test_specifier_parse() {
        assert_eq!(
            Specifier::parse("./b.js", "src/a.js"),
            Specifier::Local("src/b.js".to_string())
        );
        assert_eq!(
            Specifier::parse("lit", "src/a.js"),
            Specifier::Package {
                name: "lit".to_string(),
                subpath: None
            }
        );
        assert_eq!(
            Specifier::parse("@scope/pkg/sub/x.js", "src/a.js"),
            Specifier::Package {
                name: "@scope/pkg".to_string(),
                subpath: Some("sub/x.js".to_string())
            }
        );
    }

    #[test]
    fn test_reference_for_prefers_local_declaration() {
        let mut facts = ModuleFacts::empty("src/a.js");
        facts
            .declarations
            .push(Declaration::Class(ClassDoc::new("Base")));
        facts.imports.push(ImportBinding {
            local: "Other".to_string(),
            imported: "Renamed".to_string(),
            source: Specifier::Local("src/other.js".to_string()),
        });

        assert_eq!(
            facts.reference_for("Base"),
            Reference::local("Base", "src/a.js")
        );
        assert_eq!(
            facts.reference_for("Other"),
            Reference::local("Renamed", "src/other.js")
        );
        assert_eq!(facts.reference_for("HTMLElement"), Reference::external("HTMLElement"));
    }
}
