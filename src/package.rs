//! Dependency packages: previously emitted manifests used as linking context.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::PackageError;
use crate::manifest::{ClassDoc, Declaration, ExportKind, Manifest, Reference};

/// A read-only manifest of a dependency package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Package name as written in import specifiers (`lit`, `@scope/ui`).
    pub name: String,
    pub manifest: Manifest,
}

impl Package {
    pub fn new(name: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            name: name.into(),
            manifest,
        }
    }

    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, PackageError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        Ok(Self::new(name, manifest))
    }

    /// Load `custom-elements.json` (or any manifest file) from disk.
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self, PackageError> {
        let name = name.into();
        let json = fs::read_to_string(path)?;
        let package = Self::from_json(name, &json)?;
        debug!(
            package = %package.name,
            modules = package.manifest.modules.len(),
            "loaded package manifest"
        );
        Ok(package)
    }

    /// Resolve an exported name, optionally within one module of the package.
    ///
    /// The returned reference always names this package.
    pub fn export(&self, subpath: Option<&str>, name: &str) -> Option<Reference> {
        self.manifest
            .modules
            .iter()
            .filter(|m| subpath.map_or(true, |sub| module_matches(&m.path, sub)))
            .find_map(|m| m.export(name))
            .map(|export| {
                let mut reference = export.declaration.clone();
                if reference.package.is_none() {
                    reference.package = Some(self.name.clone());
                }
                reference
            })
    }

    /// Names of the `js` exports, optionally of one module only.
    pub fn export_names(&self, subpath: Option<&str>) -> Vec<String> {
        self.manifest
            .modules
            .iter()
            .filter(|m| subpath.map_or(true, |sub| module_matches(&m.path, sub)))
            .flat_map(|m| {
                m.exports
                    .iter()
                    .filter(|e| e.kind == ExportKind::Js)
                    .map(|e| e.name.clone())
            })
            .collect()
    }

    /// Find a declaration by module path and name.
    pub fn declaration(&self, module: &str, name: &str) -> Option<&Declaration> {
        self.manifest
            .modules
            .iter()
            .find(|m| module_matches(&m.path, module))?
            .declaration(name)
    }

    pub fn class(&self, module: &str, name: &str) -> Option<&ClassDoc> {
        self.declaration(module, name).and_then(Declaration::as_class)
    }

    /// Whether a reference into this package names something it declares.
    ///
    /// References without a module match a declaration of that name in any
    /// module.
    pub fn contains(&self, reference: &Reference) -> bool {
        match reference.module.as_deref() {
            Some(module) => self.declaration(module, &reference.name).is_some(),
            None => self
                .manifest
                .modules
                .iter()
                .any(|m| m.declaration(&reference.name).is_some()),
        }
    }
}

/// Module paths in package manifests may be written with or without a
/// leading `./` or a different source extension.
fn module_matches(path: &str, wanted: &str) -> bool {
    let path = path.trim_start_matches("./");
    let wanted = wanted.trim_start_matches("./");
    path == wanted || strip_extension(path) == strip_extension(wanted)
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"{
        "schemaVersion": "1.0.0",
        "modules": [{
            "kind": "javascript-module",
            "path": "./src/base-element.js",
            "declarations": [{"kind": "class", "name": "BaseElement",
                "members": [{"kind": "field", "name": "value"}]}],
            "exports": [{"kind": "js", "name": "BaseElement",
                "declaration": {"name": "BaseElement", "module": "./src/base-element.js"}}]
        }]
    }"#;

    #[test]
    fn test_export_names_package() {
        let package = Package::from_json("ui-kit", MANIFEST).unwrap();
        let reference = package.export(None, "BaseElement").unwrap();
        assert_eq!(reference.package.as_deref(), Some("ui-kit"));
        assert_eq!(reference.module.as_deref(), Some("./src/base-element.js"));
        assert!(package.contains(&reference));
        assert!(package.export(Some("src/base-element.ts"), "BaseElement").is_some());
        assert!(package.export(None, "Missing").is_none());
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let package = Package::load("ui-kit", file.path()).unwrap();
        assert!(package.class("src/base-element.js", "BaseElement").is_some());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            Package::from_json("bad", "{not json"),
            Err(PackageError::Json(_))
        ));
    }
}
