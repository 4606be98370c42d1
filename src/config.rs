//! Analyzer configuration.
//!
//! Loaded from a YAML file discovered in the working directory; command-line
//! flags override individual fields.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::link::{LinkOptions, DEFAULT_MAX_REEXPORT_HOPS};
use crate::loader::{SourceSet, DEFAULT_GLOBS};
use crate::package::Package;

/// Config file names searched for, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &[
    "cem.yaml",
    "custom-elements-manifest.yaml",
    ".cem.yaml",
];

/// Starter config written by `init`.
pub const TEMPLATE: &str = include_str!("templates/cem.yaml");

fn default_globs() -> Vec<String> {
    DEFAULT_GLOBS.iter().map(|g| g.to_string()).collect()
}

fn default_outdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_max_reexport_hops() -> usize {
    DEFAULT_MAX_REEXPORT_HOPS
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Include patterns, relative to the analyzed root.
    #[serde(default = "default_globs")]
    pub globs: Vec<String>,
    /// Exclude patterns.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Directory `custom-elements.json` is written to.
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,
    /// Manifests of dependency packages used while linking.
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
    #[serde(default)]
    pub lit: bool,
    #[serde(default)]
    pub fast: bool,
    #[serde(default)]
    pub stencil: bool,
    /// Additional plugins by name, run after the flag-enabled ones.
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_reexport_hops")]
    pub max_reexport_hops: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            globs: default_globs(),
            exclude: Vec::new(),
            outdir: default_outdir(),
            dependencies: Vec::new(),
            lit: false,
            fast: false,
            stencil: false,
            plugins: Vec::new(),
            watch: false,
            debounce_ms: default_debounce_ms(),
            max_reexport_hops: default_max_reexport_hops(),
        }
    }
}

/// A dependency package manifest.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DependencyConfig {
    /// Package name as imported (`lit`, `@scope/ui`).
    pub name: String,
    /// Path to the package's `custom-elements.json`.
    pub manifest: PathBuf,
}

impl DependencyConfig {
    /// Parse a `NAME=PATH` command-line value.
    pub fn parse_arg(value: &str) -> anyhow::Result<Self> {
        let (name, manifest) = value
            .split_once('=')
            .filter(|(name, path)| !name.is_empty() && !path.is_empty())
            .ok_or_else(|| anyhow::anyhow!("invalid dependency {:?}, expected NAME=PATH", value))?;
        Ok(Self {
            name: name.to_string(),
            manifest: PathBuf::from(manifest),
        })
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        // An empty file is a valid, all-defaults config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Plugin names in run order: flag-enabled built-ins, then the list.
    pub fn plugin_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for (enabled, name) in [(self.lit, "lit"), (self.fast, "fast"), (self.stencil, "stencil")] {
            if enabled {
                names.push(name.to_string());
            }
        }
        names.extend(self.plugins.iter().cloned());
        names
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            max_reexport_hops: self.max_reexport_hops,
        }
    }

    /// The source set for a root directory.
    pub fn source_set(&self, root: &Path) -> anyhow::Result<SourceSet> {
        SourceSet::new(root, &self.globs, &self.exclude)
    }

    /// Load every dependency manifest. Relative paths are resolved against
    /// `base`.
    pub fn load_packages(&self, base: &Path) -> anyhow::Result<Vec<Package>> {
        self.dependencies
            .iter()
            .map(|dep| {
                let path = if dep.manifest.is_absolute() {
                    dep.manifest.clone()
                } else {
                    base.join(&dep.manifest)
                };
                Package::load(dep.name.clone(), &path).map_err(|e| {
                    anyhow::anyhow!("dependency {} ({}): {}", dep.name, path.display(), e)
                })
            })
            .collect()
    }
}

/// Discover a config file in a directory.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
}

/// Validate a config.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if config.globs.is_empty() {
        anyhow::bail!("globs must not be empty");
    }
    for pattern in config.globs.iter().chain(config.exclude.iter()) {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid glob pattern {:?}: {}", pattern, e))?;
    }
    if config.max_reexport_hops == 0 {
        anyhow::bail!("max_reexport_hops must be at least 1");
    }
    let mut names = std::collections::BTreeSet::new();
    for dep in &config.dependencies {
        if !names.insert(dep.name.as_str()) {
            anyhow::bail!("dependency {:?} listed twice", dep.name);
        }
    }
    Ok(())
}
