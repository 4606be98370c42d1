//! Locating source modules on disk.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::analysis::SourceInput;

/// Default include pattern.
pub const DEFAULT_GLOBS: &[&str] = &["**/*.{js,ts}"];

/// Directories never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// A root directory plus include/exclude patterns.
#[derive(Debug, Clone)]
pub struct SourceSet {
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
}

fn build(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid glob pattern {:?}: {}", pattern, e))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

impl SourceSet {
    pub fn new(
        root: impl AsRef<Path>,
        include: &[String],
        exclude: &[String],
    ) -> anyhow::Result<Self> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            include: build(include)?,
            exclude: build(exclude)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Module path for a file under the root: relative, `/`-separated.
    pub fn module_path(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Whether a module path belongs to the set.
    pub fn matches(&self, module_path: &str) -> bool {
        if module_path
            .split('/')
            .any(|part| part.starts_with('.') || SKIPPED_DIRS.contains(&part))
        {
            return false;
        }
        self.include.is_match(module_path) && !self.exclude.is_match(module_path)
    }

    /// All matching files, sorted by module path.
    pub fn files(&self) -> anyhow::Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 || !e.file_type().is_dir() {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
            })
        {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = self.module_path(entry.path()) else {
                continue;
            };
            if self.matches(&path) {
                files.push((path, entry.path().to_path_buf()));
            }
        }
        files.sort();
        debug!(root = %self.root.display(), files = files.len(), "collected source files");
        Ok(files)
    }

    /// Inputs for the analyzer; files are read during analysis.
    pub fn inputs(&self) -> anyhow::Result<Vec<SourceInput>> {
        Ok(self
            .files()?
            .into_iter()
            .map(|(path, file)| SourceInput::File { path, file })
            .collect())
    }
}
