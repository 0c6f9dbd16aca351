//! Component discovery
//!
//! Scans the components directory once per build and returns the ordered
//! component identifiers. Scanning and selection are separate so selection
//! can be driven from an in-memory listing.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{BuildError, BuildResult};

/// Identifier of a discovered component, equal to its directory name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub is_dir: bool,
    pub has_entry: bool,
}

/// Component discovery over one components directory
pub struct Discovery {
    components_dir: PathBuf,
    index_source: String,
    exclude: GlobSet,
}

impl Discovery {
    pub fn new(config: &Config) -> BuildResult<Self> {
        Self::with_dir(
            config.components_dir(),
            &config.source.index_source,
            &config.source.exclude,
        )
    }

    pub fn with_dir(
        components_dir: impl Into<PathBuf>,
        index_source: &str,
        exclude: &[String],
    ) -> BuildResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            let glob = Glob::new(pattern).map_err(|e| {
                BuildError::config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        let exclude = builder
            .build()
            .map_err(|e| BuildError::config(format!("invalid exclude patterns: {}", e)))?;

        Ok(Self {
            components_dir: components_dir.into(),
            index_source: index_source.to_string(),
            exclude,
        })
    }

    pub fn components_dir(&self) -> &Path {
        &self.components_dir
    }

    /// Scan the filesystem and select components
    pub fn run(&self) -> BuildResult<Vec<ComponentId>> {
        let candidates = self.scan()?;
        let ids = self.select(candidates);
        debug!(
            "Discovered {} component(s) in {}",
            ids.len(),
            self.components_dir.display()
        );
        Ok(ids)
    }

    /// List the immediate children of the components directory, sorted by name
    pub fn scan(&self) -> BuildResult<Vec<Candidate>> {
        if !self.components_dir.is_dir() {
            return Err(BuildError::config(format!(
                "components directory does not exist: {}",
                self.components_dir.display()
            )));
        }

        let mut candidates = Vec::new();
        let walker = WalkDir::new(&self.components_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                BuildError::config(format!(
                    "cannot read components directory {}: {}",
                    self.components_dir.display(),
                    e
                ))
            })?;
            let is_dir = entry.file_type().is_dir();
            let has_entry = is_dir && entry.path().join(&self.index_source).is_file();
            candidates.push(Candidate {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
                has_entry,
            });
        }

        Ok(candidates)
    }

    /// Keep directories that carry an entry file, in listing order
    pub fn select(&self, candidates: impl IntoIterator<Item = Candidate>) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = Vec::new();

        for candidate in candidates {
            if !candidate.is_dir || !candidate.has_entry {
                debug!("Skipping {}: not a component directory", candidate.name);
                continue;
            }
            if self.exclude.is_match(&candidate.name) {
                debug!("Skipping {}: excluded", candidate.name);
                continue;
            }
            let id = ComponentId::new(candidate.name);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn candidate(name: &str, is_dir: bool, has_entry: bool) -> Candidate {
        Candidate {
            name: name.to_string(),
            is_dir,
            has_entry,
        }
    }

    #[test]
    fn test_select_from_listing() {
        let discovery = Discovery::with_dir("/virtual", "index.ts", &["_*".to_string()]).unwrap();
        let ids = discovery.select(vec![
            candidate("button", true, true),
            candidate("README.md", false, false),
            candidate("empty", true, false),
            candidate("_internal", true, true),
            candidate("input", true, true),
        ]);
        assert_eq!(ids, vec![ComponentId::new("button"), ComponentId::new("input")]);
    }

    #[test]
    fn test_scan_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let components = dir.path().join("components");
        fs::create_dir_all(components.join("input")).unwrap();
        fs::create_dir_all(components.join("button")).unwrap();
        fs::create_dir_all(components.join("draft")).unwrap();
        fs::write(components.join("input/index.ts"), "export {};").unwrap();
        fs::write(components.join("button/index.ts"), "export {};").unwrap();
        fs::write(components.join("notes.txt"), "").unwrap();

        let discovery = Discovery::with_dir(&components, "index.ts", &[]).unwrap();
        let ids = discovery.run().unwrap();
        assert_eq!(ids, vec![ComponentId::new("button"), ComponentId::new("input")]);
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = Discovery::with_dir(dir.path().join("nope"), "index.ts", &[]).unwrap();
        assert!(matches!(discovery.run(), Err(BuildError::Config(_))));
    }
}
