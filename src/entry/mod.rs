//! Entry-point resolution
//!
//! The only place an [`EntryPoint`] is constructed.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::discovery::ComponentId;
use crate::error::{BuildError, BuildResult};

/// Name of the aggregate library entry
pub const INDEX_ENTRY: &str = "index";

/// Identity of an entry point
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryId {
    Index,
    Component(ComponentId),
}

impl EntryId {
    pub fn as_str(&self) -> &str {
        match self {
            EntryId::Index => INDEX_ENTRY,
            EntryId::Component(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file designated as a unit of compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    id: EntryId,
    source_path: PathBuf,
}

impl EntryPoint {
    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn is_index(&self) -> bool {
        self.id == EntryId::Index
    }
}

/// Derives entry points from discovered components
pub struct EntryResolver {
    index_path: PathBuf,
    components_dir: PathBuf,
    index_source: String,
}

impl EntryResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            index_path: config.index_path(),
            components_dir: config.components_dir(),
            index_source: config.source.index_source.clone(),
        }
    }

    /// Index entry first, then one entry per component in input order
    pub fn resolve(&self, components: &[ComponentId]) -> BuildResult<Vec<EntryPoint>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut entries = Vec::with_capacity(components.len() + 1);

        entries.push(EntryPoint {
            id: EntryId::Index,
            source_path: self.index_path.clone(),
        });

        for id in components {
            if id.as_str() == INDEX_ENTRY {
                return Err(BuildError::config(format!(
                    "component directory '{}' collides with the aggregate entry name",
                    INDEX_ENTRY
                )));
            }
            if !seen.insert(id.as_str()) {
                return Err(BuildError::Internal(format!(
                    "component '{}' was discovered twice",
                    id
                )));
            }
            entries.push(EntryPoint {
                id: EntryId::Component(id.clone()),
                source_path: self
                    .components_dir
                    .join(id.as_str())
                    .join(&self.index_source),
            });
        }

        Ok(entries)
    }
}
