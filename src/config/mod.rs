//! Configuration handling for libkit
//!
//! Parses and manages libkit.toml configuration files. The file is optional:
//! without it the defaults describe a conventional Vue component library.

mod schema;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BuildError, BuildResult};

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Library metadata
    #[serde(default)]
    pub library: LibraryConfig,

    /// Source layout
    #[serde(default)]
    pub source: SourceConfig,

    /// Stylesheet handling
    #[serde(default)]
    pub styles: StylesConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// External packages and the global variable each one is exposed as
    #[serde(default = "default_externals")]
    pub externals: BTreeMap<String, String>,

    /// Compile-time replacements
    #[serde(default = "default_defines")]
    pub define: BTreeMap<String, String>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path, falling back to defaults when it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> BuildResult<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| BuildError::io(".", e))?
                .join(path)
        };

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if !canonical_path.exists() {
            debug!("No config at {}, using defaults", canonical_path.display());
            let config = Self::default_config(root);
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(&canonical_path)
            .map_err(|e| BuildError::io(&canonical_path, e))?;

        let mut config = Self::parse(&content)?;
        config.root = root;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration text; the root is left empty
    pub fn parse(content: &str) -> BuildResult<Self> {
        toml::from_str(content)
            .map_err(|e| BuildError::config(format!("failed to parse libkit.toml: {}", e)))
    }

    /// Create a default configuration rooted at `root`
    pub fn default_config(root: impl Into<PathBuf>) -> Self {
        Self {
            library: LibraryConfig::default(),
            source: SourceConfig::default(),
            styles: StylesConfig::default(),
            output: OutputConfig::default(),
            externals: default_externals(),
            define: default_defines(),
            root: root.into(),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> BuildResult<()> {
        if self.source.alias.is_empty() {
            return Err(BuildError::config("source.alias must not be empty"));
        }
        if self.styles.alias.is_empty() {
            return Err(BuildError::config("styles.alias must not be empty"));
        }
        if self.source.index_source.is_empty() {
            return Err(BuildError::config("source.index_source must not be empty"));
        }
        if self.library.name.trim().is_empty() {
            return Err(BuildError::config("library.name must not be empty"));
        }
        for (package, global) in &self.externals {
            if global.trim().is_empty() {
                return Err(BuildError::config(format!(
                    "external '{}' needs a global variable name",
                    package
                )));
            }
        }
        Ok(())
    }

    /// Absolute source root
    pub fn base_dir(&self) -> PathBuf {
        self.root.join(&self.source.base_dir)
    }

    /// Absolute components directory
    pub fn components_dir(&self) -> PathBuf {
        self.base_dir().join(&self.source.components_dir)
    }

    /// Absolute path of the aggregate library entry
    pub fn index_path(&self) -> PathBuf {
        self.base_dir().join(&self.source.index_source)
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Global variable of the browser bundle
    pub fn global_name(&self) -> String {
        self.library
            .global
            .clone()
            .unwrap_or_else(|| crate::utils::js_identifier(&self.library.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_layout() {
        let config = Config::default_config("/project");
        assert_eq!(config.index_path(), PathBuf::from("/project/src/index.ts"));
        assert_eq!(config.components_dir(), PathBuf::from("/project/src/components"));
        assert_eq!(config.externals.get("vue").map(String::as_str), Some("Vue"));
        assert_eq!(config.styles.scoped_pattern, "[local]___[hash:base64:5]");
        assert_eq!(config.global_name(), "library");
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::parse(
            r#"
[library]
name = "vuelib"

[styles]
extract = true

[externals]
vue = "Vue"
lodash = "_"
"#,
        )
        .unwrap();

        assert_eq!(config.library.name, "vuelib");
        assert!(config.styles.extract);
        assert_eq!(config.styles.alias, "@css");
        assert_eq!(config.externals.len(), 2);
        assert!(config.define.contains_key("process.env.NODE_ENV"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let err = Config::parse("[library\nname = ").unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn test_missing_global_rejected() {
        let mut config = Config::default_config("/project");
        config.externals.insert("lodash".to_string(), " ".to_string());
        assert!(config.validate().is_err());
    }
}
