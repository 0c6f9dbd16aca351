//! Configuration schema definitions

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Library metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library name, used for the merged and browser bundle file names
    #[serde(default = "default_library_name")]
    pub name: String,

    /// Global variable assigned by the browser bundle
    #[serde(default)]
    pub global: Option<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_library_name(),
            global: None,
        }
    }
}

fn default_library_name() -> String {
    "library".to_string()
}

/// Where component sources live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source root, relative to the project root
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Component directory, relative to the source root
    #[serde(default = "default_components_dir")]
    pub components_dir: String,

    /// Entry file name of the library and of every component
    #[serde(default = "default_index_source")]
    pub index_source: String,

    /// Import alias resolving to the source root
    #[serde(default = "default_alias")]
    pub alias: String,

    /// Extensions tried when an import omits one
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns of component directory names to skip
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            components_dir: default_components_dir(),
            index_source: default_index_source(),
            alias: default_alias(),
            extensions: default_extensions(),
            exclude: Vec::new(),
        }
    }
}

fn default_base_dir() -> String {
    "src".to_string()
}

fn default_components_dir() -> String {
    "components".to_string()
}

fn default_index_source() -> String {
    "index.ts".to_string()
}

fn default_alias() -> String {
    "@".to_string()
}

fn default_extensions() -> Vec<String> {
    [".ts", ".js", ".jsx", ".vue"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Stylesheet handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// `@import` prefix resolving under `root`
    #[serde(default = "default_style_alias")]
    pub alias: String,

    /// Style asset root, relative to the project root
    #[serde(default = "default_style_root")]
    pub root: String,

    /// Root for `~package/...` imports, relative to the project root
    #[serde(default = "default_external_root")]
    pub external_root: String,

    /// Extract all styles into a single stylesheet
    #[serde(default)]
    pub extract: bool,

    /// Generated class name pattern for CSS modules
    #[serde(default = "default_scoped_pattern")]
    pub scoped_pattern: String,

    /// Add vendor prefixes to global styles
    #[serde(default = "default_true")]
    pub prefix: bool,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            alias: default_style_alias(),
            root: default_style_root(),
            external_root: default_external_root(),
            extract: false,
            scoped_pattern: default_scoped_pattern(),
            prefix: true,
        }
    }
}

fn default_style_alias() -> String {
    "@css".to_string()
}

fn default_style_root() -> String {
    "src/assets/styles/css".to_string()
}

fn default_external_root() -> String {
    "node_modules".to_string()
}

fn default_scoped_pattern() -> String {
    "[local]___[hash:base64:5]".to_string()
}

fn default_true() -> bool {
    true
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Generate artifact manifest
    #[serde(default = "default_true")]
    pub manifest: bool,

    /// Generate `types/index.d.ts`
    #[serde(default = "default_true")]
    pub declarations: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            manifest: true,
            declarations: true,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

pub(crate) fn default_externals() -> BTreeMap<String, String> {
    let mut externals = BTreeMap::new();
    externals.insert("vue".to_string(), "Vue".to_string());
    externals
}

pub(crate) fn default_defines() -> BTreeMap<String, String> {
    let mut defines = BTreeMap::new();
    defines.insert("process.env.NODE_ENV".to_string(), "\"production\"".to_string());
    defines.insert("__VUE_OPTIONS_API__".to_string(), "true".to_string());
    defines.insert("__VUE_PROD_DEVTOOLS__".to_string(), "false".to_string());
    defines
}
