//! Pipeline assembly
//!
//! Every output format runs the same module stages in the same order:
//!
//! 1. alias rewrite
//! 2. transpile
//! 3. single-file component compile
//! 4. style routing
//! 5. external elision
//!
//! followed by packaging. Only the packaging step differs between formats.
//! All collaborators live in one [`Toolchain`] built once per build and
//! shared read-only by every pipeline.

mod stages;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::bundler::{Chunk, Minifier, ModuleType, WhitespaceMinifier};
use crate::config::Config;
use crate::discovery::ComponentId;
use crate::error::BuildResult;
use crate::format::{OutputFormat, Packager};
use crate::resolver::ModuleResolver;
use crate::sfc::{BlockCompiler, SfcCompiler};
use crate::style::{StyleBlock, StyleMode, StyleRouter};
use crate::transform::{Transformer, TypeStripper};
use crate::utils::{path_to_module_id, relative_path};

pub use stages::{AliasRewrite, ExternalElision, SfcCompile, StyleRoute, Transpile};

/// Position of a stage in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    AliasRewrite,
    Transpile,
    SfcCompile,
    StyleRoute,
    ExternalElision,
    Packaging,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::AliasRewrite => "alias-rewrite",
            StageKind::Transpile => "transpile",
            StageKind::SfcCompile => "sfc-compile",
            StageKind::StyleRoute => "style-route",
            StageKind::ExternalElision => "external-elision",
            StageKind::Packaging => "packaging",
        };
        f.write_str(name)
    }
}

/// A per-module transform step
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()>;
}

/// Where an import points after elision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// A file that gets bundled
    Local(PathBuf),
    /// Supplied by the host environment
    External(String),
}

/// One module travelling through the stages
#[derive(Debug, Clone)]
pub struct ModuleUnit {
    pub path: PathBuf,
    pub kind: ModuleType,
    pub code: String,
    pub owner: Option<ComponentId>,
    /// Style blocks found by compilation, drained by style routing
    pub styles: Vec<StyleBlock>,
    /// Imports in first-seen order
    pub imports: Vec<(String, Link)>,
    /// Routed CSS held back for the extracted stylesheet
    pub css: Option<String>,
    pub injects_style: bool,
}

impl ModuleUnit {
    pub fn new(path: PathBuf, source: String, owner: Option<ComponentId>) -> Self {
        Self {
            kind: ModuleType::from_path(&path),
            path,
            code: source,
            owner,
            styles: Vec::new(),
            imports: Vec::new(),
            css: None,
            injects_style: false,
        }
    }
}

/// Collaborators shared by every format of one build
pub struct Toolchain {
    root: PathBuf,
    components_dir: PathBuf,
    resolver: ModuleResolver,
    transformer: Transformer,
    sfc: Arc<dyn SfcCompiler>,
    styles: StyleRouter,
    style_mode: StyleMode,
    minifier: Arc<dyn Minifier>,
    externals: BTreeMap<String, String>,
    library_global: String,
}

impl Toolchain {
    /// Build the toolchain with the built-in collaborators
    pub fn new(config: &Config, style_mode: StyleMode) -> Self {
        Self {
            root: config.root.clone(),
            components_dir: config.components_dir(),
            resolver: ModuleResolver::new(config),
            transformer: Transformer::new(Arc::new(TypeStripper), config.define.clone()),
            sfc: Arc::new(BlockCompiler),
            styles: StyleRouter::new(config),
            style_mode,
            minifier: Arc::new(WhitespaceMinifier),
            externals: config.externals.clone(),
            library_global: config.global_name(),
        }
    }

    /// Replace the single-file component compiler
    pub fn with_sfc_compiler(mut self, compiler: Arc<dyn SfcCompiler>) -> Self {
        self.sfc = compiler;
        self
    }

    pub fn style_mode(&self) -> StyleMode {
        self.style_mode
    }

    pub fn library_global(&self) -> &str {
        &self.library_global
    }

    pub fn minifier(&self) -> Arc<dyn Minifier> {
        self.minifier.clone()
    }

    /// The configured external package `specifier` belongs to
    pub fn external_package(&self, specifier: &str) -> Option<&str> {
        self.externals
            .keys()
            .find(|package| {
                specifier == package.as_str()
                    || specifier
                        .strip_prefix(package.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(String::as_str)
    }

    /// Global variable an external specifier is exposed as
    pub fn global_for(&self, specifier: &str) -> Option<&str> {
        let package = self.external_package(specifier)?;
        self.externals.get(package).map(String::as_str)
    }

    /// Component a file belongs to, from its place under the components directory
    pub fn owner_of(&self, path: &Path) -> Option<ComponentId> {
        let rest = path.strip_prefix(&self.components_dir).ok()?;
        let mut components = rest.components();
        let first = components.next()?;
        // A file directly in the components directory belongs to nobody
        components.next()?;
        Some(ComponentId::new(first.as_os_str().to_string_lossy()))
    }

    /// Registry key of a file: its path relative to the project root
    pub fn module_key(&self, path: &Path) -> String {
        relative_path(&self.root, path).unwrap_or_else(|| path_to_module_id(path))
    }
}

/// The ordered stages for one output format
pub struct Pipeline {
    format: OutputFormat,
    toolchain: Arc<Toolchain>,
    stages: Vec<Box<dyn Stage>>,
    packager: Packager,
}

impl Pipeline {
    /// Assemble the pipeline for `format`. The module stages never depend on
    /// the format.
    pub fn assemble(format: OutputFormat, toolchain: &Arc<Toolchain>) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(AliasRewrite::new(toolchain.clone())),
            Box::new(Transpile::new(toolchain.clone())),
            Box::new(SfcCompile::new(toolchain.clone())),
            Box::new(StyleRoute::new(toolchain.clone())),
            Box::new(ExternalElision::new(toolchain.clone())),
        ];

        Self {
            format,
            toolchain: toolchain.clone(),
            stages,
            packager: Packager::new(format, toolchain.clone()),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Stage order, packaging included
    pub fn kinds(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .map(|stage| stage.kind())
            .chain(std::iter::once(StageKind::Packaging))
            .collect()
    }

    /// Run every module stage over `unit`; the first failure stops it
    pub fn compile(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        for stage in &self.stages {
            stage.apply(unit)?;
        }
        Ok(())
    }

    /// Wrap a bundled chunk in the format's module convention
    pub fn package(&self, chunk: &Chunk, output: &Path) -> BuildResult<String> {
        self.packager.package(chunk, output)
    }
}
