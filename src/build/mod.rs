//! Build orchestration
//!
//! A [`BuildPlan`] is created once per invocation and never changes. The
//! [`Orchestrator`] expands it into work units, runs them in parallel on the
//! blocking pool and collects one outcome per unit. A unit that fails
//! writes nothing; the others carry on.

mod manifest;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bundler::Bundler;
use crate::config::Config;
use crate::discovery::{ComponentId, Discovery};
use crate::entry::{EntryId, EntryPoint, EntryResolver};
use crate::error::{BuildError, BuildResult};
use crate::format::{render_declarations, OutputFormat};
use crate::pipeline::{Pipeline, Toolchain};
use crate::style::StyleMode;
use crate::utils::{hash_content, normalize_path};

pub use manifest::{Manifest, ManifestFile};

/// Name of the extracted stylesheet
pub const STYLESHEET: &str = "bundle.css";

/// Everything one build needs to know, fixed before any format runs
#[derive(Debug, Clone)]
pub struct BuildPlan {
    formats: BTreeSet<OutputFormat>,
    entries: Vec<EntryPoint>,
    components: Vec<ComponentId>,
    style_mode: StyleMode,
}

impl BuildPlan {
    /// Discover components and derive entry points
    pub fn create(config: &Config, formats: BTreeSet<OutputFormat>, style_mode: StyleMode) -> BuildResult<Self> {
        let components = Discovery::new(config)?.run()?;
        let entries = EntryResolver::new(config).resolve(&components)?;

        info!(
            "Planned {} entries ({} components), style mode {}",
            entries.len(),
            components.len(),
            style_mode
        );

        Ok(Self {
            formats,
            entries,
            components,
            style_mode,
        })
    }

    pub fn formats(&self) -> &BTreeSet<OutputFormat> {
        &self.formats
    }

    pub fn entries(&self) -> &[EntryPoint] {
        &self.entries
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub fn style_mode(&self) -> StyleMode {
        self.style_mode
    }

    /// Work units in format order. Per-component bundles get one unit per
    /// component; every other format is a single unit.
    pub fn units(&self) -> Vec<WorkUnit> {
        let mut units = Vec::new();

        for &format in &self.formats {
            let selected: Vec<EntryPoint> = self
                .entries
                .iter()
                .filter(|entry| format.selects(entry))
                .cloned()
                .collect();
            if selected.is_empty() {
                continue;
            }

            if format == OutputFormat::UmdPerComponent {
                for entry in selected {
                    units.push(WorkUnit {
                        format,
                        label: format!("{}:{}", format, entry.id()),
                        entries: vec![entry],
                    });
                }
            } else {
                units.push(WorkUnit {
                    format,
                    label: format.to_string(),
                    entries: selected,
                });
            }
        }

        units
    }
}

/// The abort granularity of a build
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub format: OutputFormat,
    pub label: String,
    pub entries: Vec<EntryPoint>,
}

/// A written file, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: usize,
    /// Truncated SHA-256 of the contents, hex encoded
    pub hash: String,
}

impl Artifact {
    fn new(path: PathBuf, contents: &str) -> Self {
        Self {
            path,
            size: contents.len(),
            hash: hash_content(contents.as_bytes()),
        }
    }
}

/// What a successful unit produced
#[derive(Debug, Clone, Default)]
pub struct UnitOutput {
    pub artifacts: Vec<Artifact>,
    /// Routed CSS per entry, `(module key, css)` in evaluation order
    pub css: Vec<(EntryId, Vec<(String, String)>)>,
}

#[derive(Debug)]
pub struct UnitOutcome {
    pub format: OutputFormat,
    pub label: String,
    pub result: BuildResult<UnitOutput>,
}

/// Result of a whole build
#[derive(Debug)]
pub struct BuildReport {
    /// One outcome per unit, in plan order
    pub outcomes: Vec<UnitOutcome>,
    pub style_mode: StyleMode,
    pub stylesheet: Option<Artifact>,
    pub declarations: Option<Artifact>,
    pub manifest: Option<Artifact>,
    pub duration: Duration,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Formats whose every unit succeeded
    pub fn succeeded_formats(&self) -> Vec<OutputFormat> {
        let failed: HashSet<OutputFormat> = self.failures().map(|o| o.format).collect();
        let mut formats: Vec<OutputFormat> = self
            .outcomes
            .iter()
            .map(|o| o.format)
            .filter(|f| !failed.contains(f))
            .collect();
        formats.dedup();
        formats
    }

    /// Every file written by the build
    pub fn artifacts(&self) -> Vec<&Artifact> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .flat_map(|output| output.artifacts.iter())
            .chain(self.stylesheet.iter())
            .chain(self.declarations.iter())
            .chain(self.manifest.iter())
            .collect()
    }
}

/// Shared, read-only state handed to every unit
struct UnitContext {
    plan: Arc<BuildPlan>,
    toolchain: Arc<Toolchain>,
    library: String,
    out_dir: PathBuf,
}

/// Runs a build plan
pub struct Orchestrator {
    config: Arc<Config>,
    plan: Arc<BuildPlan>,
    toolchain: Arc<Toolchain>,
    out_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(config: Config, plan: BuildPlan, out_dir: PathBuf) -> Self {
        let toolchain = Arc::new(Toolchain::new(&config, plan.style_mode()));
        Self {
            config: Arc::new(config),
            plan: Arc::new(plan),
            toolchain,
            out_dir,
        }
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Run every unit and write the build-level artifacts
    pub async fn run(&self) -> BuildResult<BuildReport> {
        let start = Instant::now();
        fs::create_dir_all(&self.out_dir).map_err(|e| BuildError::io(&self.out_dir, e))?;

        let units = self.plan.units();
        info!("Running {} work unit(s)", units.len());

        let context = Arc::new(UnitContext {
            plan: self.plan.clone(),
            toolchain: self.toolchain.clone(),
            library: self.config.library.name.clone(),
            out_dir: self.out_dir.clone(),
        });

        let mut set = JoinSet::new();
        for (index, unit) in units.into_iter().enumerate() {
            let context = context.clone();
            set.spawn_blocking(move || {
                let result = run_unit(&context, &unit);
                match &result {
                    Ok(output) => debug!("{} wrote {} file(s)", unit.label, output.artifacts.len()),
                    Err(e) => warn!("{} failed: {}", unit.label, e),
                }
                (
                    index,
                    UnitOutcome {
                        format: unit.format,
                        label: unit.label,
                        result,
                    },
                )
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| BuildError::Internal(format!("work unit panicked: {}", e)))?;
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|(index, _)| *index);
        let outcomes: Vec<UnitOutcome> = outcomes.into_iter().map(|(_, outcome)| outcome).collect();

        let any_success = outcomes.iter().any(|o| o.result.is_ok());
        let stylesheet = self.write_stylesheet(&outcomes, any_success)?;
        let declarations = if self.config.output.declarations && any_success {
            let text = render_declarations(&self.config.library.name, self.plan.components());
            Some(self.write_artifact(Path::new("types/index.d.ts"), &text)?)
        } else {
            None
        };

        let mut report = BuildReport {
            outcomes,
            style_mode: self.plan.style_mode(),
            stylesheet,
            declarations,
            manifest: None,
            duration: Duration::default(),
        };

        if self.config.output.manifest {
            let json = Manifest::from_report(&self.config.library.name, &report).to_json()?;
            report.manifest = Some(self.write_artifact(Path::new("manifest.json"), &json)?);
        }

        report.duration = start.elapsed();
        Ok(report)
    }

    /// In extracted mode concatenate every entry's CSS in plan order; in
    /// inline mode remove a stylesheet left by an earlier build
    fn write_stylesheet(&self, outcomes: &[UnitOutcome], any_success: bool) -> BuildResult<Option<Artifact>> {
        match self.plan.style_mode() {
            StyleMode::Inline => {
                let path = self.out_dir.join(STYLESHEET);
                match fs::remove_file(&path) {
                    Ok(()) => debug!("Removed stale {}", path.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(BuildError::io(path, e)),
                }
                Ok(None)
            }
            StyleMode::Extracted if any_success => {
                let css = assemble_stylesheet(self.plan.entries(), outcomes);
                Ok(Some(self.write_artifact(Path::new(STYLESHEET), &css)?))
            }
            StyleMode::Extracted => Ok(None),
        }
    }

    fn write_artifact(&self, relative: &Path, contents: &str) -> BuildResult<Artifact> {
        write_file(&self.out_dir.join(relative), contents)?;
        Ok(Artifact::new(relative.to_path_buf(), contents))
    }
}

/// Bundle and package every entry of the unit, then write the files
fn run_unit(context: &UnitContext, unit: &WorkUnit) -> BuildResult<UnitOutput> {
    let pipeline = Pipeline::assemble(unit.format, &context.toolchain);

    let siblings: HashMap<PathBuf, String> = if unit.format.is_split() {
        context
            .plan
            .entries()
            .iter()
            .map(|entry| {
                (
                    normalize_path(entry.source_path()),
                    OutputFormat::sibling_specifier(entry.id()),
                )
            })
            .collect()
    } else {
        HashMap::new()
    };

    let mut files = Vec::with_capacity(unit.entries.len());
    let mut css = Vec::with_capacity(unit.entries.len());

    for entry in &unit.entries {
        let chunk = Bundler::new(&pipeline, &siblings, entry).bundle()?;
        let relative = unit.format.output_path(entry.id(), &context.library);
        let code = pipeline.package(&chunk, &relative)?;
        css.push((entry.id().clone(), chunk.css));
        files.push((relative, code));
    }

    let mut artifacts = Vec::with_capacity(files.len());
    for (relative, code) in files {
        write_file(&context.out_dir.join(&relative), &code)?;
        artifacts.push(Artifact::new(relative, &code));
    }

    Ok(UnitOutput { artifacts, css })
}

/// Entries in plan order, each taken from the first successful unit that
/// packaged it; a module's CSS appears once
fn assemble_stylesheet(entries: &[EntryPoint], outcomes: &[UnitOutcome]) -> String {
    let mut seen = HashSet::new();
    let mut out = String::new();

    for entry in entries {
        let sheets = outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .find_map(|output| output.css.iter().find(|(id, _)| id == entry.id()));

        let Some((_, sheets)) = sheets else {
            continue;
        };
        for (key, text) in sheets {
            if seen.insert(key.as_str()) {
                out.push_str(text.trim_end());
                out.push('\n');
            }
        }
    }

    out
}

fn write_file(path: &Path, contents: &str) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| BuildError::io(path, e))
}
