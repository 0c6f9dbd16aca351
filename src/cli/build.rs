//! Build command implementation

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::build::{BuildPlan, BuildReport, Orchestrator};
use crate::config::Config;
use crate::format::{select_formats, OutputFormat};
use crate::style::StyleMode;
use crate::utils::{format_duration, format_size, path_to_module_id};

/// Build the library in every requested format
#[derive(Args, Debug, Clone)]
pub struct BuildCommand {
    /// Format subset to build (es, cjs, iife); omitted builds all formats
    #[arg(short, long)]
    pub format: Option<String>,

    /// Extract all styles into a single bundle.css
    #[arg(
        long,
        env = "SEP_CSS",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = parse_truthy
    )]
    pub extract_css: Option<bool>,

    /// Output directory, overrides `output.dir`
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path).context("Failed to load configuration")?;

        eprintln!("{} Building {}...", "→".blue(), config.library.name.cyan());

        let report = self.run(config).await?;
        print_report(&report);

        if !report.is_success() {
            let failed: Vec<&str> = report.failures().map(|o| o.label.as_str()).collect();
            bail!("{} work unit(s) failed: {}", failed.len(), failed.join(", "));
        }
        Ok(())
    }

    /// Plan and run one build
    pub async fn run(&self, config: Config) -> Result<BuildReport> {
        let formats = self.formats();
        let style_mode = self.style_mode(&config);
        let out_dir = self
            .outdir
            .clone()
            .map(|dir| config.root.join(dir))
            .unwrap_or_else(|| config.output_dir());

        let plan = BuildPlan::create(&config, formats, style_mode).context("Failed to plan the build")?;
        let orchestrator = Orchestrator::new(config, plan, out_dir);
        let report = orchestrator.run().await.context("Build aborted")?;
        Ok(report)
    }

    fn formats(&self) -> BTreeSet<OutputFormat> {
        select_formats(self.format.as_deref())
    }

    /// The flag or `SEP_CSS` wins over `styles.extract`
    fn style_mode(&self, config: &Config) -> StyleMode {
        StyleMode::from_flag(self.extract_css.unwrap_or(config.styles.extract))
    }
}

/// Boolean-like flag value: empty, `0`, `false`, `no` and `off` are false
fn parse_truthy(value: &str) -> Result<bool, String> {
    let value = value.trim().to_ascii_lowercase();
    Ok(!matches!(value.as_str(), "" | "0" | "false" | "no" | "off"))
}

/// Per-unit outcome lines and the artifact list
pub fn print_report(report: &BuildReport) {
    eprintln!();
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(output) => {
                eprintln!("{} {}", "✓".green().bold(), outcome.label.bold());
                for artifact in &output.artifacts {
                    print_artifact(&artifact.path, artifact.size);
                }
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), outcome.label.bold());
                eprintln!("    {}", e.to_string().red());
            }
        }
    }

    let extras = [&report.stylesheet, &report.declarations, &report.manifest];
    if extras.iter().any(|a| a.is_some()) {
        eprintln!("{} {}", "✓".green().bold(), "extras".bold());
        for artifact in extras.into_iter().flatten() {
            print_artifact(&artifact.path, artifact.size);
        }
    }

    let failed = report.failures().count();
    let summary = format!(
        "{} of {} unit(s) built in {}",
        report.outcomes.len() - failed,
        report.outcomes.len(),
        format_duration(report.duration)
    );
    if failed == 0 {
        eprintln!("\n{} {}\n", "✓".green().bold(), summary);
    } else {
        eprintln!("\n{} {}\n", "✗".red().bold(), summary);
    }
}

fn print_artifact(path: &std::path::Path, size: usize) {
    eprintln!(
        "  {} {} {}",
        "•".dimmed(),
        path_to_module_id(path).cyan(),
        format_size(size).dimmed()
    );
}
