//! Watch command implementation

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::build::{print_report, BuildCommand};
use crate::config::Config;
use crate::error::BuildError;

/// Extensions that trigger a rebuild
const WATCHED_EXTENSIONS: [&str; 7] = ["ts", "js", "jsx", "tsx", "vue", "css", "json"];

/// Build once, then rebuild whenever a source file changes
#[derive(Args, Debug)]
pub struct WatchCommand {
    #[command(flatten)]
    pub build: BuildCommand,

    /// Debounce interval in milliseconds
    #[arg(long, default_value = "200")]
    pub debounce: u64,
}

impl WatchCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let config = Config::load(config_path).context("Failed to load configuration")?;
        let base_dir = config.base_dir();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(Duration::from_millis(self.debounce), move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })?;
        debouncer
            .watcher()
            .watch(&base_dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", base_dir.display()))?;

        eprintln!(
            "{} Watching {} ({} to stop)\n",
            "→".blue(),
            base_dir.display().to_string().cyan(),
            "Ctrl+C".yellow()
        );

        self.rebuild(config_path).await;

        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let changed: Vec<_> = events.iter().filter(|e| is_watched(&e.path)).collect();
                    if changed.is_empty() {
                        continue;
                    }
                    for event in &changed {
                        debug!("Changed: {}", event.path.display());
                    }
                    info!("{} file(s) changed, rebuilding", changed.len());
                    self.rebuild(config_path).await;
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        }

        Ok(())
    }

    /// Reload the configuration and build; failures are reported, not returned
    async fn rebuild(&self, config_path: &str) {
        let config = match Config::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };

        match self.build.run(config).await {
            Ok(report) => print_report(&report),
            Err(e) => match e.downcast_ref::<BuildError>() {
                Some(build_error) if build_error.is_fatal_to_build() => {
                    error!("Build aborted: {}", build_error)
                }
                _ => error!("Build failed: {:#}", e),
            },
        }
    }
}

fn is_watched(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WATCHED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_watched() {
        assert!(is_watched(Path::new("src/components/button/Button.vue")));
        assert!(is_watched(Path::new("src/assets/styles/css/theme.css")));
        assert!(!is_watched(Path::new("dist/library-browser.min.js.map")));
        assert!(!is_watched(Path::new("README")));
    }
}
