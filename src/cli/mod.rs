//! Command-line interface for libkit
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Build every requested output format once
//! - `watch`: Rebuild on source changes
//! - `init`: Component library scaffolding

mod build;
mod init;
mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{print_report, BuildCommand};
pub use init::InitCommand;
pub use watch::WatchCommand;

/// libkit - multi-format build orchestrator for UI component libraries
#[derive(Parser, Debug)]
#[command(name = "libkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to libkit.toml config file
    #[arg(short, long, global = true, default_value = "libkit.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the library in every requested format
    Build(BuildCommand),

    /// Build, then rebuild whenever a source file changes
    Watch(WatchCommand),

    /// Scaffold a new component library
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Watch(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the libkit banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "libkit".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from(["libkit", "build", "--format", "es", "--extract-css", "-c", "lib.toml"]).unwrap();
        assert_eq!(cli.config, "lib.toml");
        match cli.command {
            Commands::Build(cmd) => {
                assert_eq!(cmd.format.as_deref(), Some("es"));
                assert_eq!(cmd.extract_css, Some(true));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
