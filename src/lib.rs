//! libkit library
//!
//! Builds a Vue component library into several distribution formats from a
//! single immutable build plan.

pub mod build;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod entry;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod resolver;
pub mod sfc;
pub mod style;
pub mod transform;
pub mod utils;

pub use build::{BuildPlan, BuildReport, Orchestrator};
pub use cli::Cli;
pub use config::Config;
pub use error::{BuildError, BuildResult};
pub use format::OutputFormat;
pub use style::StyleMode;
