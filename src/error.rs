//! Error taxonomy for a library build
//!
//! Configuration errors stop the whole build before any format runs.
//! Everything else is fatal only to the work unit that hit it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while planning or running a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or unreadable base directory, malformed configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// An import specifier could not be resolved
    #[error("could not resolve '{specifier}' imported from {}", importer.display())]
    Resolution {
        specifier: String,
        importer: PathBuf,
    },

    /// A diagnostic reported by an external collaborator (transpiler, SFC compiler, CSS tooling)
    #[error("[{stage}] {}: {message}", path.display())]
    Diagnostic {
        stage: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Filesystem failure while reading inputs or writing artifacts
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Broken internal invariant
    #[error("internal error: {0}")]
    Internal(String),
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn diagnostic(stage: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Diagnostic {
            stage,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error must abort the build before any format runs
    pub fn is_fatal_to_build(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Internal(_))
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        assert!(BuildError::config("bad").is_fatal_to_build());
        let err = BuildError::Resolution {
            specifier: "./missing".to_string(),
            importer: PathBuf::from("src/index.ts"),
        };
        assert!(!err.is_fatal_to_build());
        assert_eq!(
            err.to_string(),
            "could not resolve './missing' imported from src/index.ts"
        );
    }
}
