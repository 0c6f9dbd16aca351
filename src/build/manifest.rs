//! Build manifest written next to the artifacts

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Artifact, BuildReport};
use crate::error::{BuildError, BuildResult};
use crate::utils::path_to_module_id;

/// Artifacts per format; no timestamps so repeated builds match byte for byte
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub library: String,
    pub style_mode: String,
    pub formats: BTreeMap<String, Vec<ManifestFile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<ManifestFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declarations: Option<ManifestFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ManifestFile {
    pub path: String,
    pub size: usize,
    pub hash: String,
}

impl From<&Artifact> for ManifestFile {
    fn from(artifact: &Artifact) -> Self {
        Self {
            path: path_to_module_id(&artifact.path),
            size: artifact.size,
            hash: artifact.hash.clone(),
        }
    }
}

impl Manifest {
    pub fn from_report(library: &str, report: &BuildReport) -> Self {
        let mut formats: BTreeMap<String, Vec<ManifestFile>> = BTreeMap::new();
        let mut failed = Vec::new();

        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(output) => formats
                    .entry(outcome.format.to_string())
                    .or_default()
                    .extend(output.artifacts.iter().map(ManifestFile::from)),
                Err(_) => failed.push(outcome.label.clone()),
            }
        }
        for files in formats.values_mut() {
            files.sort();
        }

        Self {
            library: library.to_string(),
            style_mode: report.style_mode.to_string(),
            formats,
            stylesheet: report.stylesheet.as_ref().map(ManifestFile::from),
            declarations: report.declarations.as_ref().map(ManifestFile::from),
            failed,
        }
    }

    pub fn to_json(&self) -> BuildResult<String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Internal(format!("failed to serialize manifest: {}", e)))?;
        Ok(format!("{}\n", json))
    }
}
