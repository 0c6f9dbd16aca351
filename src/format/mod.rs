//! Output formats
//!
//! Each format decides which entries it packages, where the files go and
//! which module convention wraps a bundled chunk.

mod declarations;
mod packaging;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::entry::{EntryId, EntryPoint};

pub use declarations::render_declarations;
pub use packaging::Packager;

/// A distribution packaging convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputFormat {
    /// One ES module per entry, imports preserved
    EsmSplit,
    /// The aggregate entry as one ES module
    EsmMerged,
    /// One self-registering bundle per component
    UmdPerComponent,
    /// One CommonJS module per entry
    CjsSplit,
    /// The aggregate entry as one minified global script
    IifeGlobal,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::EsmSplit,
        OutputFormat::EsmMerged,
        OutputFormat::UmdPerComponent,
        OutputFormat::CjsSplit,
        OutputFormat::IifeGlobal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::EsmSplit => "esm-split",
            OutputFormat::EsmMerged => "esm-merged",
            OutputFormat::UmdPerComponent => "umd-per-component",
            OutputFormat::CjsSplit => "cjs-split",
            OutputFormat::IifeGlobal => "iife-global",
        }
    }

    /// Whether the format packages `entry`
    pub fn selects(&self, entry: &EntryPoint) -> bool {
        match self {
            OutputFormat::EsmSplit | OutputFormat::CjsSplit => true,
            OutputFormat::EsmMerged | OutputFormat::IifeGlobal => entry.is_index(),
            OutputFormat::UmdPerComponent => !entry.is_index(),
        }
    }

    /// Split formats import sibling entries instead of inlining them
    pub fn is_split(&self) -> bool {
        matches!(self, OutputFormat::EsmSplit | OutputFormat::CjsSplit)
    }

    pub fn is_minified(&self) -> bool {
        matches!(self, OutputFormat::IifeGlobal)
    }

    /// Output file of `entry`, relative to the output directory
    pub fn output_path(&self, entry: &EntryId, library: &str) -> PathBuf {
        match self {
            OutputFormat::EsmSplit => PathBuf::from("esm").join(format!("{}.js", entry)),
            OutputFormat::EsmMerged => PathBuf::from(format!("{}.esm.js", library)),
            OutputFormat::UmdPerComponent => PathBuf::from("components").join(entry.as_str()).join("index.js"),
            OutputFormat::CjsSplit => PathBuf::from("cjs").join(format!("{}.js", entry)),
            OutputFormat::IifeGlobal => PathBuf::from(format!("{}-browser.min.js", library)),
        }
    }

    /// Specifier a split output uses to import a sibling entry
    pub fn sibling_specifier(entry: &EntryId) -> String {
        format!("./{}.js", entry)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats requested by the `--format` flag. `es` is the ES module family
/// plus the per-component bundles; anything unrecognised builds everything.
pub fn select_formats(flag: Option<&str>) -> BTreeSet<OutputFormat> {
    match flag.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
        Some("es") | Some("esm") => [
            OutputFormat::EsmSplit,
            OutputFormat::EsmMerged,
            OutputFormat::UmdPerComponent,
        ]
        .into_iter()
        .collect(),
        Some("cjs") => [OutputFormat::CjsSplit].into_iter().collect(),
        Some("iife") => [OutputFormat::IifeGlobal].into_iter().collect(),
        Some(other) => {
            if !other.is_empty() {
                warn!("Unknown format '{}', building all formats", other);
            }
            OutputFormat::ALL.into_iter().collect()
        }
        None => OutputFormat::ALL.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::ComponentId;

    #[test]
    fn test_select_formats() {
        assert_eq!(select_formats(Some("es")).len(), 3);
        assert!(select_formats(Some("es")).contains(&OutputFormat::UmdPerComponent));
        assert_eq!(
            select_formats(Some("cjs")).into_iter().collect::<Vec<_>>(),
            vec![OutputFormat::CjsSplit]
        );
        assert_eq!(
            select_formats(Some("iife")).into_iter().collect::<Vec<_>>(),
            vec![OutputFormat::IifeGlobal]
        );
        assert_eq!(select_formats(None).len(), 5);
        assert_eq!(select_formats(Some("amd")).len(), 5);
    }

    #[test]
    fn test_output_paths() {
        let button = EntryId::Component(ComponentId::new("button"));
        let lib = "library";

        assert_eq!(OutputFormat::EsmSplit.output_path(&EntryId::Index, lib), PathBuf::from("esm/index.js"));
        assert_eq!(OutputFormat::EsmSplit.output_path(&button, lib), PathBuf::from("esm/button.js"));
        assert_eq!(OutputFormat::EsmMerged.output_path(&EntryId::Index, lib), PathBuf::from("library.esm.js"));
        assert_eq!(
            OutputFormat::UmdPerComponent.output_path(&button, lib),
            PathBuf::from("components/button/index.js")
        );
        assert_eq!(OutputFormat::CjsSplit.output_path(&button, lib), PathBuf::from("cjs/button.js"));
        assert_eq!(
            OutputFormat::IifeGlobal.output_path(&EntryId::Index, lib),
            PathBuf::from("library-browser.min.js")
        );
        assert_eq!(OutputFormat::sibling_specifier(&button), "./button.js");
    }
}
