//! Vendor prefixing through lightningcss

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::error::{BuildError, BuildResult};

/// Encode a browser version the way lightningcss expects it
const fn version(major: u32) -> u32 {
    major << 16
}

/// Adds vendor prefixes required by the configured browser targets
#[derive(Debug, Clone)]
pub struct Prefixer {
    browsers: Browsers,
}

impl Default for Prefixer {
    fn default() -> Self {
        Self {
            browsers: Browsers {
                chrome: Some(version(49)),
                edge: Some(version(15)),
                firefox: Some(version(45)),
                safari: Some(version(9)),
                ios_saf: Some(version(9)),
                android: Some(version(5)),
                ..Browsers::default()
            },
        }
    }
}

impl Prefixer {
    /// Prefix `css`; parse failures become diagnostics for `path`
    pub fn prefix(&self, css: &str, path: &Path) -> BuildResult<String> {
        let options = ParserOptions {
            filename: path.display().to_string(),
            ..ParserOptions::default()
        };

        let mut sheet = StyleSheet::parse(css, options)
            .map_err(|e| BuildError::diagnostic("css", path, e.to_string()))?;

        sheet
            .minify(MinifyOptions {
                targets: Targets::from(self.browsers.clone()),
                ..MinifyOptions::default()
            })
            .map_err(|e| BuildError::diagnostic("css", path, e.to_string()))?;

        let result = sheet
            .to_css(PrinterOptions {
                targets: Targets::from(self.browsers.clone()),
                ..PrinterOptions::default()
            })
            .map_err(|e| BuildError::diagnostic("css", path, e.to_string()))?;

        Ok(result.code)
    }
}
