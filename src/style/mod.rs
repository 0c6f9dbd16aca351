//! Style routing
//!
//! Every stylesheet block is either scoped (a CSS module: class names are
//! renamed and the mapping is handed back to the component) or global
//! (`@import`s are expanded, then vendor prefixes are added). Whether the
//! routed CSS is injected by each module or extracted into one stylesheet is
//! decided once per build by [`StyleMode`].

mod modules;
mod prefix;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::Config;
use crate::discovery::ComponentId;
use crate::error::{BuildError, BuildResult};
use crate::utils::normalize_path;

pub use modules::ScopedNamer;
pub use prefix::Prefixer;

static IMPORT_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"@import\s+(?:url\(\s*)?["']?(?P<spec>[^"'()\s;]+)["']?\s*\)?\s*(?P<media>[^;]*);"#,
    )
    .unwrap()
});

/// Where routed CSS ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StyleMode {
    /// Each module injects its own styles when imported
    #[default]
    Inline,
    /// All styles of a build go to one external stylesheet
    Extracted,
}

impl StyleMode {
    pub fn from_flag(extract: bool) -> Self {
        if extract {
            StyleMode::Extracted
        } else {
            StyleMode::Inline
        }
    }
}

impl fmt::Display for StyleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleMode::Inline => f.write_str("inline"),
            StyleMode::Extracted => f.write_str("extracted"),
        }
    }
}

/// One stylesheet block, alive for a single module compilation
#[derive(Debug, Clone)]
pub struct StyleBlock {
    pub scoped: bool,
    pub raw_text: String,
    pub source_component: Option<ComponentId>,
    /// File the block was written in
    pub origin: PathBuf,
    /// Name the class mapping is exposed under, for scoped blocks
    pub binding: Option<String>,
}

/// CSS after routing
#[derive(Debug, Clone, Default)]
pub struct RoutedStyle {
    pub css: String,
    /// Original class name to generated class name, empty for global blocks
    pub class_map: BTreeMap<String, String>,
}

/// Routes style blocks; shared read-only by every format
#[derive(Debug, Clone)]
pub struct StyleRouter {
    alias: String,
    styles_root: PathBuf,
    external_root: PathBuf,
    namer: ScopedNamer,
    prefixer: Option<Prefixer>,
}

impl StyleRouter {
    pub fn new(config: &Config) -> Self {
        Self {
            alias: config.styles.alias.clone(),
            styles_root: config.root.join(&config.styles.root),
            external_root: config.root.join(&config.styles.external_root),
            namer: ScopedNamer::new(config.styles.scoped_pattern.clone()),
            prefixer: config.styles.prefix.then(Prefixer::default),
        }
    }

    /// Route one block
    pub fn route(&self, block: &StyleBlock) -> BuildResult<RoutedStyle> {
        if block.scoped {
            let (css, class_map) = self.namer.scope(&block.raw_text);
            debug!(
                "Scoped {} class name(s) in {}",
                class_map.len(),
                block.origin.display()
            );
            return Ok(RoutedStyle { css, class_map });
        }

        let base_dir = block.origin.parent().unwrap_or(Path::new("."));
        let mut seen = HashSet::new();
        seen.insert(normalize_path(&block.origin));
        let expanded = self.expand_imports(&block.raw_text, base_dir, &block.origin, &mut seen)?;

        let css = match &self.prefixer {
            Some(prefixer) => prefixer.prefix(&expanded, &block.origin)?,
            None => expanded,
        };

        Ok(RoutedStyle {
            css,
            class_map: BTreeMap::new(),
        })
    }

    /// Resolve an `@import` specifier: style alias, then `~package`, then relative
    pub fn resolve_import(&self, specifier: &str, from_dir: &Path) -> PathBuf {
        let aliased = specifier
            .strip_prefix(self.alias.as_str())
            .filter(|rest| rest.is_empty() || rest.starts_with('/'));
        if let Some(rest) = aliased {
            return normalize_path(&self.styles_root.join(rest.trim_start_matches('/')));
        }
        if let Some(rest) = specifier.strip_prefix('~') {
            return normalize_path(&self.external_root.join(rest));
        }
        normalize_path(&from_dir.join(specifier))
    }

    /// Inline `@import` rules recursively; each file is inlined at most once
    fn expand_imports(
        &self,
        css: &str,
        base_dir: &Path,
        importer: &Path,
        seen: &mut HashSet<PathBuf>,
    ) -> BuildResult<String> {
        let mut out = String::with_capacity(css.len());
        let mut last = 0;

        for cap in IMPORT_RULE.captures_iter(css) {
            let whole = cap.get(0).map_or(0..0, |m| m.range());
            let spec = &cap["spec"];

            // Remote stylesheets stay as they are
            if spec.starts_with("http:") || spec.starts_with("https:") || spec.starts_with("//") {
                continue;
            }

            out.push_str(&css[last..whole.start]);
            last = whole.end;

            let path = self.resolve_import(spec, base_dir);
            if !seen.insert(path.clone()) {
                debug!("Skipping repeated import of {}", path.display());
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|_| BuildError::Resolution {
                specifier: spec.to_string(),
                importer: importer.to_path_buf(),
            })?;
            let nested_dir = path.parent().unwrap_or(Path::new("."));
            let expanded = self.expand_imports(&content, nested_dir, &path, seen)?;

            let media = cap["media"].trim();
            if media.is_empty() {
                out.push_str(expanded.trim_end());
            } else {
                out.push_str(&format!("@media {} {{\n{}\n}}", media, expanded.trim_end()));
            }
        }

        out.push_str(&css[last..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(root: &Path, prefix: bool) -> StyleRouter {
        let mut config = Config::default_config(root);
        config.styles.prefix = prefix;
        StyleRouter::new(&config)
    }

    fn global(text: &str, origin: PathBuf) -> StyleBlock {
        StyleBlock {
            scoped: false,
            raw_text: text.to_string(),
            source_component: None,
            origin,
            binding: None,
        }
    }

    #[test]
    fn test_import_resolution_rules() {
        let router = router(Path::new("/lib"), false);
        let from = Path::new("/lib/src/components/button");

        assert_eq!(
            router.resolve_import("@css/foo.css", from),
            PathBuf::from("/lib/src/assets/styles/css/foo.css")
        );
        assert_eq!(
            router.resolve_import("~pkg/x.css", from),
            PathBuf::from("/lib/node_modules/pkg/x.css")
        );
        assert_eq!(
            router.resolve_import("./x.css", from),
            PathBuf::from("/lib/src/components/button/x.css")
        );
    }

    #[test]
    fn test_style_alias_needs_path_boundary() {
        let router = router(Path::new("/lib"), false);
        let from = Path::new("/lib/src/components/button");

        assert_eq!(
            router.resolve_import("@css-kit/x.css", from),
            PathBuf::from("/lib/src/components/button/@css-kit/x.css")
        );
        assert_eq!(
            router.resolve_import("@cssx.css", from),
            PathBuf::from("/lib/src/components/button/@cssx.css")
        );
        assert_eq!(router.resolve_import("@css", from), PathBuf::from("/lib/src/assets/styles/css"));
    }

    #[test]
    fn test_expand_imports() {
        let dir = tempfile::tempdir().unwrap();
        let styles = dir.path().join("src/assets/styles/css");
        fs::create_dir_all(&styles).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/normalize")).unwrap();
        fs::write(styles.join("vars.css"), ".vars { color: red; }\n").unwrap();
        fs::write(styles.join("base.css"), "@import './vars.css';\n.base { margin: 0; }\n").unwrap();
        fs::write(dir.path().join("node_modules/normalize/n.css"), "html { line-height: 1; }\n").unwrap();

        let router = router(dir.path(), false);
        let block = global(
            "@import '@css/base.css';\n@import url(\"~normalize/n.css\") print;\n@import '@css/vars.css';\n.own { padding: 0; }",
            dir.path().join("src/components/button/Button.vue"),
        );
        let routed = router.route(&block).unwrap();

        assert!(routed.class_map.is_empty());
        assert_eq!(
            routed.css,
            ".vars { color: red; }\n.base { margin: 0; }\n@media print {\nhtml { line-height: 1; }\n}\n\n.own { padding: 0; }"
        );
    }

    #[test]
    fn test_missing_import_is_resolution_error() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path(), false);
        let block = global("@import './nope.css';", dir.path().join("src/a.css"));
        assert!(matches!(router.route(&block), Err(BuildError::Resolution { .. })));
    }

    #[test]
    fn test_scoped_block_gets_class_map() {
        let router = router(Path::new("/lib"), true);
        let block = StyleBlock {
            scoped: true,
            raw_text: ".btn { color: red; }".to_string(),
            source_component: Some(ComponentId::new("button")),
            origin: PathBuf::from("/lib/src/components/button/Button.vue"),
            binding: Some("$style".to_string()),
        };
        let routed = router.route(&block).unwrap();
        let generated = &routed.class_map["btn"];
        assert!(generated.starts_with("btn___"));
        assert_eq!(routed.css, format!(".{} {{ color: red; }}", generated));
    }
}
