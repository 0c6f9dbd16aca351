//! Module resolution
//!
//! Handles alias rewriting and resolving import specifiers to file paths.
//! One [`ModuleResolver`] is built per build and shared by every format.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::bundler::ModuleType;
use crate::config::Config;
use crate::error::{BuildError, BuildResult};
use crate::utils::{captures_in_code, normalize_path, relative_path, replace_in_code};

/// Matches static imports, re-exports, dynamic imports and require calls.
/// The specifier is captured in `spec` so it can be rewritten in place.
static SPECIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<head>\b(?:import|export)\s*(?:[\w$*{}\s,]*?\bfrom\s*)?|\bimport\s*\(\s*|\brequire\s*\(\s*)["'](?P<spec>[^"'\n]+)["']"#,
    )
    .unwrap()
});

/// A path alias: `symbol` and `symbol/...` resolve under `target_dir`
#[derive(Debug, Clone)]
pub struct AliasRule {
    pub symbol: String,
    pub target_dir: PathBuf,
}

impl AliasRule {
    /// The specifier remainder after the alias symbol, if it applies
    pub fn strip<'a>(&self, specifier: &'a str) -> Option<&'a str> {
        let rest = specifier.strip_prefix(self.symbol.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }

    pub fn target(&self, rest: &str) -> PathBuf {
        if rest.is_empty() {
            self.target_dir.clone()
        } else {
            self.target_dir.join(rest)
        }
    }
}

/// Module resolver
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// Alias rules, first match wins
    aliases: Vec<AliasRule>,

    /// Extensions tried when the specifier has none
    extensions: Vec<String>,
}

impl ModuleResolver {
    /// Create a resolver from the project configuration
    pub fn new(config: &Config) -> Self {
        Self {
            aliases: vec![AliasRule {
                symbol: config.source.alias.clone(),
                target_dir: config.base_dir(),
            }],
            extensions: config.source.extensions.clone(),
        }
    }

    pub fn with_rules(aliases: Vec<AliasRule>, extensions: Vec<String>) -> Self {
        Self { aliases, extensions }
    }

    pub fn aliases(&self) -> &[AliasRule] {
        &self.aliases
    }

    /// Extract import/require dependencies from source code, in first-seen order
    pub fn extract_dependencies(&self, source: &str, module_type: &ModuleType) -> Vec<String> {
        if !module_type.is_js_like() {
            return Vec::new();
        }

        let mut dependencies = Vec::new();
        for cap in captures_in_code(&SPECIFIER_REGEX, source) {
            let spec = cap["spec"].to_string();
            if !dependencies.contains(&spec) {
                dependencies.push(spec);
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Rewrite every aliased specifier to a path relative to `from_dir`
    pub fn rewrite_aliases(&self, source: &str, from_dir: &Path) -> String {
        rewrite_specifiers(source, |spec| self.alias_to_relative(spec, from_dir))
    }

    fn alias_to_relative(&self, specifier: &str, from_dir: &Path) -> Option<String> {
        let rule = self.aliases.iter().find(|rule| rule.strip(specifier).is_some())?;
        let rest = rule.strip(specifier)?;
        let target = normalize_path(&rule.target(rest));
        let relative = relative_path(from_dir, &target)?;

        if relative.starts_with("../") || relative == ".." {
            Some(relative)
        } else if relative.is_empty() {
            Some(".".to_string())
        } else {
            Some(format!("./{}", relative))
        }
    }

    /// Resolve a specifier against `from_dir`: alias first, then relative or package lookup
    pub fn resolve_import(&self, specifier: &str, from_dir: &Path) -> Option<PathBuf> {
        if let Some(rule) = self.aliases.iter().find(|rule| rule.strip(specifier).is_some()) {
            let rest = rule.strip(specifier)?;
            return self.resolve_path(&normalize_path(&rule.target(rest)));
        }

        if specifier.starts_with('.') || specifier.starts_with('/') {
            return self.resolve_path(&normalize_path(&from_dir.join(specifier)));
        }

        self.resolve_bare(specifier, from_dir)
    }

    /// Resolve a specifier imported by the file at `importer`
    pub fn resolve(&self, specifier: &str, importer: &Path) -> BuildResult<PathBuf> {
        debug!("Resolving '{}' from '{}'", specifier, importer.display());

        let base_dir = importer.parent().unwrap_or(Path::new("."));
        self.resolve_import(specifier, base_dir)
            .ok_or_else(|| BuildError::Resolution {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            })
    }

    /// Try the path as-is, with each extension appended, then as a directory index
    fn resolve_path(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        for ext in self.all_extensions() {
            let mut with_ext = target.as_os_str().to_owned();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in self.all_extensions() {
                let index = target.join(format!("index{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    fn all_extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions
            .iter()
            .map(String::as_str)
            .chain([".mjs", ".cjs", ".json"])
    }

    /// Resolve a bare import from the nearest node_modules
    fn resolve_bare(&self, specifier: &str, from: &Path) -> Option<PathBuf> {
        let mut current = from.to_path_buf();

        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier) {
                    return Some(resolved);
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(&self, node_modules: &Path, specifier: &str) -> Option<PathBuf> {
        // Scoped package: @scope/name or @scope/name/subpath
        let (package_name, subpath) = if specifier.starts_with('@') {
            let parts: Vec<&str> = specifier.splitn(3, '/').collect();
            if parts.len() < 2 {
                return None;
            }
            (format!("{}/{}", parts[0], parts[1]), parts.get(2).map(|s| s.to_string()))
        } else {
            let parts: Vec<&str> = specifier.splitn(2, '/').collect();
            (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
        };

        let package_dir = node_modules.join(&package_name);
        if !package_dir.is_dir() {
            return None;
        }

        if let Some(sub) = subpath {
            return self.resolve_path(&package_dir.join(sub));
        }

        let package_json = package_dir.join("package.json");
        if let Some(pkg) = fs::read_to_string(&package_json)
            .ok()
            .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        {
            // ESM entry first, then main
            if let Some(module) = pkg.get("module").and_then(|v| v.as_str()) {
                let module_path = package_dir.join(module);
                if module_path.is_file() {
                    return Some(normalize_path(&module_path));
                }
            }
            if let Some(main) = pkg.get("main").and_then(|v| v.as_str()) {
                if let Some(resolved) = self.resolve_path(&normalize_path(&package_dir.join(main))) {
                    return Some(resolved);
                }
            }
        }

        self.resolve_path(&package_dir.join("index.js"))
    }
}

/// Apply `rewrite` to every import specifier; `None` keeps the original
pub fn rewrite_specifiers<F>(source: &str, mut rewrite: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    replace_in_code(&SPECIFIER_REGEX, source, |cap: &Captures| {
        let full = &cap[0];
        let spec = &cap["spec"];
        match rewrite(spec) {
            Some(replacement) => {
                let quote_start = cap["head"].len();
                let quote = &full[quote_start..quote_start + 1];
                format!("{}{}{}{}", &cap["head"], quote, replacement, quote)
            }
            None => full.to_string(),
        }
    })
    .into_owned()
}
