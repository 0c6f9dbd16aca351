//! The module stages, in pipeline order

use std::collections::BTreeMap;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::{Link, ModuleUnit, Stage, StageKind, Toolchain};
use crate::bundler::ModuleType;
use crate::error::{BuildError, BuildResult};
use crate::sfc::{map_script, script_lang, DEFAULT_MODULE_BINDING, EXPORT_FOOTER};
use crate::style::{StyleBlock, StyleMode};
use crate::utils::{js_string, normalize_path};

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("."))
}

/// Rewrites aliased specifiers to relative ones
pub struct AliasRewrite {
    toolchain: Arc<Toolchain>,
}

impl AliasRewrite {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self { toolchain }
    }
}

impl Stage for AliasRewrite {
    fn kind(&self) -> StageKind {
        StageKind::AliasRewrite
    }

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        let resolver = &self.toolchain.resolver;
        let from_dir = parent_dir(&unit.path);
        match unit.kind {
            // Template and style text never carry specifiers
            ModuleType::Vue => {
                unit.code = map_script(&unit.code, |body| Ok(resolver.rewrite_aliases(body, from_dir)))?;
            }
            _ if unit.kind.is_js_like() => unit.code = resolver.rewrite_aliases(&unit.code, from_dir),
            _ => {}
        }
        Ok(())
    }
}

/// Compiles typed script and applies defines
pub struct Transpile {
    toolchain: Arc<Toolchain>,
}

impl Transpile {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self { toolchain }
    }
}

impl Stage for Transpile {
    fn kind(&self) -> StageKind {
        StageKind::Transpile
    }

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        let transformer = &self.toolchain.transformer;
        match unit.kind {
            ModuleType::Vue => {
                let script_type = match script_lang(&unit.code).as_deref() {
                    Some("ts") | Some("tsx") => ModuleType::TypeScript,
                    _ => ModuleType::JavaScript,
                };
                unit.code = map_script(&unit.code, |body| {
                    transformer.transform(body, &unit.path, &script_type)
                })?;
            }
            ModuleType::Css => {}
            ModuleType::Unknown => {
                return Err(BuildError::diagnostic(
                    "transpile",
                    &unit.path,
                    "no loader for this file type",
                ));
            }
            _ => {
                unit.code = transformer.transform(&unit.code, &unit.path, &unit.kind)?;
            }
        }
        Ok(())
    }
}

/// Splits single-file components into script and style blocks.
/// Stylesheets imported from script become style blocks here too.
pub struct SfcCompile {
    toolchain: Arc<Toolchain>,
}

impl SfcCompile {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self { toolchain }
    }
}

impl Stage for SfcCompile {
    fn kind(&self) -> StageKind {
        StageKind::SfcCompile
    }

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        match unit.kind {
            ModuleType::Vue => {
                debug!(
                    "Compiling {} with {}",
                    unit.path.display(),
                    self.toolchain.sfc.name()
                );
                let compiled = self.toolchain.sfc.compile(&unit.code, &unit.path)?;
                unit.code = compiled.code;
                unit.styles.extend(compiled.styles.into_iter().map(|style| StyleBlock {
                    scoped: style.module.is_some(),
                    raw_text: style.text,
                    source_component: unit.owner.clone(),
                    origin: unit.path.clone(),
                    binding: style.module,
                }));
            }
            ModuleType::Css => {
                let scoped = unit
                    .path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".module.css"));
                unit.styles.push(StyleBlock {
                    scoped,
                    raw_text: mem::take(&mut unit.code),
                    source_component: unit.owner.clone(),
                    origin: unit.path.clone(),
                    binding: None,
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Routes style blocks and either injects the result or holds it back
/// for the extracted stylesheet
pub struct StyleRoute {
    toolchain: Arc<Toolchain>,
}

impl StyleRoute {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self { toolchain }
    }
}

impl Stage for StyleRoute {
    fn kind(&self) -> StageKind {
        StageKind::StyleRoute
    }

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        if unit.styles.is_empty() {
            return Ok(());
        }

        let mut css = Vec::new();
        let mut class_maps: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut has_scoped = false;

        for block in mem::take(&mut unit.styles) {
            let routed = self.toolchain.styles.route(&block)?;
            if block.scoped {
                has_scoped = true;
                let binding = block
                    .binding
                    .unwrap_or_else(|| DEFAULT_MODULE_BINDING.to_string());
                class_maps.entry(binding).or_default().extend(routed.class_map);
            }
            let text = routed.css.trim();
            if !text.is_empty() {
                css.push(text.to_string());
            }
        }

        match unit.kind {
            ModuleType::Css if has_scoped => {
                let map = class_maps.remove(DEFAULT_MODULE_BINDING).unwrap_or_default();
                unit.code = format!("export default {};\n", to_json(&map, &unit.path)?);
            }
            ModuleType::Css => {}
            _ if !class_maps.is_empty() => {
                let line = format!("__sfc__.__cssModules = {};\n", to_json(&class_maps, &unit.path)?);
                unit.code = match unit.code.strip_suffix(EXPORT_FOOTER) {
                    Some(head) => format!("{}{}{}", head, line, EXPORT_FOOTER),
                    None => format!("{}{}", unit.code, line),
                };
            }
            _ => {}
        }

        if css.is_empty() {
            return Ok(());
        }
        let css = css.join("\n");

        match self.toolchain.style_mode() {
            StyleMode::Inline => {
                unit.code.push_str(&format!("__injectStyle({});\n", js_string(&css)));
                unit.injects_style = true;
            }
            StyleMode::Extracted => unit.css = Some(css),
        }

        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T, path: &Path) -> BuildResult<String> {
    serde_json::to_string(value).map_err(|e| BuildError::diagnostic("style", path, e.to_string()))
}

/// Classifies every import as external or local; local ones must resolve
pub struct ExternalElision {
    toolchain: Arc<Toolchain>,
}

impl ExternalElision {
    pub fn new(toolchain: Arc<Toolchain>) -> Self {
        Self { toolchain }
    }
}

impl Stage for ExternalElision {
    fn kind(&self) -> StageKind {
        StageKind::ExternalElision
    }

    fn apply(&self, unit: &mut ModuleUnit) -> BuildResult<()> {
        let resolver = &self.toolchain.resolver;
        let mut imports = Vec::new();

        for specifier in resolver.extract_dependencies(&unit.code, &unit.kind) {
            let link = match self.toolchain.external_package(&specifier) {
                Some(_) => Link::External(specifier.clone()),
                None => Link::Local(normalize_path(&resolver.resolve(&specifier, &unit.path)?)),
            };
            imports.push((specifier, link));
        }

        unit.imports = imports;
        Ok(())
    }
}
