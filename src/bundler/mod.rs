//! Core bundler implementation
//!
//! Walks the module graph of one entry point through a [`Pipeline`], lowers
//! every module into the registry form and collects the result as a
//! [`Chunk`]. Nothing is shared between entries: shared modules are compiled
//! and emitted once per chunk that reaches them.

mod chunk;
mod graph;
mod lower;
mod minify;
mod runtime;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::entry::EntryPoint;
use crate::error::{BuildError, BuildResult};
use crate::pipeline::{Link, ModuleUnit, Pipeline};
use crate::utils::normalize_path;

pub use chunk::{Chunk, ChunkExports, ChunkModule};
pub use graph::{Module, ModuleGraph, ModuleId, ModuleType};
pub use minify::{Minifier, WhitespaceMinifier};
pub use runtime::{externals_table, registry};

/// Bundles one entry point
pub struct Bundler<'a> {
    pipeline: &'a Pipeline,

    /// Source paths of the other entries of a split format, mapped to the
    /// specifier their output is imported with
    siblings: &'a HashMap<PathBuf, String>,

    entry: &'a EntryPoint,

    graph: Arc<RwLock<ModuleGraph>>,
}

impl<'a> Bundler<'a> {
    pub fn new(pipeline: &'a Pipeline, siblings: &'a HashMap<PathBuf, String>, entry: &'a EntryPoint) -> Self {
        Self {
            pipeline,
            siblings,
            entry,
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
        }
    }

    /// Compile everything the entry reaches and assemble the chunk
    pub fn bundle(&self) -> BuildResult<Chunk> {
        let entry_path = normalize_path(self.entry.source_path());
        let entry_id = self.process_module(&entry_path)?;

        let graph = self.graph.read();
        let entry_module = graph
            .get_module(entry_id)
            .ok_or_else(|| BuildError::Internal(format!("entry {} left the graph", self.entry.id())))?;

        let mut modules = Vec::new();
        let mut outside: Vec<String> = Vec::new();
        let mut css = Vec::new();
        let mut injects_style = false;

        for id in graph.load_order(entry_id) {
            let Some(module) = graph.get_module(id) else {
                continue;
            };
            modules.push(ChunkModule {
                key: module.key.clone(),
                code: module.code.clone(),
            });
            for key in &module.outside {
                if !outside.contains(key) {
                    outside.push(key.clone());
                }
            }
            if let Some(text) = &module.css {
                css.push((module.key.clone(), text.clone()));
            }
            injects_style |= module.injects_style;
        }

        let mut exports = ChunkExports::default();
        collect_exports(&graph, entry_module, &mut exports, &mut HashSet::new());

        let chunk = Chunk {
            entry: self.entry.id().clone(),
            entry_key: entry_module.key.clone(),
            modules,
            outside,
            exports,
            css,
            injects_style,
        };

        debug!(
            "Bundled {} for {} ({} modules)",
            chunk.entry,
            self.pipeline.format(),
            chunk.len()
        );

        Ok(chunk)
    }

    /// Compile a module and, depth first, every local module it imports
    fn process_module(&self, path: &Path) -> BuildResult<ModuleId> {
        if let Some(id) = self.graph.read().get_module_id(path) {
            return Ok(id);
        }

        let toolchain = self.pipeline.toolchain();
        let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        let mut unit = ModuleUnit::new(path.to_path_buf(), source, toolchain.owner_of(path));
        self.pipeline.compile(&mut unit)?;

        let mut keys = BTreeMap::new();
        let mut outside = Vec::new();
        let mut locals = Vec::new();
        let entry_path = normalize_path(self.entry.source_path());

        for (specifier, link) in &unit.imports {
            let key = match link {
                Link::External(external) => {
                    outside.push(external.clone());
                    external.clone()
                }
                Link::Local(target) => match self.siblings.get(target) {
                    Some(sibling) if *target != entry_path => {
                        outside.push(sibling.clone());
                        sibling.clone()
                    }
                    _ => {
                        locals.push(target.clone());
                        toolchain.module_key(target)
                    }
                },
            };
            keys.insert(specifier.clone(), key);
        }

        let lowered = lower::lower(&unit.code, &keys)?;

        let module_id = {
            let mut graph = self.graph.write();
            graph.add_module(Module {
                key: toolchain.module_key(path),
                path: unit.path,
                code: lowered.code,
                star_exports: lowered.star_exports,
                exports: lowered.exports,
                outside,
                css: unit.css,
                injects_style: unit.injects_style,
            })
        };

        for target in locals {
            let dep_id = self.process_module(&target)?;
            self.graph.write().add_dependency(module_id, dep_id);
        }

        Ok(module_id)
    }
}

/// Named exports of `module`, following `export *` through local modules
fn collect_exports(graph: &ModuleGraph, module: &Module, exports: &mut ChunkExports, seen: &mut HashSet<String>) {
    if !seen.insert(module.key.clone()) {
        return;
    }
    for name in &module.exports {
        if !exports.names.contains(name) {
            exports.names.push(name.clone());
        }
    }
    for key in &module.star_exports {
        match graph.get_module_by_key(key) {
            Some(source) => collect_exports(graph, source, exports, seen),
            None => {
                if !exports.star_outside.contains(key) {
                    exports.star_outside.push(key.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Config;
    use crate::discovery::ComponentId;
    use crate::entry::EntryResolver;
    use crate::format::OutputFormat;
    use crate::pipeline::Toolchain;
    use crate::style::StyleMode;

    fn fixture() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("components/button")).unwrap();
        fs::create_dir_all(src.join("utils")).unwrap();
        fs::write(
            src.join("index.ts"),
            "import Button from \"./components/button\";\nexport * from \"./utils/shared\";\nexport { Button };\nexport default { install(app: any) { app.use(Button); } };\n",
        )
        .unwrap();
        fs::write(src.join("utils/shared.ts"), "export const size = 1;\n").unwrap();
        fs::write(src.join("utils/theme.css"), ".theme { color: red; }\n").unwrap();
        fs::write(
            src.join("components/button/index.ts"),
            "import \"../../utils/theme.css\";\nimport { h } from \"vue\";\nexport default { render() { return h(\"button\"); } };\n",
        )
        .unwrap();
        let config = Config::default_config(dir.path());
        (dir, config)
    }

    fn entries(config: &Config) -> Vec<EntryPoint> {
        EntryResolver::new(config).resolve(&[ComponentId::new("button")]).unwrap()
    }

    #[test]
    fn test_merged_bundle_inlines_components() {
        let (_dir, config) = fixture();
        let toolchain = Arc::new(Toolchain::new(&config, StyleMode::Extracted));
        let pipeline = Pipeline::assemble(OutputFormat::EsmMerged, &toolchain);
        let entries = entries(&config);
        let siblings = HashMap::new();

        let chunk = Bundler::new(&pipeline, &siblings, &entries[0]).bundle().unwrap();

        let keys: Vec<&str> = chunk.modules.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "src/utils/theme.css",
                "src/components/button/index.ts",
                "src/utils/shared.ts",
                "src/index.ts"
            ]
        );
        assert_eq!(chunk.entry_key, "src/index.ts");
        assert_eq!(chunk.outside, vec!["vue"]);
        assert_eq!(chunk.exports.names, vec!["Button", "size"]);
        assert!(chunk.exports.star_outside.is_empty());
        assert_eq!(chunk.css.len(), 1);
        assert_eq!(chunk.css[0].0, "src/utils/theme.css");
        assert!(!chunk.injects_style);
    }

    #[test]
    fn test_split_bundle_links_sibling_entries() {
        let (_dir, config) = fixture();
        let toolchain = Arc::new(Toolchain::new(&config, StyleMode::Inline));
        let pipeline = Pipeline::assemble(OutputFormat::EsmSplit, &toolchain);
        let entries = entries(&config);
        let siblings: HashMap<PathBuf, String> = entries
            .iter()
            .map(|e| (normalize_path(e.source_path()), format!("./{}.js", e.id())))
            .collect();

        let index = Bundler::new(&pipeline, &siblings, &entries[0]).bundle().unwrap();
        assert_eq!(index.outside, vec!["./button.js"]);
        assert_eq!(index.len(), 2);
        assert!(index.modules[1].code.contains("__require(\"./button.js\")"));
        assert!(!index.injects_style);

        let button = Bundler::new(&pipeline, &siblings, &entries[1]).bundle().unwrap();
        assert_eq!(button.outside, vec!["vue"]);
        assert!(button.injects_style);
        assert!(button.css.is_empty());
    }

    #[test]
    fn test_missing_entry_source_fails() {
        let (dir, config) = fixture();
        fs::remove_file(dir.path().join("src/components/button/index.ts")).unwrap();
        let toolchain = Arc::new(Toolchain::new(&config, StyleMode::Inline));
        let pipeline = Pipeline::assemble(OutputFormat::UmdPerComponent, &toolchain);
        let entries = entries(&config);
        let siblings = HashMap::new();

        let err = Bundler::new(&pipeline, &siblings, &entries[1]).bundle().unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }
}
