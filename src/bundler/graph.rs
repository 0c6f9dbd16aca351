//! Module graph data structures

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Unique identifier for a module
pub type ModuleId = usize;

/// Types of modules the bundler can handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Vue,
    Css,
    Json,
    Unknown,
}

impl ModuleType {
    /// Determine module type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => ModuleType::JavaScript,
            "ts" | "mts" | "cts" => ModuleType::TypeScript,
            "jsx" => ModuleType::Jsx,
            "tsx" => ModuleType::Tsx,
            "vue" => ModuleType::Vue,
            "css" => ModuleType::Css,
            "json" => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }

    /// Detect module type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleType::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }

    /// Check if this module carries script that can import other modules
    pub fn is_js_like(&self) -> bool {
        matches!(
            self,
            ModuleType::JavaScript
                | ModuleType::TypeScript
                | ModuleType::Jsx
                | ModuleType::Tsx
                | ModuleType::Vue
        )
    }
}

/// A compiled module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute path to the module
    pub path: PathBuf,

    /// Registry key, the project-relative path
    pub key: String,

    /// Lowered registry body
    pub code: String,

    /// Keys of `export *` sources, in source order
    pub star_exports: Vec<String>,

    /// Statically known export names, excluding `default`
    pub exports: Vec<String>,

    /// Keys required from outside the registry (externals and sibling entries)
    pub outside: Vec<String>,

    /// Routed CSS kept for the extracted stylesheet
    pub css: Option<String>,

    /// Whether the module injects its own styles
    pub injects_style: bool,
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: HashMap<ModuleId, Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Dependency edges in import order
    edges: HashMap<ModuleId, Vec<ModuleId>>,

    /// Next available module ID
    next_id: ModuleId,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let path = module.path.clone();

        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.path_to_id.insert(path, id);
        self.modules.insert(id, module);
        self.edges.insert(id, Vec::new());

        id
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if let Some(deps) = self.edges.get_mut(&from) {
            if !deps.contains(&to) {
                deps.push(to);
            }
        }
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Find a module by registry key
    pub fn get_module_by_key(&self, key: &str) -> Option<&Module> {
        self.modules.values().find(|m| m.key == key)
    }

    /// Modules reachable from `start` in evaluation order: dependencies
    /// before their importers, siblings in import order
    pub fn load_order(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit(start, &mut visited, &mut order);
        order
    }

    fn visit(&self, id: ModuleId, visited: &mut HashSet<ModuleId>, order: &mut Vec<ModuleId>) {
        if !visited.insert(id) {
            return;
        }
        for &dep in self.edges.get(&id).map(Vec::as_slice).unwrap_or_default() {
            self.visit(dep, visited, order);
        }
        order.push(id);
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
