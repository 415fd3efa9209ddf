//! Module graph data structures

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::sourcemap::SourceMap;
use crate::transform::ExportBinding;

/// Unique identifier for a module, assigned in discovery order
pub type ModuleId = usize;

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Canonical path to the module
    pub path: PathBuf,

    /// Original source code
    pub source: String,

    /// Code after loaders and module interop
    pub code: String,

    /// Map carried over from the input file
    pub input_map: Option<SourceMap>,

    /// Getters installed on `exports` before the module body runs
    pub exports: Vec<ExportBinding>,

    pub is_esm: bool,

    /// Request string to the module it resolved to, in request order
    pub dependencies: Vec<(String, ModuleId)>,
}

impl Module {
    /// Map from this module's code lines back to its origin
    pub fn source_map(&self, source_name: &str) -> SourceMap {
        match &self.input_map {
            Some(map) => map.clone(),
            None => SourceMap::identity(source_name, &self.source),
        }
    }
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules, indexed by their ID
    modules: Vec<Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning the existing ID for a known path
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.path_to_id.get(&module.path) {
            return id;
        }

        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        id
    }

    /// Record a resolved request made by `from`
    pub fn add_dependency(&mut self, from: ModuleId, request: &str, to: ModuleId) {
        if let Some(module) = self.modules.get_mut(from) {
            if !module.dependencies.iter().any(|(r, _)| r == request) {
                module.dependencies.push((request.to_string(), to));
            }
        }
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// All modules reachable from `start`, in ID order
    pub fn reachable_from(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(module) = self.modules.get(id) {
                stack.extend(module.dependencies.iter().map(|(_, dep)| *dep));
            }
        }

        visited.into_iter().collect()
    }

    /// Every module path, for the watcher
    pub fn paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.modules.iter().map(|m| m.path.as_path())
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
