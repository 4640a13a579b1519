//! Module graph types shared by the import resolver and the driver.
//!
//! Grounded on the source workspace's own module-graph representation:
//! a flat, insertion-ordered `Vec<ModuleInfo>` with a name-to-id side table,
//! rather than a graph of interior pointers -- symbol records and import
//! edges reference modules by [`ModuleId`], never by pointer.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub u32);

#[derive(Debug)]
pub struct ModuleInfo {
    pub id: ModuleId,
    /// The path or specifier this module was imported by, e.g. `"./util.hql"`
    /// or `"npm:lodash"`.
    pub specifier: String,
    /// Resolved local filesystem path, absent for remote modules.
    pub path: Option<PathBuf>,
    pub dependencies: Vec<ModuleId>,
    pub is_entry: bool,
    pub kind: ModuleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Local,
    Remote,
    Native,
}

#[derive(Debug, Clone)]
pub struct CycleError {
    /// The module specifiers forming the cycle, e.g. `["a.hql", "b.hql", "a.hql"]`.
    pub cycle_path: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cycle_path.join(" -> "))
    }
}

/// A directed graph of modules and their import dependencies, in insertion
/// order.
pub struct ModuleGraph {
    pub modules: Vec<ModuleInfo>,
    specifier_to_id: FxHashMap<String, ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            specifier_to_id: FxHashMap::default(),
        }
    }

    pub fn add_module(
        &mut self,
        specifier: String,
        path: Option<PathBuf>,
        kind: ModuleKind,
        is_entry: bool,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.specifier_to_id.insert(specifier.clone(), id);
        self.modules.push(ModuleInfo {
            id,
            specifier,
            path,
            dependencies: Vec::new(),
            is_entry,
            kind,
        });
        id
    }

    pub fn resolve(&self, specifier: &str) -> Option<ModuleId> {
        self.specifier_to_id.get(specifier).copied()
    }

    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        self.modules[from.0 as usize].dependencies.push(to);
    }

    pub fn get(&self, id: ModuleId) -> &ModuleInfo {
        &self.modules[id.0 as usize]
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_resolve() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("a.hql".into(), Some("a.hql".into()), ModuleKind::Local, true);
        let b = graph.add_module("./b.hql".into(), Some("b.hql".into()), ModuleKind::Local, false);
        graph.add_dependency(a, b);
        assert_eq!(graph.resolve("a.hql"), Some(a));
        assert_eq!(graph.get(a).dependencies, vec![b]);
        assert!(graph.get(a).is_entry);
    }
}
