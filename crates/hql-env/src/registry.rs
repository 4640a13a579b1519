//! The three-tier macro registry (spec.md §4.5): system macros are always
//! visible, module macros only in their defining file, imported macros only
//! in a file that has explicitly imported them (optionally under an alias).

use rustc_hash::{FxHashMap, FxHashSet};

use hql_parser::SExpr;

use crate::Environment;

pub type MacroFn =
    std::rc::Rc<dyn Fn(&[SExpr], &mut Environment) -> Result<SExpr, hql_common::MacroError>>;

#[derive(Default)]
pub struct MacroRegistry {
    system: FxHashMap<String, MacroFn>,
    module: FxHashMap<(String, String), MacroFn>,
    imported: FxHashMap<String, FxHashMap<String, String>>,
    aliases: FxHashMap<String, FxHashMap<String, String>>,
    processed_files: FxHashSet<String>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_system(&mut self, name: impl Into<String>, f: MacroFn) {
        self.system.insert(name.into(), f);
    }

    pub fn define_module(&mut self, file: impl Into<String>, name: impl Into<String>, f: MacroFn) {
        self.module.insert((file.into(), name.into()), f);
    }

    pub fn has_macro(&self, current_file: &str, name: &str) -> bool {
        self.get_macro(current_file, name).is_some()
    }

    /// Resolve `name` as visible from `current_file`: system macros first,
    /// then a macro defined directly in `current_file`, then an imported
    /// macro (resolved through any alias) from its source file.
    pub fn get_macro(&self, current_file: &str, name: &str) -> Option<MacroFn> {
        if let Some(f) = self.system.get(name) {
            return Some(f.clone());
        }
        if let Some(f) = self.module.get(&(current_file.to_string(), name.to_string())) {
            return Some(f.clone());
        }
        let imports = self.imported.get(current_file)?;
        let original_name = self
            .aliases
            .get(current_file)
            .and_then(|a| a.get(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        let source_file = imports.get(&original_name).or_else(|| imports.get(name))?;
        self.module
            .get(&(source_file.clone(), original_name))
            .cloned()
    }

    /// Record that `target_file` imports `name` from `source_file`, under
    /// `alias` if given. Fails if the macro is not defined (and exported) in
    /// `source_file` -- callers check `is_exported` via the symbol table
    /// before calling this; this registry only tracks visibility edges.
    pub fn import_macro(
        &mut self,
        source_file: &str,
        name: &str,
        target_file: &str,
        alias: Option<&str>,
    ) -> Result<(), String> {
        if !self
            .module
            .contains_key(&(source_file.to_string(), name.to_string()))
        {
            return Err(format!(
                "macro '{name}' is not defined in module '{source_file}'"
            ));
        }
        self.imported
            .entry(target_file.to_string())
            .or_default()
            .insert(alias.unwrap_or(name).to_string(), source_file.to_string());
        if let Some(alias) = alias {
            self.aliases
                .entry(target_file.to_string())
                .or_default()
                .insert(alias.to_string(), name.to_string());
        }
        Ok(())
    }

    pub fn mark_processed(&mut self, file: impl Into<String>) {
        self.processed_files.insert(file.into());
    }

    pub fn has_processed(&self, file: &str) -> bool {
        self.processed_files.contains(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_parser::SExpr;

    fn noop_macro() -> MacroFn {
        std::rc::Rc::new(|_args, _env| Ok(SExpr::symbol("ok", None)))
    }

    #[test]
    fn system_macro_visible_everywhere() {
        let mut reg = MacroRegistry::new();
        reg.define_system("when", noop_macro());
        assert!(reg.has_macro("any.hql", "when"));
    }

    #[test]
    fn module_macro_only_visible_in_its_file() {
        let mut reg = MacroRegistry::new();
        reg.define_module("a.hql", "double", noop_macro());
        assert!(reg.has_macro("a.hql", "double"));
        assert!(!reg.has_macro("b.hql", "double"));
    }

    #[test]
    fn imported_macro_visible_after_import() {
        let mut reg = MacroRegistry::new();
        reg.define_module("a.hql", "double", noop_macro());
        reg.import_macro("a.hql", "double", "b.hql", None).unwrap();
        assert!(reg.has_macro("b.hql", "double"));
    }

    #[test]
    fn import_with_alias_visible_under_alias_only() {
        let mut reg = MacroRegistry::new();
        reg.define_module("a.hql", "double", noop_macro());
        reg.import_macro("a.hql", "double", "b.hql", Some("twice"))
            .unwrap();
        assert!(reg.has_macro("b.hql", "twice"));
    }

    #[test]
    fn importing_undefined_macro_fails() {
        let mut reg = MacroRegistry::new();
        assert!(reg.import_macro("a.hql", "missing", "b.hql", None).is_err());
    }

    #[test]
    fn process_file_idempotence_guard() {
        let mut reg = MacroRegistry::new();
        assert!(!reg.has_processed("a.hql"));
        reg.mark_processed("a.hql");
        assert!(reg.has_processed("a.hql"));
    }
}
