//! Lexically scoped environment for the HQL compiler (spec.md §4.5): name
//! bindings with a parent chain, a process-wide macro registry shared by
//! every scope, and the built-in operator table.

mod builtins;
mod registry;
mod value;

pub use hql_common::{ValidationError, ValidationErrorKind};
pub use registry::{MacroFn, MacroRegistry};
pub use value::{NativeFn, Value};

use std::rc::Rc;

use rustc_hash::FxHashMap;

use hql_common::{LruCache, Position};

const LOOKUP_CACHE_CAPACITY: usize = 2048;

/// A lexically scoped environment. Child scopes are created with
/// [`Environment::child`] and share the parent's macro registry (an `Rc`, to
/// match spec.md's "shared macro registry... avoid reference cycles").
pub struct Environment {
    variables: FxHashMap<String, Value>,
    module_exports: FxHashMap<String, FxHashMap<String, Value>>,
    macros: Rc<std::cell::RefCell<MacroRegistry>>,
    lookup_cache: LruCache<String, Value>,
    parent: Option<Box<Environment>>,
    current_file: Option<String>,
}

impl Environment {
    /// A fresh global environment with every built-in operator installed.
    pub fn new_global() -> Self {
        let mut env = Self {
            variables: FxHashMap::default(),
            module_exports: FxHashMap::default(),
            macros: Rc::new(std::cell::RefCell::new(MacroRegistry::new())),
            lookup_cache: LruCache::new(LOOKUP_CACHE_CAPACITY),
            parent: None,
            current_file: None,
        };
        for (name, f) in builtins::table() {
            env.variables.insert(name.to_string(), Value::Native(f));
        }
        env
    }

    /// Enter a nested scope, taking ownership of `self` as its parent.
    /// Shares the macro registry `Rc` so macro visibility is process-wide.
    pub fn child(self) -> Self {
        let macros = Rc::clone(&self.macros);
        let current_file = self.current_file.clone();
        Self {
            variables: FxHashMap::default(),
            module_exports: FxHashMap::default(),
            macros,
            lookup_cache: LruCache::new(LOOKUP_CACHE_CAPACITY),
            parent: Some(Box::new(self)),
            current_file,
        }
    }

    /// Leave the current scope, returning the parent.
    ///
    /// # Panics
    ///
    /// Panics on the global (parentless) environment.
    pub fn pop(self) -> Self {
        *self.parent.expect("cannot pop the global environment")
    }

    /// Install a binding in the current scope; invalidates the lookup
    /// cache entry for `name`.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.lookup_cache.invalidate(&name);
        self.variables.insert(name, value);
    }

    pub fn define_export(&mut self, module: impl Into<String>, name: impl Into<String>, value: Value) {
        self.module_exports
            .entry(module.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Search the current scope, then each parent in turn. Supports dotted
    /// `module.prop` access against `module_exports`, with a `-`-to-`_`
    /// sanitization fallback when the literal key is absent.
    pub fn lookup(&mut self, name: &str) -> Option<Value> {
        if let Some(v) = self.lookup_cache.get(&name.to_string()) {
            return Some(v.clone());
        }
        let found = self.lookup_uncached(name)?;
        self.lookup_cache.put(name.to_string(), found.clone());
        Some(found)
    }

    fn lookup_uncached(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.variables.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.resolve_dotted(name) {
            return Some(v);
        }
        self.parent.as_deref().and_then(|p| p.lookup_uncached(name))
    }

    fn resolve_dotted(&self, name: &str) -> Option<Value> {
        let (head, rest) = name.split_once('.')?;
        let exports = self
            .module_exports
            .get(head)
            .or_else(|| self.parent.as_deref().and_then(|p| p.module_exports.get(head)))?;
        if let Some(v) = exports.get(rest) {
            return Some(v.clone());
        }
        let sanitized = rest.replace('-', "_");
        exports.get(&sanitized).cloned()
    }

    pub fn has_macro(&self, name: &str) -> bool {
        let file = self.current_file.as_deref().unwrap_or("");
        self.macros.borrow().has_macro(file, name)
    }

    pub fn get_macro(&self, name: &str) -> Option<MacroFn> {
        let file = self.current_file.as_deref().unwrap_or("");
        self.macros.borrow().get_macro(file, name)
    }

    pub fn define_system_macro(&self, name: impl Into<String>, f: MacroFn) {
        self.macros.borrow_mut().define_system(name, f);
    }

    pub fn define_module_macro(&self, file: impl Into<String>, name: impl Into<String>, f: MacroFn) {
        self.macros.borrow_mut().define_module(file, name, f);
    }

    pub fn import_macro(
        &self,
        source_file: &str,
        name: &str,
        target_file: &str,
        alias: Option<&str>,
    ) -> Result<(), String> {
        self.macros
            .borrow_mut()
            .import_macro(source_file, name, target_file, alias)
    }

    pub fn set_current_file(&mut self, path: Option<String>) {
        self.current_file = path;
    }

    pub fn get_current_file(&self) -> Option<&str> {
        self.current_file.as_deref()
    }

    pub fn process_file(&self, path: impl Into<String>) {
        self.macros.borrow_mut().mark_processed(path);
    }

    pub fn has_processed_file(&self, path: &str) -> bool {
        self.macros.borrow().has_processed(path)
    }

    pub fn call_native(&self, name: &str, args: &[Value], position: &Position) -> Option<Result<Value, ValidationError>> {
        match self.lookup_uncached(name) {
            Some(Value::Native(f)) => Some(f(args, position)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_parser::{Literal, SExpr};

    fn int(i: i64) -> Value {
        Value::SExpr(SExpr::literal(Literal::Int(i), None))
    }

    fn pos() -> Position {
        Position::new(std::sync::Arc::from("t.hql"), 1, 1, 0)
    }

    #[test]
    fn define_and_lookup_in_same_scope() {
        let mut env = Environment::new_global();
        env.define("x", int(1));
        assert!(env.lookup("x").is_some());
    }

    #[test]
    fn lookup_walks_parent_chain() {
        let mut global = Environment::new_global();
        global.define("x", int(1));
        let mut local = global.child();
        assert!(local.lookup("x").is_some());
    }

    #[test]
    fn builtin_plus_adds_integers() {
        let env = Environment::new_global();
        let result = env
            .call_native("+", &[int(1), int(2)], &pos())
            .unwrap()
            .unwrap();
        assert_eq!(
            result.as_sexpr().unwrap().kind,
            hql_parser::SExprKind::Literal(Literal::Int(3))
        );
    }

    #[test]
    fn division_by_zero_is_validation_error() {
        let env = Environment::new_global();
        let err = env
            .call_native("/", &[int(1), int(0)], &pos())
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DivisionByZero);
    }

    #[test]
    fn dotted_lookup_resolves_through_module_exports() {
        let mut global = Environment::new_global();
        global.define_export("config", "max_retries", int(3));
        assert!(global.lookup("config.max_retries").is_some());
    }

    #[test]
    fn dotted_lookup_sanitizes_hyphen_to_underscore() {
        let mut global = Environment::new_global();
        global.define_export("config", "max_retries", int(3));
        assert!(global.lookup("config.max-retries").is_some());
    }

    #[test]
    fn macro_registry_is_shared_with_children() {
        let global = Environment::new_global();
        global.define_system_macro(
            "when",
            Rc::new(|_args, _env| Ok(SExpr::symbol("ok", None))),
        );
        let mut local = global.child();
        local.set_current_file(Some("a.hql".to_string()));
        assert!(local.has_macro("when"));
    }

    #[test]
    fn process_file_idempotence_guard() {
        let env = Environment::new_global();
        assert!(!env.has_processed_file("a.hql"));
        env.process_file("a.hql");
        assert!(env.has_processed_file("a.hql"));
    }
}
