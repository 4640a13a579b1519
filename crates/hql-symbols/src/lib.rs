//! Symbol table for the HQL compiler (spec.md §5).
//!
//! A table is keyed by name within one scope; nested scopes are child tables
//! holding a owning pointer back to their parent, and lookup walks the chain
//! outward. The syntax transformer is the only stage that mutates a table;
//! every other stage only reads it.

use rustc_hash::FxHashMap;

use hql_common::Position;

/// A stable reference to the S-expression node a symbol was defined at.
/// Assigned by a monotonically increasing counter at definition time rather
/// than an interior pointer, since the underlying tree is reallocated freely
/// during macro expansion and syntax transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Default)]
pub struct NodeIdGen(u32);

impl NodeIdGen {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }
}

/// The closed set of symbol kinds (spec.md §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
    Fx,
    Macro,
    Type,
    Enum,
    EnumCase,
    Struct,
    Class,
    Field,
    Method,
    Interface,
    Module,
    Import,
    Export,
    Namespace,
    Operator,
    Constant,
    Property,
    SpecialForm,
    Builtin,
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Local,
    Parameter,
    Module,
    Class,
    Namespace,
}

/// A parameter in a `params` list: name plus an optional declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<String>,
}

/// A symbol record (spec.md §5). Optional fields default to absent; which
/// ones are populated depends on `kind` (e.g. only `EnumCase` symbols carry
/// `parent` pointing at an `Enum`, only `Method`/`Field` point at a
/// class/struct/interface).
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: Scope,
    pub ty: Option<String>,
    pub parent: Option<String>,
    pub params: Option<Vec<Param>>,
    pub return_type: Option<String>,
    pub cases: Option<Vec<String>>,
    pub associated_values: Option<Vec<String>>,
    pub fields: Option<Vec<String>>,
    pub methods: Option<Vec<String>>,
    pub source_module: Option<String>,
    pub alias_of: Option<String>,
    pub is_exported: bool,
    pub is_imported: bool,
    pub definition_ref: NodeId,
    pub meta: FxHashMap<String, String>,
    pub position: Option<Position>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, scope: Scope, definition_ref: NodeId) -> Self {
        Self {
            name: name.into(),
            kind,
            scope,
            ty: None,
            parent: None,
            params: None,
            return_type: None,
            cases: None,
            associated_values: None,
            fields: None,
            methods: None,
            source_module: None,
            alias_of: None,
            is_exported: false,
            is_imported: false,
            definition_ref,
            meta: FxHashMap::default(),
            position: None,
        }
    }
}

/// A macro record (spec.md §5). Owned by [`hql_macro`]'s registry, not this
/// table, but defined here since both the transformer and the macro
/// expander need the shape and neither should depend on the other.
#[derive(Debug, Clone)]
pub struct MacroRecord {
    pub name: String,
    pub params: Vec<String>,
    pub rest_param: Option<String>,
    pub body: Vec<hql_parser::SExpr>,
    pub source_file: Option<String>,
    pub is_system: bool,
    pub is_exported: bool,
}

/// One lexical scope's worth of symbols, with an owning link to its parent.
/// Entering a nested scope pushes a child table; leaving it pops back to the
/// parent via [`SymbolTable::pop`].
#[derive(Debug)]
pub struct SymbolTable {
    scope: Scope,
    symbols: FxHashMap<String, Symbol>,
    parent: Option<Box<SymbolTable>>,
}

impl SymbolTable {
    /// A fresh table for the global scope, with no parent.
    pub fn new_global() -> Self {
        Self {
            scope: Scope::Global,
            symbols: FxHashMap::default(),
            parent: None,
        }
    }

    /// Enter a nested scope, taking ownership of `self` as the new table's
    /// parent.
    pub fn push(self, scope: Scope) -> Self {
        Self {
            scope,
            symbols: FxHashMap::default(),
            parent: Some(Box::new(self)),
        }
    }

    /// Leave the current scope, returning the parent table.
    ///
    /// # Panics
    ///
    /// Panics if called on the global (parentless) table.
    pub fn pop(self) -> Self {
        *self
            .parent
            .expect("cannot pop the global symbol table")
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Define a symbol in the current (innermost) scope, shadowing any
    /// parent-scope symbol of the same name.
    pub fn define(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Look up a name, walking from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        if let Some(sym) = self.symbols.get(name) {
            return Some(sym);
        }
        self.parent.as_deref().and_then(|p| p.lookup(name))
    }

    /// Look up a name only within the current scope, with no walk to parents.
    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        if self.symbols.contains_key(name) {
            return self.symbols.get_mut(name);
        }
        self.parent.as_deref_mut().and_then(|p| p.lookup_mut(name))
    }

    /// Symbols defined directly in this scope (not walking parents), for
    /// diagnostics dumps and module-export collection.
    pub fn local_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn depth(&self) -> usize {
        1 + self.parent.as_deref().map_or(0, SymbolTable::depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, kind: SymbolKind, scope: Scope) -> Symbol {
        Symbol::new(name, kind, scope, NodeId(0))
    }

    #[test]
    fn define_and_lookup_in_same_scope() {
        let mut table = SymbolTable::new_global();
        table.define(sym("x", SymbolKind::Variable, Scope::Global));
        assert!(table.lookup("x").is_some());
        assert!(table.lookup("y").is_none());
    }

    #[test]
    fn lookup_walks_to_parent_scope() {
        let mut global = SymbolTable::new_global();
        global.define(sym("x", SymbolKind::Variable, Scope::Global));

        let mut local = global.push(Scope::Local);
        assert!(local.lookup("x").is_some());
        local.define(sym("y", SymbolKind::Variable, Scope::Local));
        assert!(local.lookup("y").is_some());

        let global = local.pop();
        assert!(global.lookup("y").is_none());
    }

    #[test]
    fn shadowing_prefers_innermost_scope() {
        let mut global = SymbolTable::new_global();
        let mut g = sym("x", SymbolKind::Variable, Scope::Global);
        g.ty = Some("Number".to_string());
        global.define(g);

        let mut local = global.push(Scope::Local);
        let mut l = sym("x", SymbolKind::Variable, Scope::Local);
        l.ty = Some("String".to_string());
        local.define(l);

        assert_eq!(local.lookup("x").unwrap().ty.as_deref(), Some("String"));
        let global = local.pop();
        assert_eq!(global.lookup("x").unwrap().ty.as_deref(), Some("Number"));
    }

    #[test]
    fn node_id_generator_is_monotonic() {
        let mut gen = NodeIdGen::new();
        let a = gen.next();
        let b = gen.next();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }

    #[test]
    fn depth_counts_scope_nesting() {
        let global = SymbolTable::new_global();
        assert_eq!(global.depth(), 1);
        let local = global.push(Scope::Local);
        assert_eq!(local.depth(), 2);
    }
}
