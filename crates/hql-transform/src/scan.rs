//! Phases 1-5 of the syntax transformer (spec.md §4.3): populate a fresh
//! symbol table from the raw program before the rewrite pass runs.

use rustc_hash::FxHashMap;

use hql_parser::{Literal, SExpr, SExprKind};
use hql_symbols::{NodeIdGen, Param, Scope, Symbol, SymbolKind, SymbolTable};

/// Maps an enum case name to the enum(s) that declare it, so the rewrite
/// pass can resolve `.caseName` shorthand (spec.md §4.3 "Dot shorthand").
pub type EnumRegistry = FxHashMap<String, Vec<String>>;

fn string_literal(e: &SExpr) -> Option<&str> {
    match &e.kind {
        SExprKind::Literal(Literal::String(s)) => Some(s),
        _ => None,
    }
}

fn walk<'a>(forms: &'a [SExpr], f: &mut impl FnMut(&'a SExpr)) {
    for form in forms {
        f(form);
        if let SExprKind::List(children) = &form.kind {
            walk(children, f);
        }
    }
}

/// Phase 1: register every `(enum Name[:Type] (case CaseName ...) ...)`.
pub fn enum_scan(forms: &[SExpr], table: &mut SymbolTable, ids: &mut NodeIdGen, enums: &mut EnumRegistry) {
    walk(forms, &mut |form| {
        let Some(elems) = form.as_list() else { return };
        if !elems.first().is_some_and(|e| e.is_symbol("enum")) {
            return;
        }
        let Some(raw_name) = elems.get(1).and_then(|e| e.as_symbol()) else {
            return;
        };
        let (name, underlying) = match raw_name.split_once(':') {
            Some((n, t)) => (n.to_string(), Some(t.to_string())),
            None => (raw_name.to_string(), None),
        };

        let mut sym = Symbol::new(name.clone(), SymbolKind::Enum, Scope::Global, ids.next());
        sym.ty = underlying;
        sym.position = form.position.clone();

        let mut cases = Vec::new();
        for child in &elems[2..] {
            let Some(case_elems) = child.as_list() else { continue };
            if !case_elems.first().is_some_and(|e| e.is_symbol("case")) {
                continue;
            }
            let Some(case_name) = case_elems.get(1).and_then(|e| e.as_symbol()) else {
                continue;
            };
            cases.push(case_name.to_string());
            enums.entry(case_name.to_string()).or_default().push(name.clone());

            let mut case_sym =
                Symbol::new(case_name.to_string(), SymbolKind::EnumCase, Scope::Global, ids.next());
            case_sym.parent = Some(name.clone());
            case_sym.position = child.position.clone();
            if case_elems.len() > 2 {
                case_sym.associated_values = Some(
                    case_elems[2..]
                        .iter()
                        .filter_map(|e| e.as_symbol().map(str::to_string))
                        .collect(),
                );
            }
            table.define(case_sym);
        }
        sym.cases = Some(cases);
        table.define(sym);
    });
}

/// Phase 2: register every `struct`/`class`/`interface` with fields/methods.
pub fn type_scan(forms: &[SExpr], table: &mut SymbolTable, ids: &mut NodeIdGen) {
    walk(forms, &mut |form| {
        let Some(elems) = form.as_list() else { return };
        let Some(head) = elems.first().and_then(|e| e.as_symbol()) else {
            return;
        };
        let kind = match head {
            "struct" => SymbolKind::Struct,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            _ => return,
        };
        let Some(name) = elems.get(1).and_then(|e| e.as_symbol()) else {
            return;
        };
        let mut sym = Symbol::new(name.to_string(), kind, Scope::Global, ids.next());
        sym.position = form.position.clone();

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        for member in &elems[2..] {
            let Some(member_elems) = member.as_list() else { continue };
            match member_elems.first().and_then(|e| e.as_symbol()) {
                Some("field") => {
                    if let Some(n) = member_elems.get(1).and_then(|e| e.as_symbol()) {
                        fields.push(n.to_string());
                        let mut f = Symbol::new(n.to_string(), SymbolKind::Field, Scope::Class, ids.next());
                        f.parent = Some(name.to_string());
                        f.position = member.position.clone();
                        table.define(f);
                    }
                }
                Some("method") | Some("fn") | Some("fx") => {
                    if let Some(n) = member_elems.get(1).and_then(|e| e.as_symbol()) {
                        methods.push(n.to_string());
                        let mut m = Symbol::new(n.to_string(), SymbolKind::Method, Scope::Class, ids.next());
                        m.parent = Some(name.to_string());
                        m.position = member.position.clone();
                        table.define(m);
                    }
                }
                _ => {}
            }
        }
        sym.fields = Some(fields);
        sym.methods = Some(methods);
        table.define(sym);
    });
}

/// Phase 3: register every `fn`/`fx`/`macro` with its parameters.
pub fn callable_scan(forms: &[SExpr], table: &mut SymbolTable, ids: &mut NodeIdGen) {
    walk(forms, &mut |form| {
        let Some(elems) = form.as_list() else { return };
        let Some(head) = elems.first().and_then(|e| e.as_symbol()) else {
            return;
        };
        let kind = match head {
            "fn" => SymbolKind::Function,
            "fx" => SymbolKind::Fx,
            "defmacro" | "macro" => SymbolKind::Macro,
            _ => return,
        };
        let Some(name) = elems.get(1).and_then(|e| e.as_symbol()) else {
            return;
        };
        let mut sym = Symbol::new(name.to_string(), kind, Scope::Global, ids.next());
        sym.position = form.position.clone();
        if let Some(param_list) = elems.get(2).and_then(|e| e.as_list()) {
            sym.params = Some(parse_params(param_list));
        }
        if let Some(arrow_pos) = elems.iter().position(|e| e.is_symbol("->")) {
            if let Some(rt) = elems.get(arrow_pos + 1) {
                sym.return_type = Some(return_type_text(rt));
            }
        }
        table.define(sym);
    });
}

fn parse_params(param_list: &[SExpr]) -> Vec<Param> {
    let mut params = Vec::new();
    for p in param_list {
        match &p.kind {
            SExprKind::Symbol(name) => {
                let (name, ty) = match name.split_once(':') {
                    Some((n, t)) => (n.to_string(), Some(t.to_string())),
                    None => (name.clone(), None),
                };
                params.push(Param { name, ty });
            }
            SExprKind::List(elems) => {
                if let Some(name) = elems.first().and_then(|e| e.as_symbol()) {
                    let ty = elems.get(1).map(|e| return_type_text(e));
                    params.push(Param {
                        name: name.to_string(),
                        ty,
                    });
                }
            }
            _ => {}
        }
    }
    params
}

fn return_type_text(node: &SExpr) -> String {
    match &node.kind {
        SExprKind::Symbol(s) => s.clone(),
        SExprKind::List(elems) if elems.len() == 2 && elems[0].is_symbol("vector") => {
            format!("Array<{}>", return_type_text(&elems[1]))
        }
        _ => node.to_canonical_string(),
    }
}

/// Phase 4: register global and local `let` bindings, inferring a coarse
/// type tag from the value expression.
pub fn binding_scan(forms: &[SExpr], table: &mut SymbolTable, ids: &mut NodeIdGen) {
    walk(forms, &mut |form| {
        let Some(elems) = form.as_list() else { return };
        if !elems.first().is_some_and(|e| e.is_symbol("let")) || elems.len() < 2 {
            return;
        }
        match &elems[1].kind {
            SExprKind::Symbol(name) => {
                if let Some(value) = elems.get(2) {
                    define_binding(table, ids, name, value, form, Scope::Global);
                }
            }
            SExprKind::List(bindings) => {
                for binding in bindings {
                    let Some(pair) = binding.as_list() else { continue };
                    let (Some(name), Some(value)) =
                        (pair.first().and_then(|e| e.as_symbol()), pair.get(1))
                    else {
                        continue;
                    };
                    define_binding(table, ids, name, value, binding, Scope::Local);
                }
            }
            _ => {}
        }
    });
}

fn define_binding(
    table: &mut SymbolTable,
    ids: &mut NodeIdGen,
    name: &str,
    value: &SExpr,
    position_source: &SExpr,
    scope: Scope,
) {
    let mut sym = Symbol::new(name.to_string(), SymbolKind::Variable, scope, ids.next());
    sym.position = position_source.position.clone();
    sym.ty = Some(infer_type(value));
    table.define(sym);
}

fn infer_type(value: &SExpr) -> String {
    match &value.kind {
        SExprKind::List(elems) if elems.is_empty() => "Array".to_string(),
        SExprKind::List(elems) => match elems.first().and_then(|e| e.as_symbol()) {
            Some("vector") | Some("empty-array") => "Array".to_string(),
            Some("hash-set") | Some("empty-set") => "Set".to_string(),
            Some("hash-map") | Some("empty-map") => "Map".to_string(),
            Some("new") => elems
                .get(1)
                .and_then(|e| e.as_symbol())
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown".to_string()),
            Some("fn") | Some("fx") | Some("lambda") => "Function".to_string(),
            _ => "Unknown".to_string(),
        },
        _ => "Unknown".to_string(),
    }
}

/// Phase 5: register `module`/`import`/`export`/`namespace`/`alias`/
/// `operator`/`constant`/`property`/`special-form`/`builtin` declarations.
pub fn declaration_scan(forms: &[SExpr], table: &mut SymbolTable, ids: &mut NodeIdGen) {
    walk(forms, &mut |form| {
        let Some(elems) = form.as_list() else { return };
        let Some(head) = elems.first().and_then(|e| e.as_symbol()) else {
            return;
        };
        let kind = match head {
            "module" => SymbolKind::Module,
            "import" => SymbolKind::Import,
            "export" => SymbolKind::Export,
            "namespace" => SymbolKind::Namespace,
            "alias" => SymbolKind::Alias,
            "operator" => SymbolKind::Operator,
            "constant" => SymbolKind::Constant,
            "property" => SymbolKind::Property,
            "special-form" => SymbolKind::SpecialForm,
            "builtin" => SymbolKind::Builtin,
            _ => return,
        };
        let Some(name) = elems.get(1).and_then(|e| e.as_symbol()) else {
            return;
        };
        let mut sym = Symbol::new(name.to_string(), kind, Scope::Module, ids.next());
        sym.position = form.position.clone();
        match head {
            "export" => sym.is_exported = true,
            "import" => {
                sym.is_imported = true;
                sym.source_module = elems.get(3).and_then(string_literal).map(str::to_string);
            }
            "alias" => sym.alias_of = elems.get(2).and_then(|e| e.as_symbol()).map(str::to_string),
            _ => {}
        }
        table.define(sym);
    });
}
