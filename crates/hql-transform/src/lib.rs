//! The syntax transformer (spec.md §4.3): desugars surface HQL forms into a
//! canonical S-expression vector while populating a fresh symbol table.

mod rewrite;
mod scan;

pub use scan::EnumRegistry;

use hql_common::TransformError;
use hql_parser::SExpr;
use hql_symbols::{NodeIdGen, SymbolTable};

pub struct TransformResult {
    pub forms: Vec<SExpr>,
    pub symbols: SymbolTable,
    pub enums: EnumRegistry,
    pub errors: Vec<TransformError>,
}

/// Run phases 1-6 over `forms`, producing the canonical program and a fresh
/// symbol table. Per-form rewrite errors are accumulated rather than
/// aborting the whole pass (spec.md §7).
pub fn transform(forms: &[SExpr]) -> TransformResult {
    let mut table = SymbolTable::new_global();
    let mut ids = NodeIdGen::new();
    let mut enums = EnumRegistry::default();

    scan::enum_scan(forms, &mut table, &mut ids, &mut enums);
    scan::type_scan(forms, &mut table, &mut ids);
    scan::callable_scan(forms, &mut table, &mut ids);
    scan::binding_scan(forms, &mut table, &mut ids);
    scan::declaration_scan(forms, &mut table, &mut ids);

    let (rewritten, errors) = rewrite::rewrite_program(forms, &table, &enums);

    TransformResult {
        forms: rewritten,
        symbols: table,
        enums,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_common::position::SourceRegistry;
    use hql_parser::parse_source;
    use hql_symbols::SymbolKind;

    fn parse_all(src: &str) -> Vec<SExpr> {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1
    }

    #[test]
    fn enum_scan_registers_enum_and_cases() {
        let forms = parse_all("(enum Shape (case Circle) (case Square))");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let shape = result.symbols.lookup("Shape").unwrap();
        assert_eq!(shape.kind, SymbolKind::Enum);
        assert_eq!(shape.cases.as_ref().unwrap(), &vec!["Circle".to_string(), "Square".to_string()]);
        let circle = result.symbols.lookup("Circle").unwrap();
        assert_eq!(circle.kind, SymbolKind::EnumCase);
        assert_eq!(circle.parent.as_deref(), Some("Shape"));
    }

    #[test]
    fn dot_shorthand_resolves_against_single_enum() {
        let forms = parse_all("(enum Shape (case Circle)) (= x .Circle)");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let eq = result.forms[1].as_list().unwrap();
        assert_eq!(eq[2].as_symbol(), Some("Shape.Circle"));
    }

    #[test]
    fn dot_chain_rewrites_to_nested_method_calls() {
        let forms = parse_all("(arr .filter f .map g)");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let outer = result.forms[0].as_list().unwrap();
        assert_eq!(outer[0].as_symbol(), Some("method-call"));
        assert_eq!(outer[2].to_canonical_string(), "\"map\"");
        let inner = outer[1].as_list().unwrap();
        assert_eq!(inner[0].as_symbol(), Some("method-call"));
        assert_eq!(inner[2].to_canonical_string(), "\"filter\"");
    }

    #[test]
    fn collection_access_rewrites_by_inferred_type() {
        let forms = parse_all("(let xs (vector 1 2 3)) (xs 0)");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let access = result.forms[1].as_list().unwrap();
        assert_eq!(access[0].as_symbol(), Some("js-get"));
    }

    #[test]
    fn set_collection_access_rewrites_to_array_from_at() {
        let forms = parse_all("(let s (hash-set 1 2)) (s 0)");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let access = result.forms[1].as_list().unwrap();
        assert_eq!(access[0].as_symbol(), Some("js-call"));
        assert_eq!(access[2].to_canonical_string(), "\"at\"");
    }

    #[test]
    fn fx_without_return_type_is_bad_fx_form() {
        let forms = parse_all("(fx add (a b) (+ a b))");
        let result = transform(&forms);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].kind,
            hql_common::TransformErrorKind::BadFxForm
        );
    }

    #[test]
    fn fx_array_return_type_rewrites_to_generic() {
        let forms = parse_all("(fx items () -> [Number] (vector))");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let fx = result.forms[0].as_list().unwrap();
        assert_eq!(fx[4].as_symbol(), Some("Array<Number>"));
    }

    #[test]
    fn malformed_let_is_an_error() {
        let forms = parse_all("(let 1 2)");
        let result = transform(&forms);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, hql_common::TransformErrorKind::BadLet);
    }

    /// spec.md §3 invariant: "a symbol marked `is_imported` always has
    /// `source_module` set".
    #[test]
    fn import_symbol_records_its_source_module() {
        let forms = parse_all(r#"(import util from "./util.hql")"#);
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let util = result.symbols.lookup("util").unwrap();
        assert!(util.is_imported);
        assert_eq!(util.source_module.as_deref(), Some("./util.hql"));
    }

    #[test]
    fn callable_scan_records_params_and_return_type() {
        let forms = parse_all("(fx add (a b) -> Number (+ a b))");
        let result = transform(&forms);
        assert!(result.errors.is_empty());
        let add = result.symbols.lookup("add").unwrap();
        assert_eq!(add.kind, SymbolKind::Fx);
        assert_eq!(add.return_type.as_deref(), Some("Number"));
        assert_eq!(add.params.as_ref().unwrap().len(), 2);
    }
}
