//! Parsing of the three `import` syntaxes (spec.md §4.6).

use hql_common::{ImportError, ImportErrorKind, Position};
use hql_parser::SExpr;

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// `(import "path")`: bind the whole module under its path.
    Whole,
    /// `(import name from "path")`: bind the whole module under `name`.
    Named(String),
    /// `(import [a b c] from "path")`, each entry optionally `as`-aliased.
    Destructured(Vec<Binding>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub kind: ImportKind,
    pub path: String,
    pub position: Position,
}

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
}

fn string_literal(e: &SExpr) -> Option<&str> {
    match &e.kind {
        hql_parser::SExprKind::Literal(hql_parser::Literal::String(s)) => Some(s),
        _ => None,
    }
}

/// `form` must be `head_is("import")`. Returns `None` if `form` is not an
/// import form at all (caller's responsibility to check first); a
/// malformed import is `ImportErrorKind::UnsupportedType`.
pub fn parse_import(form: &SExpr, source_file: &str) -> Result<ImportSpec, ImportError> {
    let elems = form.as_list().unwrap_or(&[]);
    let position = form.position.clone().unwrap_or_else(no_position);
    let malformed = || ImportError {
        kind: ImportErrorKind::UnsupportedType,
        path: form.to_canonical_string(),
        source_file: source_file.to_string(),
    };

    match elems.len() {
        // (import "path")
        2 => {
            let path = string_literal(&elems[1]).ok_or_else(malformed)?;
            Ok(ImportSpec {
                kind: ImportKind::Whole,
                path: path.to_string(),
                position,
            })
        }
        // (import name from "path") | (import [a b c] from "path")
        4 => {
            if !elems[2].is_symbol("from") {
                return Err(malformed());
            }
            let path = string_literal(&elems[3]).ok_or_else(malformed)?.to_string();
            if let Some(name) = elems[1].as_symbol() {
                return Ok(ImportSpec {
                    kind: ImportKind::Named(name.to_string()),
                    path,
                    position,
                });
            }
            let raw_bindings = elems[1].as_list().ok_or_else(malformed)?;
            // `[a b]` desugars to `(vector a b)`; strip the synthetic head.
            let bindings = match raw_bindings.first() {
                Some(h) if h.is_symbol("vector") => &raw_bindings[1..],
                _ => raw_bindings,
            };
            let parsed = parse_bindings(bindings).ok_or_else(malformed)?;
            Ok(ImportSpec {
                kind: ImportKind::Destructured(parsed),
                path,
                position,
            })
        }
        _ => Err(malformed()),
    }
}

fn parse_bindings(elems: &[SExpr]) -> Option<Vec<Binding>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < elems.len() {
        let name = elems[i].as_symbol()?.to_string();
        if elems.get(i + 1).is_some_and(|e| e.is_symbol("as")) {
            let alias = elems.get(i + 2)?.as_symbol()?.to_string();
            out.push(Binding {
                name,
                alias: Some(alias),
            });
            i += 3;
        } else {
            out.push(Binding { name, alias: None });
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_common::position::SourceRegistry;
    use hql_parser::parse_source;

    fn parse_one(src: &str) -> SExpr {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1.remove(0)
    }

    #[test]
    fn parses_whole_module_import() {
        let form = parse_one("(import \"./util.hql\")");
        let spec = parse_import(&form, "a.hql").unwrap();
        assert_eq!(spec.kind, ImportKind::Whole);
        assert_eq!(spec.path, "./util.hql");
    }

    #[test]
    fn parses_named_import() {
        let form = parse_one("(import util from \"./util.hql\")");
        let spec = parse_import(&form, "a.hql").unwrap();
        assert_eq!(spec.kind, ImportKind::Named("util".to_string()));
    }

    #[test]
    fn parses_destructured_import_with_alias() {
        let form = parse_one("(import [a as x b] from \"./util.hql\")");
        let spec = parse_import(&form, "a.hql").unwrap();
        assert_eq!(
            spec.kind,
            ImportKind::Destructured(vec![
                Binding {
                    name: "a".to_string(),
                    alias: Some("x".to_string())
                },
                Binding {
                    name: "b".to_string(),
                    alias: None
                },
            ])
        );
    }

    #[test]
    fn malformed_import_is_unsupported_type() {
        let form = parse_one("(import)");
        assert_eq!(
            parse_import(&form, "a.hql").unwrap_err().kind,
            ImportErrorKind::UnsupportedType
        );
    }
}
