//! Quasiquote/unquote/unquote-splicing expansion and template-local hygiene
//! renaming (spec.md §4.4).
//!
//! Hygiene works by scanning the *unexpanded* template for names introduced
//! by a template-local `let` (skipping subtrees reachable only through
//! `unquote`/`unquote-splicing`, which are caller-supplied, not template
//! text) and gensym-renaming every bare occurrence of such a name in the
//! produced expansion. Parameter references are substituted away entirely
//! by `unquote` and so never need renaming.

use std::collections::HashMap;

use hql_common::{MacroError, MacroErrorKind, Position};
use hql_parser::{Literal, SExpr, SExprKind};

use crate::eval::eval;
use hql_env::{Environment, Value};

fn is_unquote_form(elems: &[SExpr], name: &str) -> bool {
    elems.first().is_some_and(|e| e.is_symbol(name))
}

/// Collect names bound by a template-local `let`, stopping at
/// unquote/unquote-splicing boundaries.
pub fn collect_hygiene_names(template: &SExpr, out: &mut HashMap<String, String>) {
    if let SExprKind::List(elems) = &template.kind {
        if is_unquote_form(elems, "unquote") || is_unquote_form(elems, "unquote-splicing") {
            return;
        }
        if elems.first().is_some_and(|e| e.is_symbol("let")) && elems.len() >= 2 {
            match &elems[1].kind {
                SExprKind::Symbol(name) => {
                    out.entry(name.clone()).or_insert_with(|| crate::gensym::gensym(name));
                }
                SExprKind::List(bindings) => {
                    for binding in bindings {
                        if let Some(pair) = binding.as_list() {
                            if let Some(name) = pair.first().and_then(|e| e.as_symbol()) {
                                out.entry(name.to_string())
                                    .or_insert_with(|| crate::gensym::gensym(name));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        for e in elems {
            collect_hygiene_names(e, out);
        }
    }
}

fn value_to_sexpr(v: Value, name: &str, position: &Position) -> Result<SExpr, MacroError> {
    match v {
        Value::SExpr(e) => Ok(e),
        Value::Nil => Ok(SExpr::literal(Literal::Nil, Some(position.clone()))),
        Value::Native(_) => Err(MacroError {
            macro_name: name.to_string(),
            kind: MacroErrorKind::QuasiquoteContext,
            position: position.clone(),
        }),
    }
}

/// Expand a quasiquoted `template`, substituting `unquote`/`unquote-splicing`
/// by evaluating them in `env`, and renaming any bare symbol present in
/// `rename` to its hygienic gensym.
pub fn expand(
    template: &SExpr,
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
) -> Result<SExpr, MacroError> {
    match &template.kind {
        SExprKind::Symbol(name) => {
            if let Some(g) = rename.get(name) {
                return Ok(SExpr::symbol(g.clone(), template.position.clone()));
            }
            Ok(template.clone())
        }
        SExprKind::Literal(_) => Ok(template.clone()),
        SExprKind::List(elems) => {
            if is_unquote_form(elems, "unquote") {
                if elems.len() != 2 {
                    return Err(MacroError {
                        macro_name: macro_name.to_string(),
                        kind: MacroErrorKind::QuasiquoteContext,
                        position: template.position.clone().unwrap_or_else(no_position),
                    });
                }
                let v = eval(&elems[1], env, rename, macro_name)?;
                let pos = template.position.clone().unwrap_or_else(no_position);
                return value_to_sexpr(v, macro_name, &pos);
            }
            if is_unquote_form(elems, "unquote-splicing") {
                return Err(MacroError {
                    macro_name: macro_name.to_string(),
                    kind: MacroErrorKind::QuasiquoteContext,
                    position: template.position.clone().unwrap_or_else(no_position),
                });
            }
            let mut out = Vec::with_capacity(elems.len());
            for e in elems {
                if let SExprKind::List(inner) = &e.kind {
                    if is_unquote_form(inner, "unquote-splicing") {
                        let pos = e.position.clone().unwrap_or_else(no_position);
                        let v = eval(&inner[1], env, rename, macro_name)?;
                        match v {
                            Value::SExpr(SExpr {
                                kind: SExprKind::List(items),
                                ..
                            }) => out.extend(items),
                            other => {
                                eprintln!(
                                    "warning: unquote-splicing of a non-list value in macro `{macro_name}` at {pos}; spliced as a single element"
                                );
                                out.push(value_to_sexpr(other, macro_name, &pos)?);
                            }
                        }
                        continue;
                    }
                }
                out.push(expand(e, env, rename, macro_name)?);
            }
            Ok(SExpr::list(out, template.position.clone()))
        }
    }
}

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
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
    fn collects_let_bound_name_skipping_unquote() {
        let tmpl = parse_one("`(let t ~a)");
        let quoted = match &tmpl.kind {
            SExprKind::List(e) => e[1].clone(),
            _ => panic!("expected quasiquote form"),
        };
        let mut names = HashMap::new();
        collect_hygiene_names(&quoted, &mut names);
        assert!(names.contains_key("t"));
        assert!(!names.contains_key("a"));
    }

    #[test]
    fn expand_substitutes_unquote_and_renames_hygienic_symbol() {
        let mut env = Environment::new_global();
        env.define("a", Value::SExpr(SExpr::symbol("x", None)));
        let tmpl = parse_one("`(let t ~a)");
        let quoted = match &tmpl.kind {
            SExprKind::List(e) => e[1].clone(),
            _ => panic!(),
        };
        let mut rename = HashMap::new();
        collect_hygiene_names(&quoted, &mut rename);
        let expanded = expand(&quoted, &mut env, &rename, "swap").unwrap();
        let elems = expanded.as_list().unwrap();
        assert_eq!(elems[0].as_symbol(), Some("let"));
        assert_ne!(elems[1].as_symbol(), Some("t"));
        assert_eq!(elems[2].as_symbol(), Some("x"));
    }
}
