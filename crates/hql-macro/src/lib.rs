//! Hygienic macro expander for the HQL compiler (spec.md §4.4): registers
//! `defmacro`/`macro` definitions into an [`Environment`]'s macro registry,
//! then repeatedly rewrites a program until no macro call remains (a fixed
//! point), bounded by a per-call-site recursion depth and a program-wide
//! iteration count, with expansions cached by the canonical string form of
//! the call site.

mod definition;
mod eval;
pub mod gensym;
mod quasiquote;

pub use definition::{is_macro_definition, MacroDef};

use std::collections::HashMap;
use std::rc::Rc;

use hql_common::{LruCache, MacroError, MacroErrorKind};
use hql_parser::{SExpr, SExprKind};

use hql_env::{Environment, Value};

const CALL_SITE_RECURSION_LIMIT: usize = 100;
const PROGRAM_ITERATION_LIMIT: usize = 100;
const EXPANSION_CACHE_CAPACITY: usize = 5000;

/// Register every `defmacro`/`macro` form in `forms` into `env`'s macro
/// registry, keyed to `file` for module-scoped visibility. Returns the
/// program with definition forms removed.
pub fn register_definitions(
    forms: Vec<SExpr>,
    env: &mut Environment,
    file: &str,
) -> Result<Vec<SExpr>, MacroError> {
    let mut rest = Vec::with_capacity(forms.len());
    for form in forms {
        if definition::is_macro_definition(&form) {
            let def = definition::parse(&form)?;
            install(def, env, file);
        } else {
            rest.push(form);
        }
    }
    Ok(rest)
}

fn install(def: MacroDef, env: &mut Environment, file: &str) {
    let params = def.params;
    let rest_param = def.rest_param;
    let body = def.body;
    let name = def.name.clone();
    let is_system = def.is_system;

    let mut hygiene = HashMap::new();
    for form in &body {
        quasiquote::collect_hygiene_names(form, &mut hygiene);
    }

    let mac_name = name.clone();
    let f: hql_env::MacroFn = Rc::new(move |args: &[SExpr], env: &mut Environment| {
        invoke(&mac_name, &params, rest_param.as_deref(), &body, &hygiene, args, env)
    });

    if is_system {
        env.define_system_macro(name, f);
    } else {
        env.define_module_macro(file, name, f);
    }
}

fn invoke(
    name: &str,
    params: &[String],
    rest_param: Option<&str>,
    body: &[SExpr],
    hygiene: &HashMap<String, String>,
    args: &[SExpr],
    env: &mut Environment,
) -> Result<SExpr, MacroError> {
    let min_args = params.len();
    if args.len() < min_args || (rest_param.is_none() && args.len() > min_args) {
        return Err(MacroError {
            macro_name: name.to_string(),
            kind: MacroErrorKind::Arity {
                expected: min_args,
                found: args.len(),
            },
            position: args
                .first()
                .and_then(|a| a.position.clone())
                .unwrap_or_else(|| hql_common::Position::new(std::sync::Arc::from(""), 1, 1, 0)),
        });
    }

    let mut child = std::mem::replace(env, Environment::new_global()).child();
    for (param, arg) in params.iter().zip(args) {
        child.define(param.clone(), Value::SExpr(arg.clone()));
    }
    if let Some(rest) = rest_param {
        let rest_args = args[min_args..].to_vec();
        child.define(
            rest.to_string(),
            Value::SExpr(SExpr::list(rest_args, None)),
        );
    }

    let result = (|| {
        let mut last = Value::SExpr(SExpr::list(vec![], None));
        let mut produced = Vec::new();
        for form in body {
            last = eval::eval(form, &mut child, hygiene, name)?;
            produced.push(last.clone());
        }
        if produced.len() <= 1 {
            match last {
                Value::SExpr(e) => Ok(e),
                Value::Nil => Ok(SExpr::literal(hql_parser::Literal::Nil, None)),
                Value::Native(_) => Err(MacroError {
                    macro_name: name.to_string(),
                    kind: MacroErrorKind::QuasiquoteContext,
                    position: hql_common::Position::new(std::sync::Arc::from(""), 1, 1, 0),
                }),
            }
        } else {
            let mut out = vec![SExpr::symbol("begin", None)];
            for v in produced {
                match v {
                    Value::SExpr(e) => out.push(e),
                    Value::Nil => out.push(SExpr::literal(hql_parser::Literal::Nil, None)),
                    Value::Native(_) => {
                        return Err(MacroError {
                            macro_name: name.to_string(),
                            kind: MacroErrorKind::QuasiquoteContext,
                            position: hql_common::Position::new(std::sync::Arc::from(""), 1, 1, 0),
                        })
                    }
                }
            }
            Ok(SExpr::list(out, None))
        }
    })();
    *env = child.pop();
    result
}

/// Expand every macro call in `form` to a fixed point, bounded by
/// [`CALL_SITE_RECURSION_LIMIT`].
fn expand_form(
    form: &SExpr,
    env: &mut Environment,
    cache: &mut LruCache<String, SExpr>,
    depth: usize,
) -> Result<SExpr, MacroError> {
    if depth > CALL_SITE_RECURSION_LIMIT {
        return Err(MacroError {
            macro_name: form.as_list().and_then(|e| e[0].as_symbol()).unwrap_or("").to_string(),
            kind: MacroErrorKind::RecursionLimit,
            position: form
                .position
                .clone()
                .unwrap_or_else(|| hql_common::Position::new(std::sync::Arc::from(""), 1, 1, 0)),
        });
    }

    let elems = match &form.kind {
        SExprKind::List(elems) => elems,
        _ => return Ok(form.clone()),
    };

    if let Some(head) = elems.first().and_then(|e| e.as_symbol()) {
        if env.has_macro(head) {
            let key = form.to_canonical_string();
            let expanded = if let Some(cached) = cache.get(&key) {
                cached.clone()
            } else {
                let mac = env.get_macro(head).expect("checked has_macro above");
                let expanded = mac(&elems[1..], env).map_err(|e| MacroError {
                    macro_name: head.to_string(),
                    ..e
                })?;
                cache.put(key, expanded.clone());
                expanded
            };
            return expand_form(&expanded, env, cache, depth + 1);
        }
    }

    let mut out = Vec::with_capacity(elems.len());
    for e in elems {
        out.push(expand_form(e, env, cache, depth + 1)?);
    }
    Ok(SExpr::list(out, form.position.clone()))
}

/// Expand every macro call across `program` to a fixed point: repeat a full
/// pass until nothing changes, bounded by [`PROGRAM_ITERATION_LIMIT`].
/// `defmacro`/`macro` definition forms are registered as a side effect and
/// removed from the returned program.
pub fn expand_program(
    program: Vec<SExpr>,
    env: &mut Environment,
    file: &str,
) -> Result<Vec<SExpr>, MacroError> {
    let mut forms = register_definitions(program, env, file)?;
    let mut cache = LruCache::new(EXPANSION_CACHE_CAPACITY);

    for _ in 0..PROGRAM_ITERATION_LIMIT {
        let mut changed = false;
        let mut next = Vec::with_capacity(forms.len());
        for form in &forms {
            let expanded = expand_form(form, env, &mut cache, 0)?;
            if !hql_parser::structurally_eq(&expanded, form) {
                changed = true;
            }
            next.push(expanded);
        }
        forms = next;
        if !changed {
            return Ok(forms);
        }
    }
    Ok(forms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_common::position::SourceRegistry;
    use hql_parser::parse_source;

    fn parse_all(src: &str) -> Vec<SExpr> {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1
    }

    #[test]
    fn simple_macro_expands_to_its_body() {
        let forms = parse_all("(defmacro twice (x) `(+ ~x ~x)) (twice 5)");
        let mut env = Environment::new_global();
        let expanded = expand_program(forms, &mut env, "t.hql").unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(
            expanded[0].to_canonical_string(),
            "(+ 5 5)"
        );
    }

    #[test]
    fn recursive_macro_calls_reach_a_fixed_point() {
        let forms = parse_all(
            "(defmacro id2 (x) `(id1 ~x)) (defmacro id1 (x) ~x) (id2 7)",
        );
        let mut env = Environment::new_global();
        let expanded = expand_program(forms, &mut env, "t.hql").unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].to_canonical_string(), "7");
    }

    #[test]
    fn hygienic_rename_protects_caller_binding() {
        let forms = parse_all(
            "(defmacro swap (a b) `(let t ~a) (set! ~a ~b) (set! ~b t)) (swap x y)",
        );
        let mut env = Environment::new_global();
        let expanded = expand_program(forms, &mut env, "t.hql").unwrap();
        assert_eq!(expanded.len(), 1);
        let begin = expanded[0].as_list().unwrap();
        assert_eq!(begin[0].as_symbol(), Some("begin"));
        let let_form = begin[1].as_list().unwrap();
        let gensym_name = let_form[1].as_symbol().unwrap().to_string();
        assert_ne!(gensym_name, "t");
        let last_set = begin[3].as_list().unwrap();
        assert_eq!(last_set[2].as_symbol(), Some(gensym_name.as_str()));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let forms = parse_all("(defmacro one (x) ~x) (one 1 2)");
        let mut env = Environment::new_global();
        let err = expand_program(forms, &mut env, "t.hql").unwrap_err();
        assert!(matches!(err.kind, MacroErrorKind::Arity { .. }));
    }

    #[test]
    fn variadic_rest_parameter_binds_remaining_args_as_a_list() {
        let forms = parse_all("(defmacro first-of (a & rest) ~a) (first-of 1 2 3)");
        let mut env = Environment::new_global();
        let expanded = expand_program(forms, &mut env, "t.hql").unwrap();
        assert_eq!(expanded[0].to_canonical_string(), "1");
    }
}
