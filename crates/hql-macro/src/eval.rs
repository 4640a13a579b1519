//! Pure evaluator for macro bodies (spec.md §4.4): literals, symbol lookup,
//! `quote`/`quasiquote`/`if`/`cond`/`let`/`lambda`, recursive macro calls, and
//! calls to built-in functions. Evaluation is strict everywhere except the
//! branches of `if`/`cond` and the body of `quote`/`quasiquote`.

use std::collections::HashMap;

use hql_common::{MacroError, MacroErrorKind, Position};
use hql_parser::{Literal, SExpr, SExprKind};

use hql_env::{Environment, Value};

fn truthy(v: &Value) -> bool {
    match v {
        Value::Nil => false,
        Value::SExpr(e) => !matches!(
            e.kind,
            SExprKind::Literal(Literal::Bool(false)) | SExprKind::Literal(Literal::Nil)
        ),
        Value::Native(_) => true,
    }
}

fn not_found(macro_name: &str, name: &str, position: &Position) -> MacroError {
    MacroError {
        macro_name: format!("{macro_name} (referencing `{name}`)"),
        kind: MacroErrorKind::NotFound,
        position: position.clone(),
    }
}

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
}

pub fn eval(
    expr: &SExpr,
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
) -> Result<Value, MacroError> {
    match &expr.kind {
        SExprKind::Literal(_) => Ok(Value::SExpr(expr.clone())),
        SExprKind::Symbol(name) => env
            .lookup(name)
            .ok_or_else(|| not_found(macro_name, name, &expr.position.clone().unwrap_or_else(no_position))),
        SExprKind::List(elems) => eval_list(expr, elems, env, rename, macro_name),
    }
}

fn eval_list(
    expr: &SExpr,
    elems: &[SExpr],
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
) -> Result<Value, MacroError> {
    let position = expr.position.clone().unwrap_or_else(no_position);
    if elems.is_empty() {
        return Ok(Value::SExpr(expr.clone()));
    }
    if let Some(head) = elems[0].as_symbol() {
        match head {
            "quote" => {
                return Ok(Value::SExpr(elems.get(1).cloned().unwrap_or(expr.clone())));
            }
            "quasiquote" => {
                let inner = elems.get(1).ok_or_else(|| MacroError {
                    macro_name: macro_name.to_string(),
                    kind: MacroErrorKind::BadParam,
                    position: position.clone(),
                })?;
                return Ok(Value::SExpr(crate::quasiquote::expand(
                    inner,
                    env,
                    rename,
                    macro_name,
                )?));
            }
            "if" => {
                let cond = eval(&elems[1], env, rename, macro_name)?;
                return if truthy(&cond) {
                    eval(&elems[2], env, rename, macro_name)
                } else if let Some(else_branch) = elems.get(3) {
                    eval(else_branch, env, rename, macro_name)
                } else {
                    Ok(Value::Nil)
                };
            }
            "cond" => {
                for clause in &elems[1..] {
                    let pair = clause.as_list().ok_or_else(|| MacroError {
                        macro_name: macro_name.to_string(),
                        kind: MacroErrorKind::BadParam,
                        position: position.clone(),
                    })?;
                    if pair.first().is_some_and(|e| e.is_symbol("else")) {
                        return eval(&pair[1], env, rename, macro_name);
                    }
                    let test = eval(&pair[0], env, rename, macro_name)?;
                    if truthy(&test) {
                        return eval(&pair[1], env, rename, macro_name);
                    }
                }
                return Ok(Value::Nil);
            }
            "let" => return eval_let(&elems[1..], env, rename, macro_name),
            "lambda" => {
                return Ok(Value::SExpr(expr.clone()));
            }
            "unquote" | "unquote-splicing" => {
                return Ok(Value::SExpr(crate::quasiquote::expand(
                    expr,
                    env,
                    rename,
                    macro_name,
                )?));
            }
            _ => {
                if let Some(mac) = env.get_macro(head) {
                    let expanded = mac(&elems[1..], env).map_err(|e| MacroError {
                        macro_name: macro_name.to_string(),
                        ..e
                    })?;
                    return Ok(Value::SExpr(expanded));
                }
                // A call to a head that is neither a special form, a macro,
                // nor a bound variable is not executable code -- treat the
                // whole form as a quasiquote template instead (this is what
                // lets a macro body write `(set! ~a ~b)` without an explicit
                // leading backtick).
                if env.lookup(head).is_none() {
                    return Ok(Value::SExpr(crate::quasiquote::expand(
                        expr,
                        env,
                        rename,
                        macro_name,
                    )?));
                }
            }
        }
    }

    let head_val = eval(&elems[0], env, rename, macro_name)?;
    let mut args = Vec::with_capacity(elems.len() - 1);
    for e in &elems[1..] {
        args.push(eval(e, env, rename, macro_name)?);
    }
    apply(&head_val, &args, env, rename, macro_name, &position)
}

fn eval_let(
    rest: &[SExpr],
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
) -> Result<Value, MacroError> {
    if rest.is_empty() {
        return Ok(Value::Nil);
    }
    let mut bindings = Vec::new();
    match &rest[0].kind {
        SExprKind::Symbol(name) => {
            let value = eval(&rest[1], env, rename, macro_name)?;
            bindings.push((name.clone(), value));
            return eval_body(&rest[2..], bindings, env, rename, macro_name);
        }
        SExprKind::List(pairs) => {
            for pair in pairs {
                let elems = pair.as_list().unwrap_or(&[]);
                let name = elems
                    .first()
                    .and_then(|e| e.as_symbol())
                    .ok_or_else(|| MacroError {
                        macro_name: macro_name.to_string(),
                        kind: MacroErrorKind::BadParam,
                        position: pair.position.clone().unwrap_or_else(no_position),
                    })?;
                let value = eval(&elems[1], env, rename, macro_name)?;
                bindings.push((name.to_string(), value));
            }
            eval_body(&rest[1..], bindings, env, rename, macro_name)
        }
        _ => Err(MacroError {
            macro_name: macro_name.to_string(),
            kind: MacroErrorKind::BadParam,
            position: rest[0].position.clone().unwrap_or_else(no_position),
        }),
    }
}

fn eval_body(
    body: &[SExpr],
    bindings: Vec<(String, Value)>,
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
) -> Result<Value, MacroError> {
    let mut child = std::mem::replace(env, Environment::new_global()).child();
    for (name, value) in bindings {
        child.define(name, value);
    }
    let result = (|| {
        let mut last = Value::Nil;
        for form in body {
            last = eval(form, &mut child, rename, macro_name)?;
        }
        Ok(last)
    })();
    *env = child.pop();
    result
}

fn apply(
    head: &Value,
    args: &[Value],
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
    position: &Position,
) -> Result<Value, MacroError> {
    match head {
        Value::Native(f) => f(args, position).map(|v| v).map_err(|ve| MacroError {
            macro_name: format!("{macro_name} ({ve})"),
            kind: MacroErrorKind::BadParam,
            position: position.clone(),
        }),
        Value::SExpr(e) if e.head_is("lambda") => apply_lambda(e, args, env, rename, macro_name, position),
        _ => Err(MacroError {
            macro_name: macro_name.to_string(),
            kind: MacroErrorKind::BadParam,
            position: position.clone(),
        }),
    }
}

fn apply_lambda(
    lambda: &SExpr,
    args: &[Value],
    env: &mut Environment,
    rename: &HashMap<String, String>,
    macro_name: &str,
    position: &Position,
) -> Result<Value, MacroError> {
    let elems = lambda.as_list().unwrap();
    let params = elems
        .get(1)
        .and_then(|e| e.as_list())
        .ok_or_else(|| MacroError {
            macro_name: macro_name.to_string(),
            kind: MacroErrorKind::BadParam,
            position: position.clone(),
        })?;
    if params.len() != args.len() {
        return Err(MacroError {
            macro_name: macro_name.to_string(),
            kind: MacroErrorKind::Arity {
                expected: params.len(),
                found: args.len(),
            },
            position: position.clone(),
        });
    }
    let bindings: Vec<(String, Value)> = params
        .iter()
        .zip(args)
        .filter_map(|(p, v)| p.as_symbol().map(|n| (n.to_string(), v.clone())))
        .collect();
    eval_body(&elems[2..], bindings, env, rename, macro_name)
}
