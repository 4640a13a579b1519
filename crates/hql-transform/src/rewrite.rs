//! Phase 6 of the syntax transformer (spec.md §4.3): the recursive rewrite
//! pass that turns surface sugar into canonical S-expressions.

use hql_common::{Position, TransformError, TransformErrorKind};
use hql_parser::{Literal, SExpr, SExprKind};
use hql_symbols::{SymbolKind, SymbolTable};

use crate::scan::EnumRegistry;

const PHASE: &str = "rewrite";

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
}

fn bad(kind: TransformErrorKind, node: &SExpr, detail: &str) -> TransformError {
    TransformError {
        kind,
        phase: PHASE.to_string(),
        position: node.position.clone().unwrap_or_else(no_position),
        detail: Some(detail.to_string()),
    }
}

/// Rewrite every top-level form, accumulating (rather than aborting on)
/// per-form errors, per spec.md §7's transformer propagation policy.
pub fn rewrite_program(
    forms: &[SExpr],
    table: &SymbolTable,
    enums: &EnumRegistry,
) -> (Vec<SExpr>, Vec<TransformError>) {
    let mut out = Vec::with_capacity(forms.len());
    let mut errors = Vec::new();
    for form in forms {
        match rewrite_node(form, table, enums) {
            Ok(rewritten) => out.push(rewritten),
            Err(e) => {
                errors.push(e);
                out.push(form.clone());
            }
        }
    }
    (out, errors)
}

fn is_dot_symbol(e: &SExpr) -> bool {
    e.as_symbol().is_some_and(|s| s.len() > 1 && s.starts_with('.'))
}

fn rewrite_node(node: &SExpr, table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    match &node.kind {
        SExprKind::Literal(_) => Ok(node.clone()),
        SExprKind::Symbol(name) => Ok(rewrite_dot_shorthand(node, name, None, enums)),
        SExprKind::List(elems) => rewrite_list(node, elems, table, enums),
    }
}

/// `.caseName` resolves to `EnumName.caseName` when exactly one enum
/// declares the case; `preferred_enum` (the other side's declared type in
/// an equality comparison) breaks ties when more than one enum matches.
fn rewrite_dot_shorthand(node: &SExpr, name: &str, preferred_enum: Option<&str>, enums: &EnumRegistry) -> SExpr {
    if !(name.len() > 1 && name.starts_with('.')) {
        return node.clone();
    }
    let case = &name[1..];
    let Some(candidates) = enums.get(case) else {
        return node.clone();
    };
    let chosen = if let Some(preferred) = preferred_enum {
        candidates.iter().find(|e| e.as_str() == preferred).or(candidates.first())
    } else {
        candidates.first()
    };
    match chosen {
        Some(enum_name) => SExpr::symbol(format!("{enum_name}.{case}"), node.position.clone()),
        None => node.clone(),
    }
}

fn rewrite_list(node: &SExpr, elems: &[SExpr], table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    if elems.is_empty() {
        return Ok(node.clone());
    }
    let head = elems[0].as_symbol();

    match head {
        Some("let") => return rewrite_let(node, elems, table, enums),
        Some("fx") => return rewrite_fx(node, elems, table, enums),
        Some("fn") => return rewrite_fn(node, elems, table, enums),
        Some("=") if elems.len() == 3 && (is_dot_symbol(&elems[1]) || is_dot_symbol(&elems[2])) => {
            return rewrite_equality(node, elems, table, enums);
        }
        _ => {}
    }

    if elems.len() >= 2 && is_dot_symbol(&elems[1]) {
        return rewrite_dot_chain(node, elems, table, enums);
    }

    if elems.len() == 2 {
        if let Some(rewritten) = rewrite_collection_access(node, elems, table, enums)? {
            return Ok(rewritten);
        }
    }

    let mut out = Vec::with_capacity(elems.len());
    for e in elems {
        out.push(rewrite_node(e, table, enums)?);
    }
    Ok(SExpr::list(out, node.position.clone()))
}

fn declared_type(table: &SymbolTable, name: &str) -> Option<String> {
    table.lookup(name).and_then(|s| s.ty.clone())
}

/// `(= x .case)` / `(= .case x)`: resolve the dot side against the other
/// side's declared type when ambiguous, otherwise first match wins.
fn rewrite_equality(
    node: &SExpr,
    elems: &[SExpr],
    table: &SymbolTable,
    enums: &EnumRegistry,
) -> Result<SExpr, TransformError> {
    let (dot_idx, other_idx) = if is_dot_symbol(&elems[1]) { (1, 2) } else { (2, 1) };
    let preferred = elems[other_idx].as_symbol().and_then(|n| declared_type(table, n));
    let dot_name = elems[dot_idx].as_symbol().unwrap_or_default();
    let rewritten_dot = rewrite_dot_shorthand(&elems[dot_idx], dot_name, preferred.as_deref(), enums);
    let other_rewritten = rewrite_node(&elems[other_idx], table, enums)?;

    let mut out = vec![elems[0].clone()];
    if dot_idx == 1 {
        out.push(rewritten_dot);
        out.push(other_rewritten);
    } else {
        out.push(other_rewritten);
        out.push(rewritten_dot);
    }
    Ok(SExpr::list(out, node.position.clone()))
}

/// `(obj .m1 a... .m2 b...)`: each dot segment becomes the receiver of the
/// next, `(method-call recv "m" args...)` when it has arguments, else
/// `(js-method recv "m")`.
fn rewrite_dot_chain(node: &SExpr, elems: &[SExpr], table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    let pos = node.position.clone();
    let mut receiver = rewrite_node(&elems[0], table, enums)?;
    let mut i = 1;
    while i < elems.len() {
        let seg_name = elems[i]
            .as_symbol()
            .ok_or_else(|| bad(TransformErrorKind::NodeTransformFailure, &elems[i], "expected a dot-segment symbol"))?
            .trim_start_matches('.')
            .to_string();
        i += 1;
        let mut args = Vec::new();
        while i < elems.len() && !is_dot_symbol(&elems[i]) {
            args.push(rewrite_node(&elems[i], table, enums)?);
            i += 1;
        }
        receiver = if args.is_empty() {
            SExpr::list(
                vec![
                    SExpr::symbol("js-method", pos.clone()),
                    receiver,
                    SExpr::literal(Literal::String(seg_name), pos.clone()),
                ],
                pos.clone(),
            )
        } else {
            let mut call = vec![
                SExpr::symbol("method-call", pos.clone()),
                receiver,
                SExpr::literal(Literal::String(seg_name), pos.clone()),
            ];
            call.extend(args);
            SExpr::list(call, pos.clone())
        };
    }
    Ok(receiver)
}

/// `(name idx)` where `name` is a known variable of collection type:
/// `Set` -> `(js-call (js-call Array "from" name) "at" idx)`,
/// `Map` -> `(js-call name "get" idx)`,
/// `Array`/unknown -> `(js-get name idx)`.
fn rewrite_collection_access(
    node: &SExpr,
    elems: &[SExpr],
    table: &SymbolTable,
    enums: &EnumRegistry,
) -> Result<Option<SExpr>, TransformError> {
    let Some(name) = elems[0].as_symbol() else { return Ok(None) };
    let Some(sym) = table.lookup(name) else { return Ok(None) };
    if sym.kind != SymbolKind::Variable {
        return Ok(None);
    }
    let pos = node.position.clone();
    let name_node = elems[0].clone();
    let idx = rewrite_node(&elems[1], table, enums)?;
    let rewritten = match sym.ty.as_deref() {
        Some("Set") => SExpr::list(
            vec![
                SExpr::symbol("js-call", pos.clone()),
                SExpr::list(
                    vec![
                        SExpr::symbol("js-call", pos.clone()),
                        SExpr::symbol("Array", pos.clone()),
                        SExpr::literal(Literal::String("from".to_string()), pos.clone()),
                        name_node.clone(),
                    ],
                    pos.clone(),
                ),
                SExpr::literal(Literal::String("at".to_string()), pos.clone()),
                idx,
            ],
            pos,
        ),
        Some("Map") => SExpr::list(
            vec![
                SExpr::symbol("js-call", pos.clone()),
                name_node,
                SExpr::literal(Literal::String("get".to_string()), pos.clone()),
                idx,
            ],
            pos,
        ),
        Some("Array") | Some("Unknown") | None => {
            SExpr::list(vec![SExpr::symbol("js-get", pos.clone()), name_node, idx], pos)
        }
        _ => return Ok(None),
    };
    Ok(Some(rewritten))
}

/// `(let name value)` or `(let (n1 v1 ...) body...)`; any other shape is
/// fatal.
fn rewrite_let(node: &SExpr, elems: &[SExpr], table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    if elems.len() < 3 {
        return Err(bad(TransformErrorKind::BadLet, node, "expected (let name value) or (let (bindings...) body...)"));
    }
    let mut out = vec![elems[0].clone()];
    match &elems[1].kind {
        SExprKind::Symbol(_) => {
            out.push(elems[1].clone());
            for rest in &elems[2..] {
                out.push(rewrite_node(rest, table, enums)?);
            }
        }
        SExprKind::List(bindings) => {
            let mut rewritten_bindings = Vec::with_capacity(bindings.len());
            for binding in bindings {
                let pair = binding
                    .as_list()
                    .ok_or_else(|| bad(TransformErrorKind::BadLet, binding, "binding must be (name value)"))?;
                if pair.len() != 2 || pair[0].as_symbol().is_none() {
                    return Err(bad(TransformErrorKind::BadLet, binding, "binding must be (name value)"));
                }
                let value = rewrite_node(&pair[1], table, enums)?;
                rewritten_bindings.push(SExpr::list(vec![pair[0].clone(), value], binding.position.clone()));
            }
            out.push(SExpr::list(rewritten_bindings, elems[1].position.clone()));
            for body_form in &elems[2..] {
                out.push(rewrite_node(body_form, table, enums)?);
            }
        }
        _ => return Err(bad(TransformErrorKind::BadLet, node, "expected a name or a binding list")),
    }
    Ok(SExpr::list(out, node.position.clone()))
}

/// `(fx name (params...) -> ReturnType body...)`, return type mandatory;
/// `[ElementType]` return types rewrite to `Array<ElementType>`.
fn rewrite_fx(node: &SExpr, elems: &[SExpr], table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    rewrite_callable(node, elems, table, enums, TransformErrorKind::BadFxForm, true)
}

/// `(fn name (params...) [-> ReturnType] body...)`, return type optional.
fn rewrite_fn(node: &SExpr, elems: &[SExpr], table: &SymbolTable, enums: &EnumRegistry) -> Result<SExpr, TransformError> {
    rewrite_callable(node, elems, table, enums, TransformErrorKind::BadFnForm, false)
}

fn rewrite_callable(
    node: &SExpr,
    elems: &[SExpr],
    table: &SymbolTable,
    enums: &EnumRegistry,
    error_kind: TransformErrorKind,
    arrow_required: bool,
) -> Result<SExpr, TransformError> {
    if elems.len() < 3 || elems[1].as_symbol().is_none() || elems[2].as_list().is_none() {
        return Err(bad(error_kind, node, "expected (name (params...) [-> ReturnType] body...)"));
    }
    let arrow_idx = elems.iter().position(|e| e.is_symbol("->"));
    if arrow_required && arrow_idx.is_none() {
        return Err(bad(error_kind, node, "missing `->` return type"));
    }

    let mut out = vec![elems[0].clone(), elems[1].clone(), elems[2].clone()];
    let body_start = if let Some(idx) = arrow_idx {
        let return_type = elems.get(idx + 1).ok_or_else(|| bad(error_kind.clone(), node, "missing return type after `->`"))?;
        out.push(elems[idx].clone());
        out.push(rewrite_array_return_type(return_type));
        idx + 2
    } else {
        3
    };
    for body_form in &elems[body_start..] {
        out.push(rewrite_node(body_form, table, enums)?);
    }
    Ok(SExpr::list(out, node.position.clone()))
}

/// The parser desugars `[ElementType]` to `(vector ElementType)`; recognize
/// that shape in return-type position and rewrite it to `Array<ElementType>`.
fn rewrite_array_return_type(node: &SExpr) -> SExpr {
    match &node.kind {
        SExprKind::List(elems) if elems.len() == 2 && elems[0].is_symbol("vector") => {
            if let Some(inner) = elems[1].as_symbol() {
                return SExpr::symbol(format!("Array<{inner}>"), node.position.clone());
            }
            node.clone()
        }
        _ => node.clone(),
    }
}
