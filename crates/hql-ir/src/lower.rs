//! Lowers the canonical S-expression program plus its symbol table into an
//! [`IrNode::Program`] (spec.md §4.7).
//!
//! The `loop`/`recur` lowering is the one "notable algorithm" the spec calls
//! out by name: `(loop ((n v) ...) body...)` becomes an IIFE declaring a
//! helper function (name `loop_<n>`) and immediately invoking it with the
//! initial values; `recur` inside the body rewrites to a `return` of a call
//! back into that helper. An id stack tracks the innermost enclosing loop so
//! nested loops target the right helper, and `recur` with an empty stack is
//! a `ValidationError`.

use hql_common::{Position, ValidationError, ValidationErrorKind};
use hql_parser::{Literal, SExpr, SExprKind};
use hql_symbols::SymbolTable;

use crate::node::{IrNode, Param, TypedParam, VarKind};

struct LowerCtx {
    loop_stack: Vec<String>,
    loop_counter: u32,
}

impl LowerCtx {
    fn new() -> Self {
        Self {
            loop_stack: Vec::new(),
            loop_counter: 0,
        }
    }
}

fn no_position() -> Position {
    Position::new(std::sync::Arc::from(""), 1, 1, 0)
}

fn bad_argument(node: &SExpr) -> ValidationError {
    ValidationError {
        kind: ValidationErrorKind::BadArgument,
        position: node.position.clone().unwrap_or_else(no_position),
    }
}

fn string_literal(e: &SExpr) -> Option<&str> {
    match &e.kind {
        SExprKind::Literal(Literal::String(s)) => Some(s),
        _ => None,
    }
}

/// Lowers a whole program: every top-level form becomes zero or more
/// statements (a `let` splices its declaration followed by any trailing
/// body forms).
pub fn lower_program(forms: &[SExpr], table: &SymbolTable) -> Result<IrNode, ValidationError> {
    let mut ctx = LowerCtx::new();
    let body = lower_block(forms, table, &mut ctx)?;
    Ok(IrNode::Program { body })
}

fn lower_block(forms: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<Vec<IrNode>, ValidationError> {
    let mut out = Vec::new();
    for form in forms {
        out.extend(lower_form_to_statements(form, table, ctx)?);
    }
    Ok(out)
}

fn lower_form_to_statements(
    form: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<Vec<IrNode>, ValidationError> {
    if let Some(elems) = form.as_list() {
        match elems.first().and_then(|e| e.as_symbol()) {
            Some("let") => return lower_let(elems, form, table, ctx),
            Some("fn") => return Ok(vec![lower_fn_decl(elems, form, table, ctx)?]),
            Some("fx") => return Ok(vec![lower_fx_decl(elems, form, table, ctx)?]),
            Some("enum") => return Ok(vec![lower_enum_decl(elems, form)?]),
            Some("class") => return Ok(vec![lower_class_decl(elems, form, table, ctx)?]),
            Some("import") => return Ok(vec![lower_import(elems, form)?]),
            Some("export") => return Ok(vec![lower_export(elems, form, table, ctx)?]),
            _ => {}
        }
    }
    Ok(vec![IrNode::ExpressionStatement {
        expression: Box::new(lower_expr(form, table, ctx)?),
    }])
}

fn lower_let(
    elems: &[SExpr],
    node: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<Vec<IrNode>, ValidationError> {
    if elems.len() < 3 {
        return Err(bad_argument(node));
    }
    match &elems[1].kind {
        SExprKind::Symbol(name) => {
            let init = lower_expr(&elems[2], table, ctx)?;
            let decl = IrNode::VariableDeclaration {
                kind: VarKind::Let,
                declarations: vec![IrNode::VariableDeclarator {
                    name: name.clone(),
                    init: Some(Box::new(init)),
                }],
            };
            let mut out = vec![decl];
            out.extend(lower_block(&elems[3..], table, ctx)?);
            Ok(out)
        }
        SExprKind::List(bindings) => {
            let mut declarators = Vec::with_capacity(bindings.len());
            for binding in bindings {
                let pair = binding.as_list().ok_or_else(|| bad_argument(binding))?;
                let name = pair
                    .first()
                    .and_then(|e| e.as_symbol())
                    .ok_or_else(|| bad_argument(binding))?
                    .to_string();
                let value = pair.get(1).ok_or_else(|| bad_argument(binding))?;
                let init = lower_expr(value, table, ctx)?;
                declarators.push(IrNode::VariableDeclarator {
                    name,
                    init: Some(Box::new(init)),
                });
            }
            let decl = IrNode::VariableDeclaration {
                kind: VarKind::Let,
                declarations: declarators,
            };
            let mut out = vec![decl];
            out.extend(lower_block(&elems[2..], table, ctx)?);
            Ok(out)
        }
        _ => Err(bad_argument(node)),
    }
}

fn lower_typed_param(p: &SExpr) -> Result<TypedParam, ValidationError> {
    match &p.kind {
        SExprKind::Symbol(name) => {
            let (n, t) = name.split_once(':').ok_or_else(|| bad_argument(p))?;
            Ok(TypedParam {
                name: n.to_string(),
                ty: t.to_string(),
                default: None,
            })
        }
        SExprKind::List(elems) => {
            let name = elems.first().and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(p))?;
            let ty = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(p))?;
            Ok(TypedParam {
                name: name.to_string(),
                ty: ty.to_string(),
                default: None,
            })
        }
        _ => Err(bad_argument(p)),
    }
}

fn lower_param(p: &SExpr) -> Result<Param, ValidationError> {
    match &p.kind {
        SExprKind::Symbol(name) => {
            let n = name.split(':').next().unwrap_or(name);
            Ok(Param {
                name: n.to_string(),
                default: None,
            })
        }
        SExprKind::List(elems) => {
            let name = elems.first().and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(p))?;
            Ok(Param {
                name: name.to_string(),
                default: None,
            })
        }
        _ => Err(bad_argument(p)),
    }
}

fn lower_fn_decl(
    elems: &[SExpr],
    node: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<IrNode, ValidationError> {
    let name = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(node))?.to_string();
    let param_list = elems.get(2).and_then(|e| e.as_list()).ok_or_else(|| bad_argument(node))?;
    let params = param_list.iter().map(lower_param).collect::<Result<Vec<_>, _>>()?;
    let arrow_idx = elems.iter().position(|e| e.is_symbol("->"));
    let body_start = arrow_idx.map(|i| i + 2).unwrap_or(3);
    let body = lower_body_with_tail(elems.get(body_start..).unwrap_or(&[]), table, ctx)?;
    Ok(IrNode::FnFunctionDeclaration { name, params, body })
}

fn lower_fx_decl(
    elems: &[SExpr],
    node: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<IrNode, ValidationError> {
    let name = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(node))?.to_string();
    let param_list = elems.get(2).and_then(|e| e.as_list()).ok_or_else(|| bad_argument(node))?;
    let params = param_list.iter().map(lower_typed_param).collect::<Result<Vec<_>, _>>()?;
    let arrow_idx = elems.iter().position(|e| e.is_symbol("->")).ok_or_else(|| bad_argument(node))?;
    let return_type = elems
        .get(arrow_idx + 1)
        .and_then(|e| e.as_symbol())
        .ok_or_else(|| bad_argument(node))?
        .to_string();
    let body = lower_body_with_tail(elems.get(arrow_idx + 2..).unwrap_or(&[]), table, ctx)?;
    Ok(IrNode::FxFunctionDeclaration {
        name,
        params,
        return_type,
        body,
    })
}

fn lower_enum_decl(elems: &[SExpr], node: &SExpr) -> Result<IrNode, ValidationError> {
    let raw_name = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(node))?;
    let name = raw_name.split_once(':').map(|(n, _)| n.to_string()).unwrap_or_else(|| raw_name.to_string());
    let mut cases = Vec::new();
    for child in &elems[2..] {
        let Some(case_elems) = child.as_list() else { continue };
        if !case_elems.first().is_some_and(|e| e.is_symbol("case")) {
            continue;
        }
        let case_name = case_elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(child))?;
        let associated_values = case_elems[2..]
            .iter()
            .filter_map(|e| e.as_symbol().map(str::to_string))
            .collect();
        cases.push(IrNode::EnumCase {
            name: case_name.to_string(),
            raw_value: None,
            associated_values,
        });
    }
    Ok(IrNode::EnumDeclaration { name, cases })
}

fn lower_class_decl(
    elems: &[SExpr],
    node: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<IrNode, ValidationError> {
    let name = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(node))?.to_string();
    let mut fields = Vec::new();
    let mut methods = Vec::new();
    for member in &elems[2..] {
        let Some(m) = member.as_list() else { continue };
        match m.first().and_then(|e| e.as_symbol()) {
            Some("field") => {
                let fname = m.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(member))?.to_string();
                let value = m.get(2).map(|v| lower_expr(v, table, ctx)).transpose()?.map(Box::new);
                fields.push(IrNode::ClassField { name: fname, value });
            }
            Some("method") | Some("fn") | Some("fx") => {
                let mname = m.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(member))?.to_string();
                let param_list = m.get(2).and_then(|e| e.as_list()).ok_or_else(|| bad_argument(member))?;
                let params = param_list.iter().map(lower_param).collect::<Result<Vec<_>, _>>()?;
                let arrow_idx = m.iter().position(|e| e.is_symbol("->"));
                let body_start = arrow_idx.map(|i| i + 2).unwrap_or(3);
                let body = lower_body_with_tail(m.get(body_start..).unwrap_or(&[]), table, ctx)?;
                if mname == "constructor" {
                    methods.push(IrNode::ClassConstructor { params, body });
                } else {
                    methods.push(IrNode::ClassMethod { name: mname, params, body });
                }
            }
            _ => {}
        }
    }
    Ok(IrNode::ClassDeclaration { name, fields, methods })
}

fn lower_import(elems: &[SExpr], node: &SExpr) -> Result<IrNode, ValidationError> {
    match elems.len() {
        2 => {
            let path = string_literal(&elems[1]).ok_or_else(|| bad_argument(node))?;
            Ok(IrNode::ImportDeclaration {
                specifiers: vec![],
                source: path.to_string(),
            })
        }
        4 => {
            if !elems[2].is_symbol("from") {
                return Err(bad_argument(node));
            }
            let path = string_literal(&elems[3]).ok_or_else(|| bad_argument(node))?.to_string();
            if let Some(name) = elems[1].as_symbol() {
                return Ok(IrNode::ImportDeclaration {
                    specifiers: vec![IrNode::ImportSpecifier {
                        imported: "*".to_string(),
                        local: name.to_string(),
                    }],
                    source: path,
                });
            }
            let raw = elems[1].as_list().ok_or_else(|| bad_argument(node))?;
            let bindings = match raw.first() {
                Some(h) if h.is_symbol("vector") => &raw[1..],
                _ => raw,
            };
            let mut specifiers = Vec::new();
            let mut i = 0;
            while i < bindings.len() {
                let name = bindings[i].as_symbol().ok_or_else(|| bad_argument(node))?.to_string();
                if bindings.get(i + 1).is_some_and(|e| e.is_symbol("as")) {
                    let alias = bindings
                        .get(i + 2)
                        .and_then(|e| e.as_symbol())
                        .ok_or_else(|| bad_argument(node))?
                        .to_string();
                    specifiers.push(IrNode::ImportSpecifier { imported: name, local: alias });
                    i += 3;
                } else {
                    specifiers.push(IrNode::ImportSpecifier {
                        imported: name.clone(),
                        local: name,
                    });
                    i += 1;
                }
            }
            Ok(IrNode::ImportDeclaration { specifiers, source: path })
        }
        _ => Err(bad_argument(node)),
    }
}

fn lower_export(
    elems: &[SExpr],
    node: &SExpr,
    table: &SymbolTable,
    ctx: &mut LowerCtx,
) -> Result<IrNode, ValidationError> {
    if elems.len() != 2 {
        return Err(bad_argument(node));
    }
    if let Some(name) = elems[1].as_symbol() {
        return Ok(IrNode::ExportNamedDeclaration {
            specifiers: vec![IrNode::ExportSpecifier {
                local: name.to_string(),
                exported: name.to_string(),
            }],
            declaration: None,
        });
    }
    let stmts = lower_form_to_statements(&elems[1], table, ctx)?;
    let declaration = stmts.into_iter().next().ok_or_else(|| bad_argument(node))?;
    Ok(IrNode::ExportVariableDeclaration {
        declaration: Box::new(declaration),
    })
}

/// Lowers a function-like body: every form but the last is a plain
/// statement, the last gets implicit-return treatment via [`lower_tail`].
fn lower_body_with_tail(forms: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<Vec<IrNode>, ValidationError> {
    if forms.is_empty() {
        return Ok(vec![]);
    }
    let mut out = Vec::new();
    for form in &forms[..forms.len() - 1] {
        out.extend(lower_form_to_statements(form, table, ctx)?);
    }
    out.push(lower_tail(&forms[forms.len() - 1], table, ctx)?);
    Ok(out)
}

/// Lowers the last form of a function-like body, giving `if`/`cond`/`recur`
/// their implicit-return treatment instead of evaluating them as a bare
/// expression statement.
fn lower_tail(form: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    if let Some(elems) = form.as_list() {
        match elems.first().and_then(|e| e.as_symbol()) {
            Some("recur") => {
                let call = lower_recur_call(form, elems, table, ctx)?;
                return Ok(IrNode::ReturnStatement {
                    argument: Some(Box::new(call)),
                });
            }
            Some("if") => {
                let test = lower_expr(elems.get(1).ok_or_else(|| bad_argument(form))?, table, ctx)?;
                let consequent = lower_tail(elems.get(2).ok_or_else(|| bad_argument(form))?, table, ctx)?;
                let alternate = match elems.get(3) {
                    Some(e) => Some(Box::new(IrNode::BlockStatement {
                        body: vec![lower_tail(e, table, ctx)?],
                    })),
                    None => None,
                };
                return Ok(IrNode::IfStatement {
                    test: Box::new(test),
                    consequent: Box::new(IrNode::BlockStatement { body: vec![consequent] }),
                    alternate,
                });
            }
            Some("cond") => return lower_cond_tail(&elems[1..], table, ctx),
            _ => {}
        }
    }
    Ok(IrNode::ReturnStatement {
        argument: Some(Box::new(lower_expr(form, table, ctx)?)),
    })
}

fn lower_cond_tail(clauses: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let Some((first, rest)) = clauses.split_first() else {
        return Ok(IrNode::ReturnStatement { argument: None });
    };
    let pair = first.as_list().ok_or_else(|| bad_argument(first))?;
    let test_expr = pair.first().ok_or_else(|| bad_argument(first))?;
    let result_expr = pair.get(1).ok_or_else(|| bad_argument(first))?;
    if test_expr.is_symbol("else") {
        return lower_tail(result_expr, table, ctx);
    }
    let test = lower_expr(test_expr, table, ctx)?;
    let consequent = lower_tail(result_expr, table, ctx)?;
    let alternate = lower_cond_tail(rest, table, ctx)?;
    Ok(IrNode::IfStatement {
        test: Box::new(test),
        consequent: Box::new(IrNode::BlockStatement { body: vec![consequent] }),
        alternate: Some(Box::new(IrNode::BlockStatement { body: vec![alternate] })),
    })
}

/// `(loop ((n v) ...) body...)`: the notable algorithm (spec.md §4.7).
fn lower_loop(node: &SExpr, elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let bindings = elems.get(1).and_then(|e| e.as_list()).ok_or_else(|| bad_argument(node))?;
    let mut names = Vec::with_capacity(bindings.len());
    let mut inits = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let pair = binding.as_list().ok_or_else(|| bad_argument(binding))?;
        let name = pair.first().and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(binding))?;
        let value = pair.get(1).ok_or_else(|| bad_argument(binding))?;
        names.push(name.to_string());
        inits.push(lower_expr(value, table, ctx)?);
    }

    ctx.loop_counter += 1;
    let helper_name = format!("loop_{}", ctx.loop_counter);
    ctx.loop_stack.push(helper_name.clone());
    let body = lower_body_with_tail(&elems[2..], table, ctx);
    ctx.loop_stack.pop();
    let body = body?;

    let helper = IrNode::FunctionDeclaration {
        name: helper_name.clone(),
        params: names.into_iter().map(|name| Param { name, default: None }).collect(),
        body,
    };
    let call = IrNode::CallExpression {
        callee: Box::new(IrNode::Identifier { name: helper_name }),
        arguments: inits,
    };
    Ok(IrNode::InteropIIFE {
        body: vec![helper, IrNode::ReturnStatement { argument: Some(Box::new(call)) }],
        arguments: vec![],
    })
}

fn lower_recur_call(node: &SExpr, elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let Some(innermost) = ctx.loop_stack.last().cloned() else {
        return Err(bad_argument(node));
    };
    let mut arguments = Vec::with_capacity(elems.len().saturating_sub(1));
    for arg in &elems[1..] {
        arguments.push(lower_expr(arg, table, ctx)?);
    }
    Ok(IrNode::CallExpression {
        callee: Box::new(IrNode::Identifier { name: innermost }),
        arguments,
    })
}

fn lower_identifier(name: &str) -> IrNode {
    let mut parts = name.split('.');
    let first = parts.next().unwrap_or(name);
    let mut node = IrNode::Identifier { name: first.to_string() };
    for part in parts {
        node = IrNode::MemberExpression {
            object: Box::new(node),
            property: Box::new(IrNode::Identifier { name: part.to_string() }),
            computed: false,
        };
    }
    node
}

fn is_binary_operator(op: &str) -> bool {
    matches!(op, "+" | "-" | "*" | "/" | "%" | "=" | "eq?" | "!=" | "<" | ">" | "<=" | ">=")
}

fn js_operator(op: &str) -> &str {
    match op {
        "=" | "eq?" => "===",
        "!=" => "!==",
        other => other,
    }
}

fn lower_binary_chain(op: &str, args: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    if args.len() < 2 {
        return Err(bad_argument(node));
    }
    let mut iter = args.iter();
    let mut acc = lower_expr(iter.next().unwrap(), table, ctx)?;
    for next in iter {
        let rhs = lower_expr(next, table, ctx)?;
        acc = IrNode::BinaryExpression {
            operator: js_operator(op).to_string(),
            left: Box::new(acc),
            right: Box::new(rhs),
        };
    }
    Ok(acc)
}

fn lower_array(elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let mut elements = Vec::with_capacity(elems.len());
    for e in elems {
        elements.push(lower_expr(e, table, ctx)?);
    }
    Ok(IrNode::ArrayExpression { elements })
}

fn lower_set(elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let arr = lower_array(elems, table, ctx)?;
    Ok(IrNode::NewExpression {
        callee: Box::new(IrNode::Identifier { name: "Set".to_string() }),
        arguments: vec![arr],
    })
}

fn lower_map(elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let mut entries = Vec::new();
    let mut i = 0;
    while i + 1 < elems.len() {
        let k = lower_expr(&elems[i], table, ctx)?;
        let v = lower_expr(&elems[i + 1], table, ctx)?;
        entries.push(IrNode::ArrayExpression { elements: vec![k, v] });
        i += 2;
    }
    Ok(IrNode::NewExpression {
        callee: Box::new(IrNode::Identifier { name: "Map".to_string() }),
        arguments: vec![IrNode::ArrayExpression { elements: entries }],
    })
}

fn lower_js_get(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let object = lower_expr(elems.get(1).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    let property = lower_expr(elems.get(2).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    Ok(IrNode::MemberExpression {
        object: Box::new(object),
        property: Box::new(property),
        computed: true,
    })
}

fn lower_call_member(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let object = lower_expr(elems.get(1).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    let method = string_literal(elems.get(2).ok_or_else(|| bad_argument(node))?)
        .ok_or_else(|| bad_argument(node))?
        .to_string();
    let mut arguments = Vec::new();
    for a in elems.get(3..).unwrap_or(&[]) {
        arguments.push(lower_expr(a, table, ctx)?);
    }
    Ok(IrNode::CallMemberExpression {
        object: Box::new(object),
        property: method,
        arguments,
    })
}

fn lower_js_method(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let object = lower_expr(elems.get(1).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    let property = string_literal(elems.get(2).ok_or_else(|| bad_argument(node))?)
        .ok_or_else(|| bad_argument(node))?
        .to_string();
    Ok(IrNode::JsMethodAccess {
        object: Box::new(object),
        property,
    })
}

fn lower_conditional(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let test = lower_expr(elems.get(1).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    let consequent = lower_expr(elems.get(2).ok_or_else(|| bad_argument(node))?, table, ctx)?;
    let alternate = match elems.get(3) {
        Some(e) => lower_expr(e, table, ctx)?,
        None => IrNode::NullLiteral,
    };
    Ok(IrNode::ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

fn lower_cond_expr(clauses: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let Some((first, rest)) = clauses.split_first() else {
        return Ok(IrNode::NullLiteral);
    };
    let pair = first.as_list().ok_or_else(|| bad_argument(first))?;
    let test_expr = pair.first().ok_or_else(|| bad_argument(first))?;
    let result_expr = pair.get(1).ok_or_else(|| bad_argument(first))?;
    if test_expr.is_symbol("else") {
        return lower_expr(result_expr, table, ctx);
    }
    let test = lower_expr(test_expr, table, ctx)?;
    let consequent = lower_expr(result_expr, table, ctx)?;
    let alternate = lower_cond_expr(rest, table, ctx)?;
    Ok(IrNode::ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

fn lower_lambda(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let param_list = elems.get(1).and_then(|e| e.as_list()).ok_or_else(|| bad_argument(node))?;
    let params = param_list.iter().map(lower_param).collect::<Result<Vec<_>, _>>()?;
    let body = lower_body_with_tail(elems.get(2..).unwrap_or(&[]), table, ctx)?;
    Ok(IrNode::FunctionExpression { params, body, is_arrow: true })
}

fn lower_new(elems: &[SExpr], node: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    let class_name = elems.get(1).and_then(|e| e.as_symbol()).ok_or_else(|| bad_argument(node))?;
    let mut arguments = Vec::new();
    for a in elems.get(2..).unwrap_or(&[]) {
        arguments.push(lower_expr(a, table, ctx)?);
    }
    Ok(IrNode::NewExpression {
        callee: Box::new(IrNode::Identifier { name: class_name.to_string() }),
        arguments,
    })
}

fn lower_expr(form: &SExpr, table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    match &form.kind {
        SExprKind::Literal(Literal::String(s)) => Ok(IrNode::StringLiteral { value: s.clone() }),
        SExprKind::Literal(Literal::Int(i)) => Ok(IrNode::NumericLiteral { value: *i as f64 }),
        SExprKind::Literal(Literal::Float(f)) => Ok(IrNode::NumericLiteral { value: *f }),
        SExprKind::Literal(Literal::Bool(b)) => Ok(IrNode::BooleanLiteral { value: *b }),
        SExprKind::Literal(Literal::Nil) => Ok(IrNode::NullLiteral),
        SExprKind::Symbol(name) => Ok(lower_identifier(name)),
        SExprKind::List(elems) => lower_expr_list(form, elems, table, ctx),
    }
}

fn lower_expr_list(node: &SExpr, elems: &[SExpr], table: &SymbolTable, ctx: &mut LowerCtx) -> Result<IrNode, ValidationError> {
    if elems.is_empty() {
        return Ok(IrNode::ArrayExpression { elements: vec![] });
    }
    let head = elems[0].as_symbol();
    match head {
        Some("let") => return Err(bad_argument(node)),
        Some("if") => return lower_conditional(elems, node, table, ctx),
        Some("cond") => return lower_cond_expr(&elems[1..], table, ctx),
        Some("lambda") => return lower_lambda(elems, node, table, ctx),
        Some("loop") => return lower_loop(node, elems, table, ctx),
        Some("recur") => return lower_recur_call(node, elems, table, ctx),
        Some("new") => return lower_new(elems, node, table, ctx),
        Some("vector") => return lower_array(&elems[1..], table, ctx),
        Some("empty-array") => return Ok(IrNode::ArrayExpression { elements: vec![] }),
        Some("hash-set") => return lower_set(&elems[1..], table, ctx),
        Some("empty-set") => return lower_set(&[], table, ctx),
        Some("hash-map") => return lower_map(&elems[1..], table, ctx),
        Some("empty-map") => return lower_map(&[], table, ctx),
        Some("js-get") => return lower_js_get(elems, node, table, ctx),
        Some("js-call") | Some("method-call") => return lower_call_member(elems, node, table, ctx),
        Some("js-method") => return lower_js_method(elems, node, table, ctx),
        Some("not") => {
            let argument = lower_expr(elems.get(1).ok_or_else(|| bad_argument(node))?, table, ctx)?;
            return Ok(IrNode::UnaryExpression {
                operator: "!".to_string(),
                argument: Box::new(argument),
            });
        }
        Some(op) if is_binary_operator(op) => return lower_binary_chain(op, &elems[1..], node, table, ctx),
        _ => {}
    }
    let callee = lower_expr(&elems[0], table, ctx)?;
    let mut arguments = Vec::with_capacity(elems.len() - 1);
    for a in &elems[1..] {
        arguments.push(lower_expr(a, table, ctx)?);
    }
    Ok(IrNode::CallExpression {
        callee: Box::new(callee),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_common::position::SourceRegistry;
    use hql_parser::parse_source;

    fn forms(src: &str) -> Vec<SExpr> {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1
    }

    fn program(src: &str) -> IrNode {
        let table = SymbolTable::new_global();
        lower_program(&forms(src), &table).unwrap()
    }

    #[test]
    fn lowers_literals_and_let() {
        let ir = program("(let x 5)");
        match ir {
            IrNode::Program { body } => {
                assert_eq!(body.len(), 1);
                match &body[0] {
                    IrNode::VariableDeclaration { kind, declarations } => {
                        assert_eq!(*kind, VarKind::Let);
                        assert_eq!(declarations.len(), 1);
                    }
                    other => panic!("expected VariableDeclaration, got {other:?}"),
                }
            }
            other => panic!("expected Program, got {other:?}"),
        }
    }

    #[test]
    fn lowers_fx_with_typed_params_and_return_type() {
        let ir = program("(fx add (a:Number b:Number) -> Number (+ a b))");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::FxFunctionDeclaration { name, params, return_type, body } = &body[0] else {
            panic!("expected FxFunctionDeclaration, got {:?}", body[0]);
        };
        assert_eq!(name, "add");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].ty, "Number");
        assert_eq!(return_type, "Number");
        assert_eq!(body.len(), 1);
        assert!(matches!(body[0], IrNode::ReturnStatement { .. }));
    }

    #[test]
    fn lowers_dot_chain_member_access() {
        let ir = program("foo.bar.baz");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::ExpressionStatement { expression } = &body[0] else {
            panic!("expected ExpressionStatement")
        };
        match expression.as_ref() {
            IrNode::MemberExpression { property, computed, .. } => {
                assert!(!computed);
                assert_eq!(**property, IrNode::Identifier { name: "baz".to_string() });
            }
            other => panic!("expected MemberExpression, got {other:?}"),
        }
    }

    #[test]
    fn lowers_js_get_as_computed_member_expression() {
        let ir = program("(js-get arr i)");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::ExpressionStatement { expression } = &body[0] else {
            panic!("expected ExpressionStatement")
        };
        match expression.as_ref() {
            IrNode::MemberExpression { computed, .. } => assert!(*computed),
            other => panic!("expected MemberExpression, got {other:?}"),
        }
    }

    /// spec.md §8 scenario 4, verbatim: `(loop ((i 0)) (if (< i 3) (recur (+ i 1)) i))`.
    #[test]
    fn lowers_loop_recur_to_helper_function_iife() {
        let ir = program("(loop ((i 0)) (if (< i 3) (recur (+ i 1)) i))");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::ExpressionStatement { expression } = &body[0] else {
            panic!("expected ExpressionStatement")
        };
        let IrNode::InteropIIFE { body: iife_body, .. } = expression.as_ref() else {
            panic!("expected InteropIIFE, got {expression:?}")
        };
        assert_eq!(iife_body.len(), 2);

        let IrNode::FunctionDeclaration { name: helper_name, params, body: helper_body } = &iife_body[0] else {
            panic!("expected helper FunctionDeclaration, got {:?}", iife_body[0]);
        };
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "i");
        assert_eq!(helper_body.len(), 1);

        let IrNode::IfStatement { consequent, alternate, .. } = &helper_body[0] else {
            panic!("expected IfStatement, got {:?}", helper_body[0]);
        };
        let IrNode::BlockStatement { body: consequent_body } = consequent.as_ref() else {
            panic!("expected BlockStatement")
        };
        match &consequent_body[0] {
            IrNode::ReturnStatement { argument: Some(arg) } => match arg.as_ref() {
                IrNode::CallExpression { callee, arguments } => {
                    assert_eq!(**callee, IrNode::Identifier { name: helper_name.clone() });
                    assert_eq!(arguments.len(), 1);
                }
                other => panic!("expected recur call, got {other:?}"),
            },
            other => panic!("expected ReturnStatement, got {other:?}"),
        }

        let alternate = alternate.as_ref().expect("fall-through branch");
        let IrNode::BlockStatement { body: alt_body } = alternate.as_ref() else {
            panic!("expected BlockStatement")
        };
        assert_eq!(
            alt_body[0],
            IrNode::ReturnStatement {
                argument: Some(Box::new(IrNode::Identifier { name: "i".to_string() }))
            }
        );

        let IrNode::ReturnStatement { argument: Some(call) } = &iife_body[1] else {
            panic!("expected final ReturnStatement invoking the helper")
        };
        match call.as_ref() {
            IrNode::CallExpression { callee, arguments } => {
                assert_eq!(**callee, IrNode::Identifier { name: helper_name.clone() });
                assert_eq!(arguments.len(), 1);
                assert_eq!(arguments[0], IrNode::NumericLiteral { value: 0.0 });
            }
            other => panic!("expected initial call, got {other:?}"),
        }
    }

    #[test]
    fn nested_loops_target_the_innermost_helper() {
        let ir = program("(loop ((i 0)) (loop ((j 0)) (recur (+ j 1))))");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::ExpressionStatement { expression } = &body[0] else {
            panic!("expected ExpressionStatement")
        };
        let IrNode::InteropIIFE { body: outer_body, .. } = expression.as_ref() else {
            panic!("expected outer IIFE")
        };
        let IrNode::FunctionDeclaration { body: outer_helper_body, .. } = &outer_body[0] else {
            panic!("expected outer helper")
        };
        let IrNode::ReturnStatement { argument: Some(inner_expr) } = &outer_helper_body[0] else {
            panic!("expected return of inner loop")
        };
        let IrNode::InteropIIFE { body: inner_body, .. } = inner_expr.as_ref() else {
            panic!("expected inner IIFE")
        };
        let IrNode::FunctionDeclaration { name: inner_name, body: inner_helper_body, .. } = &inner_body[0] else {
            panic!("expected inner helper")
        };
        let IrNode::ReturnStatement { argument: Some(recur_call) } = &inner_helper_body[0] else {
            panic!("expected recur return")
        };
        let IrNode::CallExpression { callee, .. } = recur_call.as_ref() else {
            panic!("expected call expression")
        };
        assert_eq!(**callee, IrNode::Identifier { name: inner_name.clone() });
    }

    #[test]
    fn recur_outside_loop_is_a_validation_error() {
        let table = SymbolTable::new_global();
        let err = lower_program(&forms("(recur 1)"), &table).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::BadArgument);
    }

    #[test]
    fn lowers_collection_access_rewritten_forms() {
        // Mirrors hql-transform's rewritten shapes for Set/Map/Array access.
        let ir = program(r#"(js-call (js-call Array "from" s) "at" 0)"#);
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::ExpressionStatement { expression } = &body[0] else {
            panic!("expected ExpressionStatement")
        };
        match expression.as_ref() {
            IrNode::CallMemberExpression { property, .. } => assert_eq!(property, "at"),
            other => panic!("expected CallMemberExpression, got {other:?}"),
        }
    }

    #[test]
    fn lowers_import_and_export_forms() {
        let ir = program("(import [a as x b] from \"./util.hql\")\n(export foo)");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        assert_eq!(body.len(), 2);
        match &body[0] {
            IrNode::ImportDeclaration { specifiers, source } => {
                assert_eq!(source, "./util.hql");
                assert_eq!(specifiers.len(), 2);
                assert_eq!(specifiers[0], IrNode::ImportSpecifier { imported: "a".to_string(), local: "x".to_string() });
            }
            other => panic!("expected ImportDeclaration, got {other:?}"),
        }
        assert!(matches!(body[1], IrNode::ExportNamedDeclaration { .. }));
    }

    #[test]
    fn lowers_enum_with_associated_values() {
        let ir = program("(enum Shape (case circle radius) (case square side))");
        let IrNode::Program { body } = ir else { panic!("not a program") };
        let IrNode::EnumDeclaration { name, cases } = &body[0] else {
            panic!("expected EnumDeclaration, got {:?}", body[0])
        };
        assert_eq!(name, "Shape");
        assert_eq!(cases.len(), 2);
        match &cases[0] {
            IrNode::EnumCase { name, associated_values, .. } => {
                assert_eq!(name, "circle");
                assert_eq!(associated_values, &vec!["radius".to_string()]);
            }
            other => panic!("expected EnumCase, got {other:?}"),
        }
    }
}
