//! The built-in operator table installed into every global environment
//! (spec.md §4.5): `+ - * / % = eq? != < > <= >= get js-get js-call throw`.
//! `/` and `%` raise `ValidationError` on a zero divisor.

use hql_common::{Position, ValidationError, ValidationErrorKind};
use hql_parser::{Literal, SExpr, SExprKind};

use crate::value::{NativeFn, Value};

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn to_sexpr(self, position: &Position) -> SExpr {
        match self {
            Num::Int(i) => SExpr::literal(Literal::Int(i), Some(position.clone())),
            Num::Float(f) => SExpr::literal(Literal::Float(f), Some(position.clone())),
        }
    }
}

fn bad_argument(position: &Position, detail: &str) -> ValidationError {
    ValidationError {
        kind: ValidationErrorKind::WrongType {
            expected: "number".to_string(),
            actual: detail.to_string(),
        },
        position: position.clone(),
    }
}

fn as_number(value: &Value, position: &Position) -> Result<Num, ValidationError> {
    match value.as_sexpr().map(|e| &e.kind) {
        Some(SExprKind::Literal(Literal::Int(i))) => Ok(Num::Int(*i)),
        Some(SExprKind::Literal(Literal::Float(f))) => Ok(Num::Float(*f)),
        other => Err(bad_argument(position, &format!("{other:?}"))),
    }
}

fn fold_numeric(
    args: &[Value],
    position: &Position,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, ValidationError> {
    let mut nums = Vec::with_capacity(args.len());
    for a in args {
        nums.push(as_number(a, position)?);
    }
    let all_int = nums.iter().all(|n| matches!(n, Num::Int(_)));
    let result = if all_int {
        let mut acc = match nums[0] {
            Num::Int(i) => i,
            Num::Float(_) => unreachable!(),
        };
        for n in &nums[1..] {
            let Num::Int(i) = n else { unreachable!() };
            acc = int_op(acc, *i);
        }
        Num::Int(acc)
    } else {
        let mut acc = nums[0].as_f64();
        for n in &nums[1..] {
            acc = float_op(acc, n.as_f64());
        }
        Num::Float(acc)
    };
    Ok(Value::SExpr(result.to_sexpr(position)))
}

fn division_by_zero(position: &Position) -> ValidationError {
    ValidationError {
        kind: ValidationErrorKind::DivisionByZero,
        position: position.clone(),
    }
}

fn bool_sexpr(b: bool, position: &Position) -> Value {
    Value::SExpr(SExpr::literal(Literal::Bool(b), Some(position.clone())))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_sexpr(), b.as_sexpr()) {
        (Some(x), Some(y)) => hql_parser::structurally_eq(x, y),
        _ => false,
    }
}

fn compare_numeric(
    args: &[Value],
    position: &Position,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<Value, ValidationError> {
    if args.len() < 2 {
        return Err(bad_argument(position, "comparison requires at least 2 arguments"));
    }
    let mut ok = true;
    for pair in args.windows(2) {
        let a = as_number(&pair[0], position)?.as_f64();
        let b = as_number(&pair[1], position)?.as_f64();
        if !cmp(a, b) {
            ok = false;
        }
    }
    Ok(bool_sexpr(ok, position))
}

/// The full `(name, implementation)` table, installed by
/// [`crate::Environment::new_global`].
pub fn table() -> Vec<(&'static str, NativeFn)> {
    vec![
        ("+", std::rc::Rc::new(|args, pos| fold_numeric(args, pos, |a, b| a + b, |a, b| a + b))),
        ("-", std::rc::Rc::new(|args, pos| {
            if args.len() == 1 {
                return fold_numeric(&[args[0].clone(), Value::SExpr(SExpr::literal(Literal::Int(0), Some(pos.clone())))], pos, |a, b| b - a, |a, b| b - a);
            }
            fold_numeric(args, pos, |a, b| a - b, |a, b| a - b)
        })),
        ("*", std::rc::Rc::new(|args, pos| fold_numeric(args, pos, |a, b| a * b, |a, b| a * b))),
        ("/", std::rc::Rc::new(|args, pos| {
            for a in &args[1..] {
                if let Num::Int(0) = as_number(a, pos)? {
                    return Err(division_by_zero(pos));
                }
                if let Num::Float(f) = as_number(a, pos)? {
                    if f == 0.0 {
                        return Err(division_by_zero(pos));
                    }
                }
            }
            let mut nums = Vec::with_capacity(args.len());
            for a in args {
                nums.push(as_number(a, pos)?);
            }
            let mut acc = nums[0].as_f64();
            for n in &nums[1..] {
                acc /= n.as_f64();
            }
            Ok(Value::SExpr(Num::Float(acc).to_sexpr(pos)))
        })),
        ("%", std::rc::Rc::new(|args, pos| {
            let a = as_number(&args[0], pos)?;
            let b = as_number(&args[1], pos)?;
            let bi = match b {
                Num::Int(i) => i,
                Num::Float(f) => f as i64,
            };
            if bi == 0 {
                return Err(division_by_zero(pos));
            }
            let ai = match a {
                Num::Int(i) => i,
                Num::Float(f) => f as i64,
            };
            Ok(Value::SExpr(Num::Int(ai % bi).to_sexpr(pos)))
        })),
        ("=", std::rc::Rc::new(|args, pos| {
            let ok = args.windows(2).all(|w| values_equal(&w[0], &w[1]));
            Ok(bool_sexpr(ok, pos))
        })),
        ("eq?", std::rc::Rc::new(|args, pos| {
            let ok = args.windows(2).all(|w| values_equal(&w[0], &w[1]));
            Ok(bool_sexpr(ok, pos))
        })),
        ("!=", std::rc::Rc::new(|args, pos| {
            let ok = args.windows(2).any(|w| !values_equal(&w[0], &w[1]));
            Ok(bool_sexpr(ok, pos))
        })),
        ("<", std::rc::Rc::new(|args, pos| compare_numeric(args, pos, |a, b| a < b))),
        (">", std::rc::Rc::new(|args, pos| compare_numeric(args, pos, |a, b| a > b))),
        ("<=", std::rc::Rc::new(|args, pos| compare_numeric(args, pos, |a, b| a <= b))),
        (">=", std::rc::Rc::new(|args, pos| compare_numeric(args, pos, |a, b| a >= b))),
        ("get", std::rc::Rc::new(|args, pos| {
            if args.len() != 2 {
                return Err(bad_argument(pos, "get takes exactly 2 arguments"));
            }
            let Some(receiver) = args[0].as_sexpr() else {
                return Err(bad_argument(pos, "get receiver must be an s-expression"));
            };
            let key = match args[1].as_sexpr().map(|e| &e.kind) {
                Some(SExprKind::Literal(Literal::String(s))) => s.clone(),
                Some(SExprKind::Literal(Literal::Int(i))) => i.to_string(),
                _ => return Err(bad_argument(pos, "get key must be a string or int")),
            };
            if let SExprKind::List(elems) = &receiver.kind {
                if let Ok(idx) = key.parse::<usize>() {
                    if let Some(found) = elems.get(idx) {
                        return Ok(Value::SExpr(found.clone()));
                    }
                }
            }
            Ok(Value::Nil)
        })),
        ("js-get", std::rc::Rc::new(|args, pos| {
            if args.is_empty() {
                return Err(bad_argument(pos, "js-get requires a receiver"));
            }
            Ok(args[0].clone())
        })),
        ("js-call", std::rc::Rc::new(|args, pos| {
            if args.is_empty() {
                return Err(bad_argument(pos, "js-call requires a receiver"));
            }
            Ok(args[0].clone())
        })),
        ("throw", std::rc::Rc::new(|_args, pos| {
            Err(ValidationError {
                kind: ValidationErrorKind::BadArgument,
                position: pos.clone(),
            })
        })),
    ]
}
