//! The dynamic value macro bodies and built-in operators traffic in
//! (spec.md §9: "Dynamic typing of macro values... represent as a sum
//! `MacroValue { SExpr(SExpr), Native(fn), Nil }`").

use std::fmt;
use std::rc::Rc;

use hql_common::Position;
use hql_parser::SExpr;

use crate::ValidationError;

pub type NativeFn = Rc<dyn Fn(&[Value], &Position) -> Result<Value, ValidationError>>;

#[derive(Clone)]
pub enum Value {
    SExpr(SExpr),
    Native(NativeFn),
    Nil,
}

impl Value {
    pub fn as_sexpr(&self) -> Option<&SExpr> {
        match self {
            Value::SExpr(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::SExpr(e) => write!(f, "Value::SExpr({})", e.to_canonical_string()),
            Value::Native(_) => write!(f, "Value::Native(<fn>)"),
            Value::Nil => write!(f, "Value::Nil"),
        }
    }
}
