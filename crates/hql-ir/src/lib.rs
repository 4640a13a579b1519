//! IR lowering (spec.md §4.7): turns the canonical S-expression program and
//! its symbol table into a closed tree of [`IrNode`] mirroring the target
//! (JS/TS) AST, including the `loop`/`recur` lowering algorithm.

mod lower;
mod node;

pub use lower::lower_program;
pub use node::{IrNode, Param, TypedParam, VarKind};
