//! The S-expression data model (spec.md §3): the single tree shape shared by
//! parser output, macro values, and (pre-lowering) the canonical program.

use hql_common::Position;

/// A node in the S-expression tree. Nodes form a tree; children are owned by
/// their parent `List`. The optional [`Position`] is preserved from the
/// lexer through every later stage unless the node is synthesized, in which
/// case the nearest enclosing user node's position is inherited.
#[derive(Debug, Clone, PartialEq)]
pub struct SExpr {
    pub kind: SExprKind,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExprKind {
    /// An identifier. May contain `.`, `-`, `:`, a leading `.` (enum
    /// shorthand), or a trailing `:` (named-argument key).
    Symbol(String),
    /// An ordered sequence, used for calls, special forms, and (after
    /// desugaring) vectors/maps/sets.
    List(Vec<SExpr>),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
}

impl SExpr {
    pub fn symbol(name: impl Into<String>, position: Option<Position>) -> Self {
        Self {
            kind: SExprKind::Symbol(name.into()),
            position,
        }
    }

    pub fn list(elements: Vec<SExpr>, position: Option<Position>) -> Self {
        Self {
            kind: SExprKind::List(elements),
            position,
        }
    }

    pub fn literal(value: Literal, position: Option<Position>) -> Self {
        Self {
            kind: SExprKind::Literal(value),
            position,
        }
    }

    /// Re-attach this node's position to a freshly synthesized node that has
    /// none, per the "nearest enclosing node" inheritance rule.
    pub fn inherit_position(&self, into: SExpr) -> SExpr {
        if into.position.is_some() {
            return into;
        }
        SExpr {
            position: self.position.clone(),
            ..into
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            SExprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match &self.kind {
            SExprKind::List(elems) => Some(elems),
            _ => None,
        }
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    /// Whether this list's head is the given special-form/call name.
    pub fn head_is(&self, name: &str) -> bool {
        match &self.kind {
            SExprKind::List(elems) => elems.first().is_some_and(|e| e.is_symbol(name)),
            _ => false,
        }
    }

    /// The canonical string form used as a macro-expansion cache key and in
    /// `Debug`-free test assertions. This is *not* meant to be re-parseable
    /// byte-for-byte (see [`crate::print`] for that); it only needs to be
    /// stable and distinguish structurally different expressions.
    pub fn to_canonical_string(&self) -> String {
        match &self.kind {
            SExprKind::Symbol(s) => s.clone(),
            SExprKind::Literal(Literal::String(s)) => format!("{s:?}"),
            SExprKind::Literal(Literal::Int(i)) => i.to_string(),
            SExprKind::Literal(Literal::Float(f)) => f.to_string(),
            SExprKind::Literal(Literal::Bool(b)) => b.to_string(),
            SExprKind::Literal(Literal::Nil) => "nil".to_string(),
            SExprKind::List(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| e.to_canonical_string()).collect();
                format!("({})", parts.join(" "))
            }
        }
    }
}

/// Structural equality ignoring positions, for round-trip law assertions
/// (spec.md §8). `PartialEq` on `SExpr` already ignores nothing -- it
/// compares positions too -- so tests that need position-insensitive
/// comparison should use this instead.
pub fn structurally_eq(a: &SExpr, b: &SExpr) -> bool {
    match (&a.kind, &b.kind) {
        (SExprKind::Symbol(x), SExprKind::Symbol(y)) => x == y,
        (SExprKind::Literal(x), SExprKind::Literal(y)) => x == y,
        (SExprKind::List(xs), SExprKind::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| structurally_eq(x, y))
        }
        _ => false,
    }
}
