//! The error taxonomy shared by every compilation stage (spec.md §7).
//!
//! Each family below is a closed set of *kinds*, not of Rust error types --
//! callers match on `kind` rather than downcasting. Every error carries a
//! [`Position`]; for errors raised while processing a synthesized node the
//! position of the nearest enclosing user-written node is inherited (callers
//! are responsible for filling that in when a node has no position of its
//! own, since only the producing stage knows its synthesis parent).

use std::fmt;

use serde::Serialize;

use crate::position::Position;

// ── Lexer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    UnexpectedChar(char),
    UnterminatedString,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedString => write!(f, "unterminated string literal"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.position)
    }
}
impl std::error::Error for LexError {}

// ── Parser ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DelimKind {
    List,
    Vector,
    Map,
    Set,
}

impl fmt::Display for DelimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Vector => write!(f, "vector"),
            Self::Map => write!(f, "map"),
            Self::Set => write!(f, "set"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnclosedDelimiter(DelimKind),
    UnexpectedEndOfInput,
    ExpectedColonInMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
    pub expected: Option<String>,
    pub got: Option<String>,
    /// The source line the error occurred on, attached at parse time for
    /// recovery-quality diagnostics (spec.md §4.2).
    pub context_line: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken => write!(f, "unexpected token")?,
            ParseErrorKind::UnclosedDelimiter(d) => write!(f, "unclosed {d}")?,
            ParseErrorKind::UnexpectedEndOfInput => write!(f, "unexpected end of input")?,
            ParseErrorKind::ExpectedColonInMap => write!(f, "expected `:` in map literal")?,
        }
        if let (Some(expected), Some(got)) = (&self.expected, &self.got) {
            write!(f, " (expected {expected}, got {got})")?;
        }
        write!(f, " at {}", self.position)
    }
}
impl std::error::Error for ParseError {}

// ── Syntax transformer ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TransformErrorKind {
    BadLet,
    BadFxForm,
    BadFnForm,
    BadEnumForm,
    NodeTransformFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub phase: String,
    pub position: Position,
    pub detail: Option<String>,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.kind {
            TransformErrorKind::BadLet => "malformed `let` form",
            TransformErrorKind::BadFxForm => "malformed `fx` form",
            TransformErrorKind::BadFnForm => "malformed `fn` form",
            TransformErrorKind::BadEnumForm => "malformed `enum` form",
            TransformErrorKind::NodeTransformFailure => "failed to transform node",
        };
        write!(f, "{msg} in phase `{}` at {}", self.phase, self.position)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}
impl std::error::Error for TransformError {}

// ── Macro expander ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MacroErrorKind {
    Arity { expected: usize, found: usize },
    BadParam,
    NotFound,
    RecursionLimit,
    QuasiquoteContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroError {
    pub macro_name: String,
    pub kind: MacroErrorKind,
    pub position: Position,
}

impl fmt::Display for MacroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MacroErrorKind::Arity { expected, found } => write!(
                f,
                "macro `{}` called with {found} argument(s), expected {expected}",
                self.macro_name
            ),
            MacroErrorKind::BadParam => {
                write!(f, "macro `{}` has a malformed parameter list", self.macro_name)
            }
            MacroErrorKind::NotFound => write!(f, "no macro named `{}`", self.macro_name),
            MacroErrorKind::RecursionLimit => write!(
                f,
                "macro `{}` exceeded the expansion recursion limit",
                self.macro_name
            ),
            MacroErrorKind::QuasiquoteContext => write!(
                f,
                "`unquote`/`unquote-splicing` used outside `quasiquote` in macro `{}`",
                self.macro_name
            ),
        }?;
        write!(f, " at {}", self.position)
    }
}
impl std::error::Error for MacroError {}

// ── Import resolver ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ImportErrorKind {
    NotFound,
    CircularFatal,
    UnsupportedType,
    RemoteUnreachable,
    ExportNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportError {
    pub kind: ImportErrorKind,
    pub path: String,
    pub source_file: String,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ImportErrorKind::NotFound => write!(f, "cannot find module `{}`", self.path),
            ImportErrorKind::CircularFatal => {
                write!(f, "unresolvable circular import involving `{}`", self.path)
            }
            ImportErrorKind::UnsupportedType => {
                write!(f, "unsupported module type for `{}`", self.path)
            }
            ImportErrorKind::RemoteUnreachable => {
                write!(f, "could not reach remote module `{}`", self.path)
            }
            ImportErrorKind::ExportNotFound => {
                write!(f, "`{}` does not export the requested binding", self.path)
            }
        }?;
        write!(f, " (imported from {})", self.source_file)
    }
}
impl std::error::Error for ImportError {}

// ── Validation (built-in operators) ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValidationErrorKind {
    BadArgument,
    DivisionByZero,
    WrongType { expected: String, actual: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub position: Position,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValidationErrorKind::BadArgument => write!(f, "invalid argument")?,
            ValidationErrorKind::DivisionByZero => write!(f, "division by zero")?,
            ValidationErrorKind::WrongType { expected, actual } => {
                write!(f, "expected {expected}, found {actual}")?
            }
        }
        write!(f, " at {}", self.position)
    }
}
impl std::error::Error for ValidationError {}

// ── Unified top-level error and diagnostic model (spec.md §6/§7) ─────────

/// Any error produced by the compilation core, for threading through a
/// single `Result` at the stage boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Transform(TransformError),
    Macro(MacroError),
    Import(ImportError),
    Validation(ValidationError),
}

impl CompileError {
    pub fn position(&self) -> &Position {
        match self {
            Self::Lex(e) => &e.position,
            Self::Parse(e) => &e.position,
            Self::Transform(e) => &e.position,
            Self::Macro(e) => &e.position,
            Self::Validation(e) => &e.position,
            Self::Import(_) => {
                // Import errors are keyed by path, not position; callers that
                // need a Position attach one from the importing `import` form.
                unreachable!("ImportError has no Position; use position_opt")
            }
        }
    }

    pub fn position_opt(&self) -> Option<&Position> {
        match self {
            Self::Import(_) => None,
            other => Some(other.position()),
        }
    }

    /// A deterministic, advisory suggestion string produced from the error
    /// kind (spec.md §7, §9 "Suggestion-message generation" design note).
    /// Suggestions never alter recovery -- they are attached to the rendered
    /// [`Diagnostic`] only.
    pub fn suggestion(&self) -> Option<String> {
        let s = match self {
            Self::Lex(e) => match e.kind {
                LexErrorKind::UnexpectedChar(_) => "remove or escape the unexpected character",
                LexErrorKind::UnterminatedString => "close the string literal with `\"`",
            },
            Self::Parse(e) => match &e.kind {
                ParseErrorKind::UnclosedDelimiter(DelimKind::List) => "missing closing `)`",
                ParseErrorKind::UnclosedDelimiter(DelimKind::Vector) => "missing closing `]`",
                ParseErrorKind::UnclosedDelimiter(DelimKind::Map) => "missing closing `}`",
                ParseErrorKind::UnclosedDelimiter(DelimKind::Set) => "missing closing `]` for `#[`",
                ParseErrorKind::UnexpectedToken => "check for a missing operator or delimiter",
                ParseErrorKind::UnexpectedEndOfInput => "the input ended before a form was closed",
                ParseErrorKind::ExpectedColonInMap => "map entries must be written `key: value`",
            },
            Self::Transform(e) => match e.kind {
                TransformErrorKind::BadLet => {
                    "`let` must be `(let name value)` or `(let (n1 v1 ...) body...)`"
                }
                TransformErrorKind::BadFxForm => {
                    "`fx` requires `(name (params...) (-> ReturnType) body...)`"
                }
                TransformErrorKind::BadFnForm => "`fn` requires `(name (params...) body...)`",
                TransformErrorKind::BadEnumForm => "`enum` requires `(enum Name (case ...) ...)`",
                TransformErrorKind::NodeTransformFailure => "check the surrounding form's syntax",
            },
            Self::Macro(e) => match e.kind {
                MacroErrorKind::Arity { .. } => "check the macro's parameter list against the call",
                MacroErrorKind::BadParam => "a macro parameter list allows at most one `& rest`",
                MacroErrorKind::NotFound => "check spelling, or that the macro was imported",
                MacroErrorKind::RecursionLimit => "the macro body likely expands into itself",
                MacroErrorKind::QuasiquoteContext => {
                    "wrap the containing form in a `quasiquote` (`` ` ``)"
                }
            },
            Self::Import(e) => match e.kind {
                ImportErrorKind::NotFound => {
                    "check the import path relative to the importing file, source_dir, cwd, and cwd/lib"
                }
                ImportErrorKind::CircularFatal => {
                    "break the cycle, or ensure one side doesn't require the other at load time"
                }
                ImportErrorKind::UnsupportedType => "only local paths and npm:/jsr:/node:/http(s): are supported",
                ImportErrorKind::RemoteUnreachable => "check network connectivity or vendor the module locally",
                ImportErrorKind::ExportNotFound => "check the exported name, or that it was exported at all",
            },
            Self::Validation(e) => match &e.kind {
                ValidationErrorKind::BadArgument => "check the argument types and count",
                ValidationErrorKind::DivisionByZero => "guard the divisor before dividing",
                ValidationErrorKind::WrongType { .. } => "convert the value to the expected type first",
            },
        };
        Some(s.to_string())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Transform(e) => write!(f, "{e}"),
            Self::Macro(e) => write!(f, "{e}"),
            Self::Import(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}
impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}
impl From<TransformError> for CompileError {
    fn from(e: TransformError) -> Self {
        Self::Transform(e)
    }
}
impl From<MacroError> for CompileError {
    fn from(e: MacroError) -> Self {
        Self::Macro(e)
    }
}
impl From<ImportError> for CompileError {
    fn from(e: ImportError) -> Self {
        Self::Import(e)
    }
}
impl From<ValidationError> for CompileError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A single reported diagnostic, the shape described in spec.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: String,
    pub message: String,
    pub location: Option<Position>,
    pub suggestion: Option<String>,
    pub context_lines: Option<Vec<(u32, String)>>,
}

impl Diagnostic {
    pub fn from_error(err: &CompileError, severity: Severity) -> Self {
        Self {
            severity,
            kind: error_kind_tag(err),
            message: err.to_string(),
            location: err.position_opt().cloned(),
            suggestion: err.suggestion(),
            context_lines: None,
        }
    }

    pub fn with_context_lines(mut self, lines: Vec<(u32, String)>) -> Self {
        self.context_lines = Some(lines);
        self
    }
}

fn error_kind_tag(err: &CompileError) -> String {
    match err {
        CompileError::Lex(e) => format!("LexError::{:?}", variant_tag(&e.kind)),
        CompileError::Parse(e) => format!("ParseError::{:?}", variant_tag(&e.kind)),
        CompileError::Transform(e) => format!("TransformError::{:?}", e.kind),
        CompileError::Macro(e) => format!("MacroError::{:?}", variant_tag(&e.kind)),
        CompileError::Import(e) => format!("ImportError::{:?}", e.kind),
        CompileError::Validation(e) => format!("ValidationError::{:?}", variant_tag(&e.kind)),
    }
}

// Small helper so Debug-derived enums with data fields still produce a stable
// tag string for the diagnostic `kind` field.
fn variant_tag<T: fmt::Debug>(v: &T) -> String {
    let full = format!("{v:?}");
    full.split(['(', ' ', '{']).next().unwrap_or(&full).to_string()
}

/// Ensures every error is surfaced to the user exactly once (spec.md §7):
/// "All errors are reported exactly once through a reporter that marks each
/// error as `reported`; subsequent propagations of the same error are
/// suppressed."
#[derive(Default)]
pub struct Reporter {
    reported: rustc_hash::FxHashSet<(String, Option<(u32, u32)>)>,
    diagnostics: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `diag` unless an error with the same kind and location has
    /// already been reported. Returns whether it was newly reported.
    pub fn report(&mut self, diag: Diagnostic) -> bool {
        let key = (
            diag.kind.clone(),
            diag.location.as_ref().map(|p| (p.line, p.column)),
        );
        if !self.reported.insert(key) {
            return false;
        }
        self.diagnostics.push(diag);
        true
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pos() -> Position {
        Position::new(Arc::from("a.hql"), 1, 10, 9)
    }

    #[test]
    fn unclosed_list_suggestion_mentions_paren() {
        let err = CompileError::Parse(ParseError {
            kind: ParseErrorKind::UnclosedDelimiter(DelimKind::List),
            position: pos(),
            expected: None,
            got: None,
            context_line: "(let x 1".to_string(),
        });
        assert!(err.suggestion().unwrap().contains(')'));
    }

    #[test]
    fn reporter_suppresses_duplicates() {
        let err = CompileError::Validation(ValidationError {
            kind: ValidationErrorKind::DivisionByZero,
            position: pos(),
        });
        let mut reporter = Reporter::new();
        let d1 = Diagnostic::from_error(&err, Severity::Error);
        let d2 = Diagnostic::from_error(&err, Severity::Error);
        assert!(reporter.report(d1));
        assert!(!reporter.report(d2));
        assert_eq!(reporter.diagnostics().len(), 1);
    }
}
