//! Shared types for the HQL compilation core: source positions, the
//! source-text registry, the cross-stage error taxonomy, and module-graph
//! primitives.

pub mod error;
pub mod lru;
pub mod module_graph;
pub mod position;
pub mod span;
pub mod token;

pub use error::{
    CompileError, DelimKind, Diagnostic, ImportError, ImportErrorKind, LexError, LexErrorKind,
    MacroError, MacroErrorKind, ParseError, ParseErrorKind, Reporter, Severity, TransformError,
    TransformErrorKind, ValidationError, ValidationErrorKind,
};
pub use lru::LruCache;
pub use module_graph::{CycleError, ModuleGraph, ModuleId, ModuleInfo, ModuleKind};
pub use position::{classify_extension, Position, SourceKind, SourceRegistry};
pub use span::{LineIndex, Span};
pub use token::{Token, TokenKind};
