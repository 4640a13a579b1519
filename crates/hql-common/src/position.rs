use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::span::{LineIndex, Span};

/// A fully-resolved source position: which file, which line/column, and the
/// raw byte offset it was computed from.
///
/// Lines and columns are 1-based. Every [`crate::sexpr`]-shaped node (defined
/// in `hql-parser`) optionally carries one; the lexer supplies them and every
/// later stage preserves them unless a new node is synthesized, in which case
/// the nearest enclosing user node's position is inherited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    pub file_path: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub byte_offset: u32,
}

impl Position {
    pub fn new(file_path: Arc<str>, line: u32, column: u32, byte_offset: u32) -> Self {
        Self {
            file_path,
            line,
            column,
            byte_offset,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.line, self.column)
    }
}

/// Holds original source text keyed by path, plus a lazily-shared
/// [`LineIndex`] per file, for the lifetime of a compilation.
///
/// Source text registered here is never mutated -- each stage of the
/// pipeline reads through the registry rather than carrying its own copy.
pub struct SourceRegistry {
    files: FxHashMap<Arc<str>, Arc<RegisteredFile>>,
}

struct RegisteredFile {
    text: String,
    index: LineIndex,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            files: FxHashMap::default(),
        }
    }

    /// Register (or re-register) a file's source text. Strips a leading
    /// UTF-8 BOM if present, per the external-interface contract.
    pub fn register(&mut self, path: impl Into<Arc<str>>, text: impl Into<String>) -> Arc<str> {
        let path = path.into();
        let mut text = text.into();
        if let Some(stripped) = text.strip_prefix('\u{feff}') {
            text = stripped.to_string();
        }
        let index = LineIndex::new(&text);
        self.files
            .insert(path.clone(), Arc::new(RegisteredFile { text, index }));
        path
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|f| f.text.as_str())
    }

    pub fn is_registered(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Resolve a byte offset within `path` into a full [`Position`]. Panics
    /// if `path` was never registered -- every offset passed to this
    /// function must originate from a span produced while lexing that file.
    pub fn position(&self, path: &Arc<str>, offset: u32) -> Position {
        let file = self
            .files
            .get(path.as_ref())
            .unwrap_or_else(|| panic!("source file not registered: {path}"));
        let (line, column) = file.index.line_col(offset);
        Position::new(path.clone(), line, column, offset)
    }

    pub fn span_to_position(&self, path: &Arc<str>, span: Span) -> Position {
        self.position(path, span.start)
    }

    /// The two lines before and after `line` (1-based), for diagnostic
    /// `context_lines`. Missing lines (start/end of file) are simply omitted.
    pub fn context_lines(&self, path: &str, line: u32) -> Vec<(u32, String)> {
        let Some(file) = self.files.get(path) else {
            return Vec::new();
        };
        let lo = line.saturating_sub(2).max(1);
        let hi = line + 2;
        let mut out = Vec::new();
        for l in lo..=hi {
            let Some(start) = file.index.line_start(l) else {
                continue;
            };
            let Some(end) = file.index.line_end(l, &file.text) else {
                continue;
            };
            out.push((l, file.text[start as usize..end as usize].to_string()));
        }
        out
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved kind for a source file extension, per spec.md §6: `.hql` files
/// are compiled by this core; `.js`/`.ts`/`.mjs` are passed through after
/// HQL-import rewriting; anything else is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Hql,
    PassThrough,
}

pub fn classify_extension(path: &Path) -> Option<SourceKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("hql") => Some(SourceKind::Hql),
        Some("js") | Some("ts") | Some("mjs") => Some(SourceKind::PassThrough),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_strips_bom() {
        let mut reg = SourceRegistry::new();
        let path = reg.register("a.hql", "\u{feff}(+ 1 2)");
        assert_eq!(reg.text(&path), Some("(+ 1 2)"));
    }

    #[test]
    fn position_resolves_line_and_column() {
        let mut reg = SourceRegistry::new();
        let path = reg.register("a.hql", "(let x 1)\n(+ x 1)");
        let pos = reg.position(&path, 10);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 1);
    }

    #[test]
    fn classify_extension_rules() {
        assert_eq!(
            classify_extension(Path::new("a.hql")),
            Some(SourceKind::Hql)
        );
        assert_eq!(
            classify_extension(Path::new("a.ts")),
            Some(SourceKind::PassThrough)
        );
        assert_eq!(classify_extension(Path::new("a.rs")), None);
    }
}
