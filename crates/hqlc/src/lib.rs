//! The compilation-core driver (spec.md §6): `compile(source, options)`
//! runs the full pipeline -- parse, syntax-transform, macro-expand, lower --
//! and collects every stage's errors into one ordered diagnostic list.
//!
//! This is a development harness over the core crates, not the product CLI
//! described as out-of-scope in spec.md §1 (bundler, REPL, LSP, and the
//! final IR-to-text emitter all live outside this workspace).

use std::path::PathBuf;
use std::time::Instant;

use hql_common::{CompileError, Diagnostic, LineIndex, Reporter, Severity};
use hql_ir::IrNode;
use hql_symbols::SymbolTable;

/// Configuration record for [`compile`] (spec.md §6). Unspecified fields
/// default via [`CompileOptions::default`]: `base_dir = cwd`,
/// `use_cache = true`, everything else `false`/absent.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub base_dir: PathBuf,
    pub source_dir: Option<PathBuf>,
    pub verbose: bool,
    pub show_timing: bool,
    pub current_file: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub use_cache: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            source_dir: None,
            verbose: false,
            show_timing: false,
            current_file: None,
            temp_dir: None,
            use_cache: true,
        }
    }
}

/// The result of [`compile`]: the lowered IR plus every diagnostic gathered
/// along the way. `source_map` is left `None` -- generating one requires the
/// text emitter, which is out of scope here (spec.md §1).
pub struct CompileOutput {
    pub ir: Option<IrNode>,
    pub diagnostics: Vec<Diagnostic>,
    pub source_map: Option<String>,
    pub symbols: Option<SymbolTable>,
}

/// Runs the full pipeline over `source`: lex+parse, syntax transform,
/// macro expansion, IR lowering. Stops at the first stage with unrecovered
/// errors (later stages need a well-formed input from the one before), but
/// always returns every diagnostic gathered up to that point -- spec.md §7's
/// "report exactly once" policy via a single shared [`Reporter`].
pub fn compile(source: &str, options: &CompileOptions) -> CompileOutput {
    let mut reporter = Reporter::new();
    let file = options
        .current_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "source".to_string());
    let line_index = LineIndex::new(source);

    let t_parse = Instant::now();
    let mut registry = hql_common::SourceRegistry::new();
    let forms = match hql_parser::parse_source(&mut registry, &file, source) {
        Ok((_, forms)) => forms,
        Err(err) => {
            report(&mut reporter, CompileError::Parse(err), &line_index, source);
            return CompileOutput {
                ir: None,
                diagnostics: reporter.into_diagnostics(),
                source_map: None,
                symbols: None,
            };
        }
    };
    if options.show_timing {
        eprintln!("  parse: {:?}", t_parse.elapsed());
    }

    let t_transform = Instant::now();
    let transformed = hql_transform::transform(&forms);
    for err in &transformed.errors {
        report(&mut reporter, CompileError::Transform(err.clone()), &line_index, source);
    }
    if options.show_timing {
        eprintln!("  transform: {:?}", t_transform.elapsed());
    }
    if options.verbose {
        eprintln!("{}", symbol_table_json(&transformed.symbols));
    }
    if reporter.has_errors() {
        return CompileOutput {
            ir: None,
            diagnostics: reporter.into_diagnostics(),
            source_map: None,
            symbols: Some(transformed.symbols),
        };
    }

    let t_macro = Instant::now();
    let mut env = hql_env::Environment::new_global();
    env.set_current_file(Some(file.clone()));
    let expanded = match hql_macro::expand_program(transformed.forms, &mut env, &file) {
        Ok(forms) => forms,
        Err(err) => {
            report(&mut reporter, CompileError::Macro(err), &line_index, source);
            return CompileOutput {
                ir: None,
                diagnostics: reporter.into_diagnostics(),
                source_map: None,
                symbols: Some(transformed.symbols),
            };
        }
    };
    if options.show_timing {
        eprintln!("  macro-expand: {:?}", t_macro.elapsed());
    }

    if let Some(source_dir) = &options.source_dir {
        check_local_imports(&expanded, &options.base_dir, source_dir, &mut reporter, &line_index, source);
        if reporter.has_errors() {
            return CompileOutput {
                ir: None,
                diagnostics: reporter.into_diagnostics(),
                source_map: None,
                symbols: Some(transformed.symbols),
            };
        }
    }

    let t_lower = Instant::now();
    let ir = match hql_ir::lower_program(&expanded, &transformed.symbols) {
        Ok(ir) => Some(ir),
        Err(err) => {
            report(&mut reporter, CompileError::Validation(err), &line_index, source);
            None
        }
    };
    if options.show_timing {
        eprintln!("  lower: {:?}", t_lower.elapsed());
    }

    CompileOutput {
        ir,
        diagnostics: reporter.into_diagnostics(),
        source_map: None,
        symbols: Some(transformed.symbols),
    }
}

fn report(reporter: &mut Reporter, err: CompileError, line_index: &LineIndex, source: &str) {
    let diag = Diagnostic::from_error(&err, Severity::Error);
    let diag = match err.position_opt() {
        Some(pos) => diag.with_context_lines(context_lines(line_index, source, pos.line)),
        None => diag,
    };
    reporter.report(diag);
}

/// Up to one line of context before/after the error line (spec.md §7's
/// `context_lines`).
fn context_lines(line_index: &LineIndex, source: &str, line: u32) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    for l in line.saturating_sub(1)..=line + 1 {
        if l == 0 || l as usize > line_index.line_count() {
            continue;
        }
        let Some(start) = line_index.line_start(l) else { continue };
        let end = line_index.line_end(l, source).unwrap_or(start);
        out.push((l, source[start as usize..end as usize].to_string()));
    }
    out
}

/// Best-effort existence check for local `import` targets against the
/// configured `source_dir`/`base_dir` (spec.md §4.6's path order), without
/// pulling in the async multi-file resolver -- that's a separate entry
/// point (`hql_resolve::Resolver`) for callers building a real module graph.
fn check_local_imports(
    forms: &[hql_parser::SExpr],
    base_dir: &std::path::Path,
    source_dir: &std::path::Path,
    reporter: &mut Reporter,
    line_index: &LineIndex,
    source: &str,
) {
    for form in forms {
        if !form.head_is("import") {
            continue;
        }
        let Ok(spec) = hql_resolve::import::parse_import(form, "source") else { continue };
        if hql_resolve::classify(&spec.path) != hql_resolve::SpecifierKind::Local {
            continue;
        }
        let importer_dir = base_dir.to_path_buf();
        if hql_resolve::resolve_local(&spec.path, &importer_dir, source_dir, base_dir).is_none() {
            let err = CompileError::Import(hql_common::ImportError {
                kind: hql_common::ImportErrorKind::NotFound,
                path: spec.path.clone(),
                source_file: "source".to_string(),
            });
            let diag = Diagnostic::from_error(&err, Severity::Error)
                .with_context_lines(context_lines(line_index, source, spec.position.line));
            reporter.report(diag);
        }
    }
}

fn symbol_table_json(table: &SymbolTable) -> String {
    let names: Vec<&str> = table.local_symbols().map(|s| s.name.as_str()).collect();
    serde_json::to_string_pretty(&names).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_simple_program_to_ir() {
        let out = compile("(let x 5)", &CompileOptions::default());
        assert!(out.diagnostics.is_empty());
        assert!(out.ir.is_some());
    }

    #[test]
    fn reports_unclosed_list_as_a_diagnostic() {
        let out = compile("(let x 1", &CompileOptions::default());
        assert!(out.ir.is_none());
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn compiles_loop_recur_end_to_end() {
        let out = compile("(loop ((i 0)) (if (< i 3) (recur (+ i 1)) i))", &CompileOptions::default());
        assert!(out.diagnostics.is_empty());
        assert!(matches!(out.ir, Some(IrNode::Program { .. })));
    }

    #[test]
    fn expands_a_macro_before_lowering() {
        let out = compile(
            "(defmacro twice (x) `(+ ~x ~x)) (twice 5)",
            &CompileOptions::default(),
        );
        assert!(out.diagnostics.is_empty());
        let Some(IrNode::Program { body }) = out.ir else { panic!("expected program") };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn missing_local_import_is_reported_when_source_dir_given() {
        let dir = std::env::temp_dir().join("hqlc-missing-import-test");
        std::fs::create_dir_all(&dir).unwrap();
        let options = CompileOptions {
            base_dir: dir.clone(),
            source_dir: Some(dir.clone()),
            ..CompileOptions::default()
        };
        let out = compile("(import \"./missing.hql\")", &options);
        assert!(!out.diagnostics.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
