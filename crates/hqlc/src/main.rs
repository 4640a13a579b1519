//! The `hqlc` CLI: a thin driver over [`hqlc::compile`] for ad-hoc
//! invocation and for exercising the pipeline end-to-end in tests. Not the
//! product CLI described as out-of-scope in spec.md §1.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use hqlc::{compile, CompileOptions};

#[derive(Parser)]
#[command(name = "hqlc", version, about = "The HQL compilation-core driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and report diagnostics without printing IR.
    Check {
        file: PathBuf,

        /// Log the symbol table after the syntax transformer.
        #[arg(long)]
        verbose: bool,

        /// Log per-phase timing to stderr.
        #[arg(long = "show-timing")]
        show_timing: bool,
    },
    /// Run the pipeline and print the lowered IR (debug-format).
    Compile {
        file: PathBuf,

        /// Print the lowered IR.
        #[arg(long = "emit-ir")]
        emit_ir: bool,

        #[arg(long)]
        verbose: bool,

        #[arg(long = "show-timing")]
        show_timing: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Check { file, verbose, show_timing } => run(&file, verbose, show_timing, false),
        Commands::Compile { file, emit_ir, verbose, show_timing } => run(&file, verbose, show_timing, emit_ir),
    };

    if !ok {
        process::exit(1);
    }
}

fn run(file: &PathBuf, verbose: bool, show_timing: bool, emit_ir: bool) -> bool {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: failed to read '{}': {e}", file.display());
            return false;
        }
    };

    let base_dir = file
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let options = CompileOptions {
        base_dir: base_dir.clone(),
        source_dir: Some(base_dir),
        verbose,
        show_timing,
        current_file: Some(file.clone()),
        ..CompileOptions::default()
    };

    let output = compile(&source, &options);
    let has_errors = report_diagnostics(&source, file, &output.diagnostics);

    if emit_ir {
        if let Some(ir) = &output.ir {
            println!("{ir:#?}");
        }
    }

    !has_errors
}

/// Render every diagnostic with `ariadne`, using its `context_lines` if the
/// error carried a position. Returns whether any diagnostic was an error.
fn report_diagnostics(source: &str, path: &std::path::Path, diagnostics: &[hql_common::Diagnostic]) -> bool {
    use ariadne::{Label, Report, ReportKind, Source};

    let file_name = path.display().to_string();
    let mut has_errors = false;

    for diag in diagnostics {
        has_errors |= diag.severity == hql_common::Severity::Error;
        let kind = match diag.severity {
            hql_common::Severity::Error => ReportKind::Error,
            hql_common::Severity::Warning => ReportKind::Warning,
        };

        let Some(location) = &diag.location else {
            eprintln!("{kind} ({file_name}): {}", diag.message);
            continue;
        };
        let offset = location.byte_offset as usize;
        let mut builder = Report::<std::ops::Range<usize>>::build(kind, offset..offset + 1)
            .with_message(&diag.message)
            .with_label(Label::new(offset..offset + 1).with_message(&diag.message));
        if let Some(suggestion) = &diag.suggestion {
            builder = builder.with_note(suggestion);
        }
        let _ = builder.finish().eprint(Source::from(source));
    }

    has_errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_fixture_file() {
        let dir = std::env::temp_dir().join("hqlc-cli-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("main.hql");
        std::fs::write(&file, "(let x 1)").unwrap();
        assert!(run(&file, false, false, false));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reports_failure_for_unclosed_list() {
        let dir = std::env::temp_dir().join("hqlc-cli-test-fail");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("main.hql");
        std::fs::write(&file, "(let x 1").unwrap();
        assert!(!run(&file, false, false, false));
        std::fs::remove_dir_all(&dir).ok();
    }
}
