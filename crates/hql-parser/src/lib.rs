//! S-expression parser for HQL (spec.md §3-4.2).
//!
//! [`sexpr`] defines the tree shape shared by every later stage; [`parser`]
//! turns a lexed token stream into that tree, performing the desugarings the
//! spec assigns to the parser (collection literals, quote sugar, enum-case
//! name/type merging, the hyphenated dotted-path rewrite).

mod parser;
mod sexpr;

pub use parser::{parse_file, Parser};
pub use sexpr::{structurally_eq, Literal, SExpr, SExprKind};

use std::sync::Arc;

use hql_common::position::SourceRegistry;
use hql_common::ParseError;

/// Convenience entry point: register `source` under `path`, lex it, and
/// parse it, in one call. Lex errors are reported as a parse error whose
/// `expected`/`got` fields are left empty, since the two stages share no
/// common error type at this layer -- callers that need to distinguish them
/// should call `hql_lexer::lex_file` and [`parse_file`] directly instead.
pub fn parse_source(
    registry: &mut SourceRegistry,
    path: &str,
    source: &str,
) -> Result<(Arc<str>, Vec<SExpr>), ParseError> {
    let file = registry.register(path, source);
    let tokens = hql_lexer::lex_file(registry, &file).map_err(|e| ParseError {
        kind: hql_common::ParseErrorKind::UnexpectedToken,
        position: e.position.clone(),
        expected: None,
        got: Some(e.kind.to_string()),
        context_line: registry
            .context_lines(&file, e.position.line)
            .into_iter()
            .find(|(l, _)| *l == e.position.line)
            .map(|(_, t)| t)
            .unwrap_or_default(),
    })?;
    let forms = parse_file(registry, &file, &tokens)?;
    Ok((file, forms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hql_common::{DelimKind, ParseErrorKind};

    fn parse(src: &str) -> Vec<SExpr> {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap().1
    }

    fn parse_err(src: &str) -> ParseError {
        let mut reg = SourceRegistry::new();
        parse_source(&mut reg, "t.hql", src).unwrap_err()
    }

    #[test]
    fn parses_basic_call() {
        let forms = parse("(+ 1 2)");
        assert_eq!(forms.len(), 1);
        let elems = forms[0].as_list().unwrap();
        assert_eq!(elems[0].as_symbol(), Some("+"));
        assert_eq!(elems[1].kind, SExprKind::Literal(Literal::Int(1)));
        assert_eq!(elems[2].kind, SExprKind::Literal(Literal::Int(2)));
    }

    #[test]
    fn parses_float_and_bool_and_nil() {
        let forms = parse("(f 1.5 true false nil)");
        let elems = forms[0].as_list().unwrap();
        assert_eq!(elems[1].kind, SExprKind::Literal(Literal::Float(1.5)));
        assert_eq!(elems[2].kind, SExprKind::Literal(Literal::Bool(true)));
        assert_eq!(elems[3].kind, SExprKind::Literal(Literal::Bool(false)));
        assert_eq!(elems[4].kind, SExprKind::Literal(Literal::Nil));
    }

    #[test]
    fn parses_string_with_escapes() {
        let forms = parse(r#"("a\nb")"#);
        let elems = forms[0].as_list().unwrap();
        assert_eq!(
            elems[0].kind,
            SExprKind::Literal(Literal::String("a\nb".to_string()))
        );
    }

    #[test]
    fn quote_family_desugars_to_calls() {
        let forms = parse("'x `y ~z ~@w");
        assert!(forms[0].head_is("quote"));
        assert!(forms[1].head_is("quasiquote"));
        assert!(forms[2].head_is("unquote"));
        assert!(forms[3].head_is("unquote-splicing"));
    }

    #[test]
    fn dot_prefixed_symbol_merges_into_one_atom() {
        let forms = parse(".red");
        assert_eq!(forms[0].as_symbol(), Some(".red"));
    }

    #[test]
    fn vector_literal_desugars_to_vector_call() {
        let forms = parse("[1 2 3]");
        assert!(forms[0].head_is("vector"));
        assert_eq!(forms[0].as_list().unwrap().len(), 4);
    }

    #[test]
    fn empty_vector_desugars_to_empty_array() {
        let forms = parse("[]");
        assert!(forms[0].head_is("empty-array"));
    }

    #[test]
    fn set_literal_desugars_to_hash_set_call() {
        let forms = parse("#[1 2]");
        assert!(forms[0].head_is("hash-set"));
    }

    #[test]
    fn map_literal_with_trailing_colon_keys() {
        let forms = parse("{a: 1 b: 2}");
        let elems = forms[0].as_list().unwrap();
        assert!(forms[0].head_is("hash-map"));
        assert_eq!(
            elems[1].kind,
            SExprKind::Literal(Literal::String("a".to_string()))
        );
        assert_eq!(elems[2].kind, SExprKind::Literal(Literal::Int(1)));
        assert_eq!(
            elems[3].kind,
            SExprKind::Literal(Literal::String("b".to_string()))
        );
    }

    #[test]
    fn empty_map_desugars_to_empty_map() {
        let forms = parse("{}");
        assert!(forms[0].head_is("empty-map"));
    }

    #[test]
    fn map_missing_colon_is_an_error() {
        let err = parse_err("{a 1}");
        assert_eq!(err.kind, ParseErrorKind::ExpectedColonInMap);
    }

    #[test]
    fn enum_case_merges_name_and_type() {
        let forms = parse("(enum Circle : Number)");
        let outer = forms[0].as_list().unwrap();
        assert_eq!(outer[0].as_symbol(), Some("enum"));
        assert_eq!(outer[1].as_symbol(), Some("Circle:Number"));
    }

    #[test]
    fn hyphenated_dotted_path_rewrites_to_get_call() {
        let forms = parse("config.max-retries");
        assert!(forms[0].head_is("get"));
        let elems = forms[0].as_list().unwrap();
        assert_eq!(elems[1].as_symbol(), Some("config"));
        assert_eq!(
            elems[2].kind,
            SExprKind::Literal(Literal::String("max-retries".to_string()))
        );
    }

    #[test]
    fn clean_dotted_path_is_preserved_verbatim() {
        let forms = parse("module.property");
        assert_eq!(forms[0].as_symbol(), Some("module.property"));
    }

    #[test]
    fn unclosed_list_reports_unclosed_delimiter() {
        let err = parse_err("(+ 1 2");
        assert_eq!(
            err.kind,
            ParseErrorKind::UnclosedDelimiter(DelimKind::List)
        );
    }

    /// spec.md §8 scenario 1, verbatim: `(let x 1` errors with the position
    /// of end-of-input, not the opening `(`.
    #[test]
    fn unclosed_list_reports_position_at_end_of_input_not_the_opener() {
        let err = parse_err("(let x 1");
        assert_eq!(
            err.kind,
            ParseErrorKind::UnclosedDelimiter(DelimKind::List)
        );
        assert_eq!(err.position.line, 1);
        assert_eq!(err.position.column, 10);
    }

    #[test]
    fn unclosed_vector_reports_unclosed_delimiter() {
        let err = parse_err("[1 2");
        assert_eq!(
            err.kind,
            ParseErrorKind::UnclosedDelimiter(DelimKind::Vector)
        );
    }

    #[test]
    fn stray_closing_paren_is_unexpected_token() {
        let err = parse_err(")");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn empty_input_parses_to_no_forms() {
        assert_eq!(parse("").len(), 0);
    }

    #[test]
    fn named_argument_key_is_emitted_verbatim() {
        let forms = parse("(greet name: \"Ada\")");
        let elems = forms[0].as_list().unwrap();
        assert_eq!(elems[1].as_symbol(), Some("name:"));
        assert_eq!(
            elems[2].kind,
            SExprKind::Literal(Literal::String("Ada".to_string()))
        );
    }

    #[test]
    fn fn_return_type_marker_is_next_element() {
        let forms = parse("(fn add [a b] -> Number (+ a b))");
        let elems = forms[0].as_list().unwrap();
        assert_eq!(elems[3].as_symbol(), Some("->"));
        assert_eq!(elems[4].as_symbol(), Some("Number"));
    }
}
