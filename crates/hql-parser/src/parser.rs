//! Recursive-descent parser (spec.md §4.2): turns a token stream into
//! [`SExpr`] trees and performs every desugaring the spec assigns to the
//! parser stage (as opposed to the later syntax transformer).

use std::sync::Arc;

use hql_common::position::SourceRegistry;
use hql_common::token::{Token, TokenKind};
use hql_common::{DelimKind, ParseError, ParseErrorKind, Position};

use crate::sexpr::{Literal, SExpr};

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    registry: &'a SourceRegistry,
    file: &'a Arc<str>,
}

/// Parse every top-level form in `tokens` (as produced by `hql_lexer::lex_file`
/// against the same `registry`/`file`) into a sequence of [`SExpr`]s.
pub fn parse_file(
    registry: &SourceRegistry,
    file: &Arc<str>,
    tokens: &[Token],
) -> Result<Vec<SExpr>, ParseError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        registry,
        file,
    };
    parser.parse_program()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn is_eof(&self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    fn bump(&mut self) -> Token {
        let tok = *self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn position_of(&self, tok: &Token) -> Position {
        self.registry.position(self.file, tok.span.start)
    }

    fn context_line(&self, pos: &Position) -> String {
        self.registry
            .context_lines(self.file, pos.line)
            .into_iter()
            .find(|(line, _)| *line == pos.line)
            .map(|(_, text)| text)
            .unwrap_or_default()
    }

    fn error(&self, kind: ParseErrorKind, at: &Token, expected: Option<&str>, got: Option<String>) -> ParseError {
        let position = self.position_of(at);
        let context_line = self.context_line(&position);
        ParseError {
            kind,
            position,
            expected: expected.map(str::to_string),
            got,
            context_line,
        }
    }

    fn unexpected(&self, tok: &Token, expected: &str) -> ParseError {
        self.error(
            ParseErrorKind::UnexpectedToken,
            tok,
            Some(expected),
            Some(describe_token(tok)),
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.bump())
        } else {
            let tok = *self.peek();
            Err(self.unexpected(&tok, expected))
        }
    }

    fn parse_program(&mut self) -> Result<Vec<SExpr>, ParseError> {
        let mut forms = Vec::new();
        while !self.is_eof() {
            forms.push(self.parse_expr()?);
        }
        Ok(forms)
    }

    fn parse_expr(&mut self) -> Result<SExpr, ParseError> {
        let tok = *self.peek();
        match tok.kind {
            TokenKind::LParen => self.parse_list(),
            TokenKind::LBracket => self.parse_vector(),
            TokenKind::LBrace => self.parse_map(),
            TokenKind::HashLBracket => self.parse_set(),
            TokenKind::Quote => self.parse_sugar(&tok, "quote"),
            TokenKind::Backtick => self.parse_sugar(&tok, "quasiquote"),
            TokenKind::Unquote => self.parse_sugar(&tok, "unquote"),
            TokenKind::UnquoteSplicing => self.parse_sugar(&tok, "unquote-splicing"),
            TokenKind::Dot => self.parse_dot_prefixed(&tok),
            TokenKind::String => Ok(self.parse_string_literal()),
            TokenKind::Symbol | TokenKind::Number => Ok(self.parse_symbol_or_literal()),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                Err(self.unexpected(&tok, "expression"))
            }
            TokenKind::Colon => Err(self.unexpected(&tok, "expression")),
            TokenKind::Eof => Err(self.error(
                ParseErrorKind::UnexpectedEndOfInput,
                &tok,
                Some("expression"),
                None,
            )),
            TokenKind::Comment | TokenKind::Whitespace | TokenKind::Comma => {
                // Filtered out by the lexer's public entry points; reaching
                // here means a caller fed raw unfiltered tokens.
                self.bump();
                self.parse_expr()
            }
        }
    }

    /// `'x`, `` `x ``, `~x`, `~@x` -> `(quote x)` / `(quasiquote x)` / ...
    fn parse_sugar(&mut self, opener: &Token, form: &str) -> Result<SExpr, ParseError> {
        self.bump();
        let inner = self.parse_expr()?;
        let position = self.position_of(opener);
        Ok(SExpr::list(
            vec![SExpr::symbol(form, Some(position.clone())), inner],
            Some(position),
        ))
    }

    /// A standalone `.` is only legal directly followed by a symbol, which
    /// it merges with into one dot-prefixed symbol (`.red`).
    fn parse_dot_prefixed(&mut self, dot: &Token) -> Result<SExpr, ParseError> {
        self.bump();
        let position = self.position_of(dot);
        let name_tok = self.expect(TokenKind::Symbol, "symbol after '.'")?;
        let name = token_text(self.file, &name_tok, self.registry);
        Ok(SExpr::symbol(format!(".{name}"), Some(position)))
    }

    fn parse_list(&mut self) -> Result<SExpr, ParseError> {
        let opener = self.bump();
        let position = self.position_of(&opener);
        let mut elements = Vec::new();
        let mut is_enum = false;
        loop {
            match self.peek_kind() {
                TokenKind::RParen => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let tok = *self.peek();
                    return Err(self.error(
                        ParseErrorKind::UnclosedDelimiter(DelimKind::List),
                        &tok,
                        None,
                        None,
                    ));
                }
                _ => {
                    if elements.is_empty() {
                        if let TokenKind::Symbol = self.peek_kind() {
                            let text = token_text(self.file, self.peek(), self.registry);
                            is_enum = text == "enum";
                        }
                    }
                    if is_enum && elements.len() == 1 && self.peek_kind() == TokenKind::Symbol {
                        elements.push(self.parse_enum_name()?);
                        continue;
                    }
                    elements.push(self.parse_expr()?);
                }
            }
        }
        Ok(SExpr::list(elements, Some(position)))
    }

    /// Inside `(enum Name : Type ...)`, merge `Name`, `:`, `Type` into one
    /// `Name:Type` symbol when the colon immediately follows the name.
    fn parse_enum_name(&mut self) -> Result<SExpr, ParseError> {
        let name_tok = self.bump();
        let name_pos = self.position_of(&name_tok);
        let name = token_text(self.file, &name_tok, self.registry);
        if self.peek_kind() == TokenKind::Colon {
            self.bump();
            let type_tok = self.expect(TokenKind::Symbol, "type after ':' in enum case")?;
            let ty = token_text(self.file, &type_tok, self.registry);
            Ok(SExpr::symbol(format!("{name}:{ty}"), Some(name_pos)))
        } else {
            Ok(SExpr::symbol(name, Some(name_pos)))
        }
    }

    /// `[...]` desugars to `(vector ...)`, or `(empty-array)` when empty.
    fn parse_vector(&mut self) -> Result<SExpr, ParseError> {
        let opener = self.bump();
        let position = self.position_of(&opener);
        let mut elements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBracket => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let tok = *self.peek();
                    return Err(self.error(
                        ParseErrorKind::UnclosedDelimiter(DelimKind::Vector),
                        &tok,
                        None,
                        None,
                    ));
                }
                TokenKind::Comma => {
                    self.bump();
                }
                _ => elements.push(self.parse_expr()?),
            }
        }
        let head = if elements.is_empty() {
            "empty-array"
        } else {
            "vector"
        };
        let mut call = vec![SExpr::symbol(head, Some(position.clone()))];
        call.extend(elements);
        Ok(SExpr::list(call, Some(position)))
    }

    /// `#[...]` desugars to `(hash-set ...)`, or `(empty-set)` when empty.
    fn parse_set(&mut self) -> Result<SExpr, ParseError> {
        let opener = self.bump();
        let position = self.position_of(&opener);
        let mut elements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBracket => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let tok = *self.peek();
                    return Err(self.error(
                        ParseErrorKind::UnclosedDelimiter(DelimKind::Set),
                        &tok,
                        None,
                        None,
                    ));
                }
                TokenKind::Comma => {
                    self.bump();
                }
                _ => elements.push(self.parse_expr()?),
            }
        }
        let head = if elements.is_empty() {
            "empty-set"
        } else {
            "hash-set"
        };
        let mut call = vec![SExpr::symbol(head, Some(position.clone()))];
        call.extend(elements);
        Ok(SExpr::list(call, Some(position)))
    }

    /// `{...}` desugars to `(hash-map key1 val1 ...)`, or `(empty-map)` when
    /// empty. A key is either a symbol already ending in `:` (the trailing
    /// colon is part of the symbol token, stripped here) or any expression
    /// followed by a standalone `:` token.
    fn parse_map(&mut self) -> Result<SExpr, ParseError> {
        let opener = self.bump();
        let position = self.position_of(&opener);
        let mut entries = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => {
                    let tok = *self.peek();
                    return Err(self.error(
                        ParseErrorKind::UnclosedDelimiter(DelimKind::Map),
                        &tok,
                        None,
                        None,
                    ));
                }
                TokenKind::Comma => {
                    self.bump();
                }
                _ => {
                    let (key, value) = self.parse_map_entry()?;
                    entries.push(key);
                    entries.push(value);
                }
            }
        }
        let head = if entries.is_empty() {
            "empty-map"
        } else {
            "hash-map"
        };
        let mut call = vec![SExpr::symbol(head, Some(position.clone()))];
        call.extend(entries);
        Ok(SExpr::list(call, Some(position)))
    }

    fn parse_map_entry(&mut self) -> Result<(SExpr, SExpr), ParseError> {
        let key_tok = *self.peek();
        if key_tok.kind == TokenKind::Symbol {
            let text = token_text(self.file, &key_tok, self.registry);
            if let Some(stripped) = text.strip_suffix(':') {
                self.bump();
                let position = self.position_of(&key_tok);
                let key = SExpr::literal(
                    Literal::String(stripped.to_string()),
                    Some(position),
                );
                let value = self.parse_expr()?;
                return Ok((key, value));
            }
        }
        let key = self.parse_expr()?;
        if self.peek_kind() != TokenKind::Colon {
            let tok = *self.peek();
            return Err(self.error(
                ParseErrorKind::ExpectedColonInMap,
                &tok,
                Some(":"),
                Some(describe_token(&tok)),
            ));
        }
        self.bump();
        let value = self.parse_expr()?;
        Ok((key, value))
    }

    fn parse_string_literal(&mut self) -> SExpr {
        let tok = self.bump();
        let position = self.position_of(&tok);
        let raw = token_text(self.file, &tok, self.registry);
        let unquoted = &raw[1..raw.len() - 1];
        SExpr::literal(Literal::String(unescape(unquoted)), Some(position))
    }

    /// Classify a symbol token as a number, boolean, `nil`, or plain symbol,
    /// applying the dotted-path-with-hyphen rewrite (spec.md §4.2) last.
    fn parse_symbol_or_literal(&mut self) -> SExpr {
        let tok = self.bump();
        let position = self.position_of(&tok);
        let text = token_text(self.file, &tok, self.registry);

        if let Ok(i) = text.parse::<i64>() {
            return SExpr::literal(Literal::Int(i), Some(position));
        }
        if let Ok(f) = text.parse::<f64>() {
            if text.chars().any(|c| c == '.' || c == 'e' || c == 'E') {
                return SExpr::literal(Literal::Float(f), Some(position));
            }
        }
        match text.as_str() {
            "true" => return SExpr::literal(Literal::Bool(true), Some(position)),
            "false" => return SExpr::literal(Literal::Bool(false), Some(position)),
            "nil" => return SExpr::literal(Literal::Nil, Some(position)),
            _ => {}
        }

        if let Some(rewritten) = rewrite_hyphenated_dotted_path(&text) {
            return SExpr::list(
                vec![
                    SExpr::symbol("get", Some(position.clone())),
                    SExpr::symbol(rewritten.0, Some(position.clone())),
                    SExpr::literal(Literal::String(rewritten.1), Some(position.clone())),
                ],
                Some(position),
            );
        }

        SExpr::symbol(text, Some(position))
    }
}

/// `module.property-path` where some segment after the first `.` contains a
/// `-` rewrites to `(get module "property_path")`; a clean dotted path (no
/// hyphenated segment) is left as a single verbatim symbol, resolved later.
/// Returns `(module, "property.path")` on a match.
fn rewrite_hyphenated_dotted_path(text: &str) -> Option<(String, String)> {
    let mut parts = text.splitn(2, '.');
    let head = parts.next()?;
    let rest = parts.next()?;
    if head.is_empty() || rest.is_empty() {
        return None;
    }
    let has_hyphenated_segment = rest.split('.').any(|seg| seg.contains('-'));
    if !has_hyphenated_segment {
        return None;
    }
    Some((head.to_string(), rest.to_string()))
}

fn token_text(file: &Arc<str>, tok: &Token, registry: &SourceRegistry) -> String {
    let source = registry
        .text(file)
        .unwrap_or_else(|| panic!("source file not registered: {file}"));
    source[tok.span.start as usize..tok.span.end as usize].to_string()
}

fn describe_token(tok: &Token) -> String {
    format!("{:?}", tok.kind)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}
