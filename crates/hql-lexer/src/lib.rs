//! Tokenizer for HQL (spec.md §4.1).
//!
//! Consumes UTF-8 source text and produces a flat sequence of [`Token`]s.
//! Matching is greedy in the precedence the spec lays out: special
//! punctuation first, then string literals, then comments, then whitespace,
//! then symbols (a run of non-delimiter characters, later classified as a
//! number if it parses as one).
//!
//! A token that *begins* with a standalone `.` or `:` is emitted as its own
//! single-character [`TokenKind::Dot`]/[`TokenKind::Colon`] token -- this is
//! what lets the parser glue `.` to a following symbol for enum shorthand
//! (spec.md §4.2) while a dotted path like `module.property` (where the `.`
//! is not the first character of the token) is scanned as one `Symbol`.

mod cursor;

use cursor::Cursor;
use hql_common::position::SourceRegistry;
use hql_common::token::{Token, TokenKind};
use hql_common::{LexError, LexErrorKind};
use std::sync::Arc;

/// The HQL lexer. Converts source text into a stream of tokens.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    emitted_eof: bool,
}

/// A character that ends a symbol-scan: whitespace, delimiters, string
/// quote, and the quote-family sigils.
fn is_symbol_boundary(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '`' | ',' | '"' | ';'
        )
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            emitted_eof: false,
        }
    }

    /// Tokenize the entire source into a `Vec<Token>`, dropping comments and
    /// whitespace per spec.md §4.1. Includes the final `Eof` token.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        for tok in Lexer::new(source) {
            let tok = tok?;
            if !matches!(tok.kind, TokenKind::Comment | TokenKind::Whitespace) {
                out.push(tok);
            }
        }
        Ok(out)
    }

    fn single_char_token(&mut self, kind: TokenKind, start: u32) -> Token {
        self.cursor.advance();
        Token::new(kind, start, self.cursor.pos())
    }

    fn lex_one(&mut self) -> Result<Option<Token>, LexError> {
        let start = self.cursor.pos();
        let Some(c) = self.cursor.peek() else {
            return Ok(None);
        };

        let tok = match c {
            c if c.is_whitespace() => {
                self.cursor.eat_while(|c| c.is_whitespace());
                Token::new(TokenKind::Whitespace, start, self.cursor.pos())
            }
            '(' => self.single_char_token(TokenKind::LParen, start),
            ')' => self.single_char_token(TokenKind::RParen, start),
            '[' => self.single_char_token(TokenKind::LBracket, start),
            ']' => self.single_char_token(TokenKind::RBracket, start),
            '{' => self.single_char_token(TokenKind::LBrace, start),
            '}' => self.single_char_token(TokenKind::RBrace, start),
            ',' => self.single_char_token(TokenKind::Comma, start),
            '\'' => self.single_char_token(TokenKind::Quote, start),
            '`' => self.single_char_token(TokenKind::Backtick, start),
            '#' if self.cursor.peek_next() == Some('[') => {
                self.cursor.advance();
                self.cursor.advance();
                Token::new(TokenKind::HashLBracket, start, self.cursor.pos())
            }
            '~' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('@') {
                    self.cursor.advance();
                    Token::new(TokenKind::UnquoteSplicing, start, self.cursor.pos())
                } else {
                    Token::new(TokenKind::Unquote, start, self.cursor.pos())
                }
            }
            '"' => self.lex_string(start)?,
            ';' => {
                self.cursor.eat_while(|c| c != '\n');
                Token::new(TokenKind::Comment, start, self.cursor.pos())
            }
            '/' if self.cursor.peek_next() == Some('/') => {
                self.cursor.eat_while(|c| c != '\n');
                Token::new(TokenKind::Comment, start, self.cursor.pos())
            }
            '/' if self.cursor.peek_next() == Some('*') => {
                self.cursor.advance();
                self.cursor.advance();
                loop {
                    match self.cursor.peek() {
                        None => {
                            return Err(LexError {
                                kind: LexErrorKind::UnterminatedString,
                                position: self.position_at(start),
                            });
                        }
                        Some('*') if self.cursor.peek_next() == Some('/') => {
                            self.cursor.advance();
                            self.cursor.advance();
                            break;
                        }
                        Some(_) => {
                            self.cursor.advance();
                        }
                    }
                }
                Token::new(TokenKind::Comment, start, self.cursor.pos())
            }
            '.' => self.single_char_token(TokenKind::Dot, start),
            ':' => self.single_char_token(TokenKind::Colon, start),
            _ => self.lex_symbol(start),
        };
        Ok(Some(tok))
    }

    fn lex_string(&mut self, start: u32) -> Result<Token, LexError> {
        self.cursor.advance(); // opening quote
        loop {
            match self.cursor.peek() {
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        position: self.position_at(start),
                    });
                }
                Some('\\') => {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
        Ok(Token::new(TokenKind::String, start, self.cursor.pos()))
    }

    /// Scan a run of non-boundary characters as a symbol. The lexer does not
    /// distinguish numbers from other symbols here -- that classification
    /// happens in the parser, which is the only stage that needs the parsed
    /// value.
    fn lex_symbol(&mut self, start: u32) -> Token {
        self.cursor.eat_while(|c| !is_symbol_boundary(c));
        Token::new(TokenKind::Symbol, start, self.cursor.pos())
    }

    fn position_at(&self, offset: u32) -> hql_common::Position {
        // The lexer itself is file-agnostic; callers that need a real
        // `Position` (file path attached) go through `lex_file`.
        hql_common::Position::new(Arc::from(""), 1, 1, offset)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted_eof {
            return None;
        }
        match self.lex_one() {
            Ok(Some(tok)) => Some(Ok(tok)),
            Ok(None) => {
                self.emitted_eof = true;
                // One past the conceptual end-of-input slot, not level with
                // it (spec.md §8 scenario 1: `(let x 1` reports end-of-input
                // at column 10, not column 9).
                let eof = self.cursor.pos() + 1;
                Some(Ok(Token::new(TokenKind::Eof, eof, eof)))
            }
            Err(e) => {
                self.emitted_eof = true;
                Some(Err(e))
            }
        }
    }
}

/// Tokenize `source` registered under `path`, producing errors with a fully
/// resolved [`hql_common::Position`] (file path, line, column).
pub fn lex_file(
    registry: &SourceRegistry,
    path: &Arc<str>,
) -> Result<Vec<Token>, hql_common::LexError> {
    let source = registry
        .text(path)
        .unwrap_or_else(|| panic!("source file not registered: {path}"));
    let mut out = Vec::new();
    for tok in Lexer::new(source) {
        let tok = tok.map_err(|e| hql_common::LexError {
            kind: e.kind,
            position: registry.position(path, e.position.byte_offset),
        })?;
        if !matches!(tok.kind, TokenKind::Comment | TokenKind::Whitespace) {
            out.push(tok);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_basic_call() {
        assert_eq!(
            kinds("(+ 1 2)"),
            vec![
                TokenKind::LParen,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_quote_family() {
        assert_eq!(
            kinds("'x `y ~z ~@w"),
            vec![
                TokenKind::Quote,
                TokenKind::Symbol,
                TokenKind::Backtick,
                TokenKind::Symbol,
                TokenKind::Unquote,
                TokenKind::Symbol,
                TokenKind::UnquoteSplicing,
                TokenKind::Symbol,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_dot_prefixed_symbol_as_two_tokens() {
        assert_eq!(
            kinds(".red"),
            vec![TokenKind::Dot, TokenKind::Symbol, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_dotted_path_as_one_symbol() {
        assert_eq!(
            kinds("module.prop"),
            vec![TokenKind::Symbol, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_set_literal_opener() {
        assert_eq!(
            kinds("#[1 2]"),
            vec![
                TokenKind::HashLBracket,
                TokenKind::Symbol,
                TokenKind::Symbol,
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_named_arg_key_with_trailing_colon() {
        assert_eq!(
            kinds("key: 1"),
            vec![TokenKind::Symbol, TokenKind::Symbol, TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_standalone_colon_for_enum_type() {
        assert_eq!(
            kinds("Color : String"),
            vec![
                TokenKind::Symbol,
                TokenKind::Colon,
                TokenKind::Symbol,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_string_with_escape() {
        assert_eq!(
            kinds(r#""a\"b""#),
            vec![TokenKind::String, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        let err = Lexer::tokenize(r#""abc"#).unwrap_err();
        assert_eq!(err.kind, hql_common::LexErrorKind::UnterminatedString);
    }

    #[test]
    fn drops_line_and_block_comments() {
        assert_eq!(
            kinds("; comment\n1 // also\n/* block */ 2"),
            vec![TokenKind::Symbol, TokenKind::Symbol, TokenKind::Eof]
        );
    }

    #[test]
    fn lex_file_resolves_position() {
        let mut reg = SourceRegistry::new();
        let path = reg.register("x.hql", "(+ 1 \"unterminated");
        let err = lex_file(&reg, &path).unwrap_err();
        assert_eq!(err.position.file_path.as_ref(), "x.hql");
    }
}
