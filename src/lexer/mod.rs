//! Lexer for calculator expressions
//!
//! Expressions are tokenized lazily: the parser asks a [`Cursor`] for the
//! next token of whatever input is still unconsumed, so a parse can stop at
//! any token and hand the remainder back to its caller.

mod number;
mod tokens;

pub use number::{parse_datetime, parse_number};
pub use tokens::{Span, Token, TokenKind};

use crate::diagnostics::CalcError;
use logos::Logos;

/// Position in a line of input, lexing on demand
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset of the first unconsumed character
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Unconsumed input
    pub fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    pub fn is_at_end(&self) -> bool {
        self.rest().trim_start().is_empty()
    }

    /// Look at the next token without consuming it
    pub fn peek(&self) -> Result<Option<Token<'s>>, CalcError> {
        let rest = self.rest();
        let mut lexer = TokenKind::lexer(rest);
        match lexer.next() {
            None => Ok(None),
            Some(Ok(kind)) => {
                let range = lexer.span();
                Ok(Some(Token {
                    kind,
                    span: Span::new(self.pos + range.start, self.pos + range.end),
                    text: &rest[range],
                }))
            }
            Some(Err(())) => {
                let range = lexer.span();
                Err(CalcError::UnrecognizedToken {
                    text: rest[range.clone()].to_string(),
                    span: Span::new(self.pos + range.start, self.pos + range.end).into(),
                })
            }
        }
    }

    /// Kind of the next token, treating lexical errors as "nothing"
    pub fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().ok().flatten().map(|t| t.kind)
    }

    /// Consume a token previously returned by [`Cursor::peek`]
    pub fn bump(&mut self, token: &Token<'_>) {
        debug_assert!(token.span.end >= self.pos);
        self.pos = token.span.end;
    }

    /// Consume the next token if it has the given kind
    pub fn eat(&mut self, kind: TokenKind) -> Option<Token<'s>> {
        match self.peek() {
            Ok(Some(token)) if token.kind == kind => {
                self.bump(&token);
                Some(token)
            }
            _ => None,
        }
    }

    /// Rewind or fast-forward to a position obtained from [`Cursor::pos`]
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    /// Consume `a` or `a.b.c` (no whitespace around the dots)
    pub fn eat_dotted_name(&mut self) -> Result<Option<String>, CalcError> {
        let Some(token) = self.peek()? else {
            return Ok(None);
        };
        if token.kind != TokenKind::Ident {
            return Ok(None);
        }
        self.bump(&token);
        let mut name = token.text.to_string();

        while self.rest().starts_with('.') {
            let mark = self.pos;
            let Some(dot) = self.eat(TokenKind::Dot) else {
                break;
            };
            match self.peek()? {
                Some(next) if next.kind == TokenKind::Ident && next.span.start == dot.span.end => {
                    self.bump(&next);
                    name.push('.');
                    name.push_str(next.text);
                }
                _ => {
                    self.reset(mark);
                    break;
                }
            }
        }
        Ok(Some(name))
    }

    /// Span of the next token, or an empty span at the end of input
    pub fn here(&self) -> Span {
        match self.peek() {
            Ok(Some(token)) => token.span,
            _ => Span::at(self.src.len()),
        }
    }
}

/// Tokenize a whole line (used by tests and diagnostics)
pub fn lex(source: &str) -> Result<Vec<Token<'_>>, CalcError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = cursor.peek()? {
        cursor.bump(&token);
        tokens.push(token);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_peek_does_not_consume() {
        let cursor = Cursor::new("  3 m");
        let first = cursor.peek().unwrap().unwrap();
        assert_eq!(first.kind, TokenKind::Number);
        assert_eq!(first.span, Span::new(2, 3));
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn test_cursor_rest_after_bump() {
        let mut cursor = Cursor::new("x, y");
        let token = cursor.peek().unwrap().unwrap();
        cursor.bump(&token);
        assert_eq!(cursor.rest(), ", y");
        assert!(cursor.eat(TokenKind::Comma).is_some());
        assert_eq!(cursor.rest(), " y");
    }

    #[test]
    fn test_dotted_name() {
        let mut cursor = Cursor::new("Lab.Consts.g * 2");
        assert_eq!(
            cursor.eat_dotted_name().unwrap().as_deref(),
            Some("Lab.Consts.g")
        );
        assert_eq!(cursor.rest(), " * 2");

        let mut cursor = Cursor::new("x. y");
        assert_eq!(cursor.eat_dotted_name().unwrap().as_deref(), Some("x"));
        assert_eq!(cursor.rest(), ". y");
    }

    #[test]
    fn test_unrecognized_character() {
        let err = lex("3 $ 4").unwrap_err();
        assert!(matches!(err, CalcError::UnrecognizedToken { ref text, .. } if text == "$"));
    }
}
