//! Unit expression grammar
//!
//! ```text
//! unit   := factor (('*' | '·' | '/') factor)*
//! factor := name ('.' name)* ('^' ['-'|'+'] integer)?
//! ```
//!
//! The grammar is shared by literal suffixes (`340 m/s`), bracketed
//! conversions (`[Km/h]`), and quantity parsing. Name resolution is left to
//! the caller. A trailing operator that is not followed by a unit is left
//! unconsumed, so `3 N * 4 m` reads the unit `N` and stops before `*`.

use crate::diagnostics::CalcError;
use crate::lexer::{Cursor, TokenKind};

use super::Unit;

/// Parse a unit expression at the cursor.
///
/// Returns `Ok(None)` without consuming anything if the cursor is not at
/// a name that `resolve` accepts.
pub fn parse_unit_expression<F>(
    cursor: &mut Cursor<'_>,
    resolve: &mut F,
) -> Result<Option<Unit>, CalcError>
where
    F: FnMut(&str) -> Option<Unit>,
{
    let Some(first) = parse_factor(cursor, resolve)? else {
        return Ok(None);
    };
    let mut factors = vec![first];

    loop {
        let sign = match cursor.peek_kind() {
            Some(TokenKind::Star | TokenKind::MiddleDot) => 1,
            Some(TokenKind::Slash) => -1,
            _ => break,
        };
        let mark = cursor.pos();
        if let Some(op) = cursor.peek()? {
            cursor.bump(&op);
        }
        match parse_factor(cursor, resolve)? {
            Some((unit, exp)) => factors.push((unit, exp.saturating_mul(sign))),
            None => {
                cursor.reset(mark);
                break;
            }
        }
    }

    Ok(Some(Unit::combine(factors)))
}

fn parse_factor<F>(cursor: &mut Cursor<'_>, resolve: &mut F) -> Result<Option<(Unit, i8)>, CalcError>
where
    F: FnMut(&str) -> Option<Unit>,
{
    let start = cursor.pos();
    let Some(name) = cursor.eat_dotted_name()? else {
        return Ok(None);
    };
    let Some(unit) = resolve(&name) else {
        cursor.reset(start);
        return Ok(None);
    };

    let exp = parse_exponent(cursor)?.unwrap_or(1);
    Ok(Some((unit, exp)))
}

/// `^ [-|+] integer`; anything else is left for the caller
fn parse_exponent(cursor: &mut Cursor<'_>) -> Result<Option<i8>, CalcError> {
    let mark = cursor.pos();
    if cursor.eat(TokenKind::Caret).is_none() {
        return Ok(None);
    }
    let negative = if cursor.eat(TokenKind::Minus).is_some() {
        true
    } else {
        cursor.eat(TokenKind::Plus);
        false
    };
    let exp = match cursor.peek()? {
        Some(token) if token.kind == TokenKind::Number => match token.text.parse::<i8>() {
            Ok(n) => {
                cursor.bump(&token);
                Some(if negative { -n } else { n })
            }
            Err(_) => None,
        },
        _ => None,
    };
    if exp.is_none() {
        cursor.reset(mark);
    }
    Ok(exp)
}
