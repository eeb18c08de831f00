//! Fused tokenizer, operator-precedence parser and evaluator
//!
//! Tokens are pulled from a [`Cursor`] one at a time. Operands are pushed
//! on the value stack as soon as they are read; operators wait on the
//! operator stack until an operator of lower precedence, a closing
//! parenthesis or the end of the expression forces them to be applied.

use tracing::trace;

use crate::diagnostics::CalcError;
use crate::env::ItemKind;
use crate::lexer::{Cursor, Span, Token, TokenKind, parse_datetime, parse_number};
use crate::quantity::Quantity;
use crate::units::parse_unit_expression;

use super::ops::{BinaryOp, UnaryOp, eval_binary, eval_unary};
use super::{EvalContext, Operand, unescape};

#[derive(Debug, Clone, Copy)]
enum StackOp {
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// Open parenthesis and where it was written
    Paren(Span),
}

impl StackOp {
    fn precedence(&self) -> u8 {
        match self {
            StackOp::Binary(op) => op.precedence(),
            StackOp::Unary(op) => op.precedence(),
            StackOp::Paren(_) => 0,
        }
    }
}

#[derive(Debug, Default)]
struct Engine {
    operands: Vec<Operand>,
    operators: Vec<StackOp>,
    /// Parentheses opened by this expression and not yet closed
    depth: usize,
    /// Whether anything but whitespace was read
    started: bool,
}

/// Evaluate one expression at the cursor.
///
/// Stops before a token in `follow` that appears outside parentheses, and
/// always before `;`. On failure the cursor is left at the offending token.
pub(crate) fn evaluate<C>(
    ctx: &mut C,
    cursor: &mut Cursor<'_>,
    follow: &[TokenKind],
) -> Result<Operand, CalcError>
where
    C: EvalContext + ?Sized,
{
    Engine::default().run(ctx, cursor, follow)
}

impl Engine {
    fn run<C>(
        mut self,
        ctx: &mut C,
        cursor: &mut Cursor<'_>,
        follow: &[TokenKind],
    ) -> Result<Operand, CalcError>
    where
        C: EvalContext + ?Sized,
    {
        let mut expect_operand = true;

        while let Some(token) = cursor.peek()? {
            if token.kind == TokenKind::Semi || (self.depth == 0 && follow.contains(&token.kind)) {
                break;
            }
            self.started = true;

            if expect_operand {
                expect_operand = self.operand(ctx, cursor, token)?;
                continue;
            }

            match token.kind {
                TokenKind::RParen => {
                    if self.depth == 0 {
                        return Err(CalcError::UnmatchedParen {
                            span: token.span.into(),
                        });
                    }
                    cursor.bump(&token);
                    self.close_paren(ctx)?;
                }
                kind => match BinaryOp::from_token(kind) {
                    Some(op) => {
                        cursor.bump(&token);
                        while self
                            .operators
                            .last()
                            .is_some_and(|top| top.precedence() >= op.precedence())
                        {
                            self.apply_top(ctx)?;
                        }
                        trace!(op = %op, "push operator");
                        self.operators.push(StackOp::Binary(op));
                        expect_operand = true;
                    }
                    None if starts_operand(kind) => {
                        return Err(CalcError::MissingOperator {
                            found: token.text.to_string(),
                            span: token.span.into(),
                        });
                    }
                    None => {
                        return Err(CalcError::UnexpectedToken {
                            expected: "an operator or the end of the expression".into(),
                            found: token.text.to_string(),
                            span: token.span.into(),
                        });
                    }
                },
            }
        }

        if expect_operand {
            if !self.started {
                return Err(CalcError::EmptyExpression);
            }
            return Err(CalcError::MissingOperand {
                span: cursor.here().into(),
            });
        }

        while let Some(top) = self.operators.last() {
            if let StackOp::Paren(_) = top {
                return Err(CalcError::MissingCloser {
                    closer: ")".into(),
                    span: cursor.here().into(),
                });
            }
            self.apply_top(ctx)?;
        }

        match (self.operands.pop(), self.operands.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(CalcError::evaluation("malformed expression")),
        }
    }

    /// Read an operand or prefix operator; returns whether an operand is
    /// still expected afterwards
    fn operand<C>(
        &mut self,
        ctx: &mut C,
        cursor: &mut Cursor<'_>,
        token: Token<'_>,
    ) -> Result<bool, CalcError>
    where
        C: EvalContext + ?Sized,
    {
        let prefix = match token.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        // A prefix operator never pops: its operand has not been read yet
        if let Some(op) = prefix {
            cursor.bump(&token);
            self.operators.push(StackOp::Unary(op));
            return Ok(true);
        }

        let value = match token.kind {
            TokenKind::LParen => {
                cursor.bump(&token);
                self.operators.push(StackOp::Paren(token.span));
                self.depth += 1;
                return Ok(true);
            }
            TokenKind::Number | TokenKind::HexNumber => {
                cursor.bump(&token);
                let value = parse_number(token.text, token.span)?;
                let unit = parse_unit_expression(cursor, &mut |name| ctx.unit(name))?;
                Operand::Quantity(Quantity::new(value, unit.unwrap_or_default()))
            }
            TokenKind::StringLit => {
                cursor.bump(&token);
                Operand::String(unescape(token.text))
            }
            TokenKind::DateTimeLit => {
                cursor.bump(&token);
                Operand::DateTime(parse_datetime(token.text, token.span)?)
            }
            TokenKind::Ident => identifier(ctx, cursor)?,
            _ => {
                return Err(CalcError::MissingOperand {
                    span: token.span.into(),
                });
            }
        };
        self.operands.push(value);
        Ok(false)
    }

    fn close_paren<C>(&mut self, ctx: &mut C) -> Result<(), CalcError>
    where
        C: EvalContext + ?Sized,
    {
        loop {
            match self.operators.last() {
                Some(StackOp::Paren(_)) => {
                    self.operators.pop();
                    self.depth -= 1;
                    return Ok(());
                }
                Some(_) => self.apply_top(ctx)?,
                None => return Err(CalcError::evaluation("parenthesis stack out of balance")),
            }
        }
    }

    fn apply_top<C>(&mut self, ctx: &mut C) -> Result<(), CalcError>
    where
        C: EvalContext + ?Sized,
    {
        let missing = || CalcError::evaluation("operator without operands");
        let result = match self.operators.pop() {
            Some(StackOp::Binary(op)) => {
                let rhs = self.operands.pop().ok_or_else(missing)?;
                let lhs = self.operands.pop().ok_or_else(missing)?;
                trace!(op = %op, "apply binary");
                eval_binary(op, lhs, rhs, ctx.registry())?
            }
            Some(StackOp::Unary(op)) => {
                let operand = self.operands.pop().ok_or_else(missing)?;
                trace!(op = op.symbol(), "apply unary");
                eval_unary(op, operand)?
            }
            Some(StackOp::Paren(span)) => {
                return Err(CalcError::MissingCloser {
                    closer: ")".into(),
                    span: span.into(),
                });
            }
            None => return Err(missing()),
        };
        self.operands.push(result);
        Ok(())
    }
}

fn starts_operand(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number
            | TokenKind::HexNumber
            | TokenKind::StringLit
            | TokenKind::DateTimeLit
            | TokenKind::Ident
            | TokenKind::LParen
            | TokenKind::Bang
    )
}

/// Resolve an identifier operand: a value, a unit, a function call, a
/// boolean literal, or a script read as `name()`
fn identifier<C>(ctx: &mut C, cursor: &mut Cursor<'_>) -> Result<Operand, CalcError>
where
    C: EvalContext + ?Sized,
{
    let Some(name) = cursor.eat_dotted_name()? else {
        return Err(CalcError::MissingOperand {
            span: cursor.here().into(),
        });
    };
    let kind = if name.contains('.') {
        ctx.qualified_item(&name)
    } else {
        ctx.identifier_item(&name)
    };

    match kind {
        Some(ItemKind::Variable | ItemKind::Constant) => ctx
            .variable_value(&name)
            .ok_or(CalcError::UnknownIdentifier { name }),
        Some(ItemKind::Unit) => ctx
            .unit(&name)
            .map(Operand::Unit)
            .ok_or(CalcError::UnknownUnit { name }),
        Some(ItemKind::Function) => {
            let args = if cursor.peek_kind() == Some(TokenKind::LParen) {
                arguments(ctx, cursor)?
            } else {
                Vec::new()
            };
            ctx.call_function(&name, args)
        }
        Some(kind @ (ItemKind::System | ItemKind::Namespace)) => Err(CalcError::NotAValue {
            name,
            kind: kind.to_string(),
        }),
        None => {
            if name.eq_ignore_ascii_case("true") {
                return Ok(Operand::Boolean(true));
            }
            if name.eq_ignore_ascii_case("false") {
                return Ok(Operand::Boolean(false));
            }
            if cursor.peek_kind() == Some(TokenKind::LParen) {
                let args = arguments(ctx, cursor)?;
                if !args.is_empty() {
                    return Err(CalcError::NotCallable { name });
                }
                return ctx.read_script(&name);
            }
            ctx.unit(&name)
                .map(Operand::Unit)
                .ok_or(CalcError::UnknownIdentifier { name })
        }
    }
}

/// `( expr, expr, ... )`
fn arguments<C>(ctx: &mut C, cursor: &mut Cursor<'_>) -> Result<Vec<Operand>, CalcError>
where
    C: EvalContext + ?Sized,
{
    if cursor.eat(TokenKind::LParen).is_none() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    if cursor.eat(TokenKind::RParen).is_some() {
        return Ok(args);
    }
    loop {
        args.push(evaluate(ctx, cursor, &[TokenKind::Comma, TokenKind::RParen])?);
        if cursor.eat(TokenKind::Comma).is_some() {
            continue;
        }
        if cursor.eat(TokenKind::RParen).is_some() {
            return Ok(args);
        }
        return Err(CalcError::MissingCloser {
            closer: ")".into(),
            span: cursor.here().into(),
        });
    }
}
