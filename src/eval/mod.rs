//! Expression evaluation
//!
//! The evaluator knows nothing about where identifiers live. Everything it
//! needs from its host goes through [`EvalContext`], so the same grammar
//! serves the interactive session, script runs and tests.
//!
//! The `parse_*` functions share one calling convention: they take the text
//! to read, push any diagnostics into a [`Reporter`], and return what they
//! produced together with the input they did not consume.

mod engine;
mod operand;
mod ops;

pub use operand::{Operand, unescape};
pub use ops::{BinaryOp, UnaryOp, eval_binary, eval_unary};

use crate::diagnostics::{CalcError, Reporter};
use crate::env::ItemKind;
use crate::lexer::{Cursor, TokenKind};
use crate::quantity::unit_label;
use crate::units::{Unit, UnitRegistry, parse_unit_expression};

/// Lookups and calls the evaluator delegates to its host
pub trait EvalContext {
    fn registry(&self) -> &UnitRegistry;

    /// Kind of the item an unqualified name is bound to
    fn identifier_item(&self, name: &str) -> Option<ItemKind>;

    /// Kind of the item a dotted name such as `Lab.g` is bound to
    fn qualified_item(&self, name: &str) -> Option<ItemKind>;

    /// Value of a variable or constant
    fn variable_value(&self, name: &str) -> Option<Operand>;

    /// A unit by name or symbol; `None` when the name is bound to anything
    /// else
    fn unit(&self, name: &str) -> Option<Unit>;

    fn call_function(&mut self, name: &str, args: Vec<Operand>) -> Result<Operand, CalcError>;

    /// Run the script `name` as a function without arguments
    fn read_script(&mut self, name: &str) -> Result<Operand, CalcError>;
}

fn with_follow(follow: &[TokenKind], extra: TokenKind) -> Vec<TokenKind> {
    let mut all = follow.to_vec();
    if !all.contains(&extra) {
        all.push(extra);
    }
    all
}

/// Evaluate one expression
pub fn parse_expression<'a, C>(
    ctx: &mut C,
    line: &'a str,
    reporter: &mut Reporter,
    follow: &[TokenKind],
) -> (Option<Operand>, &'a str)
where
    C: EvalContext + ?Sized,
{
    let mut cursor = Cursor::new(line);
    match engine::evaluate(ctx, &mut cursor, follow) {
        Ok(value) => (Some(value), cursor.rest()),
        Err(error) => {
            reporter.error(error);
            (None, cursor.rest())
        }
    }
}

/// Evaluate comma separated expressions
pub fn parse_expression_list<'a, C>(
    ctx: &mut C,
    line: &'a str,
    reporter: &mut Reporter,
    follow: &[TokenKind],
) -> (Option<Vec<Operand>>, &'a str)
where
    C: EvalContext + ?Sized,
{
    let item_follow = with_follow(follow, TokenKind::Comma);
    let mut cursor = Cursor::new(line);
    let mut values = Vec::new();
    loop {
        match engine::evaluate(ctx, &mut cursor, &item_follow) {
            Ok(value) => values.push(value),
            Err(error) => {
                reporter.error(error);
                return (None, cursor.rest());
            }
        }
        if cursor.eat(TokenKind::Comma).is_none() {
            return (Some(values), cursor.rest());
        }
    }
}

/// Evaluate an expression that must yield `true` or `false`
pub fn parse_boolean_expression<'a, C>(
    ctx: &mut C,
    line: &'a str,
    reporter: &mut Reporter,
    follow: &[TokenKind],
) -> (Option<bool>, &'a str)
where
    C: EvalContext + ?Sized,
{
    let (value, rest) = parse_expression(ctx, line, reporter, follow);
    match value {
        Some(Operand::Boolean(b)) => (Some(b), rest),
        Some(other) => {
            reporter.error(CalcError::ExpectedBoolean {
                found: other.describe(),
            });
            (None, rest)
        }
        None => (None, rest),
    }
}

/// Evaluate an expression with an optional `[unit]` or `[System]` suffix.
///
/// Without a suffix, quantities are put in the form they are shown in:
/// named derived units are recognized and runtime-declared units are
/// expanded into their primary unit.
pub fn parse_optional_converted_expression<'a, C>(
    ctx: &mut C,
    line: &'a str,
    reporter: &mut Reporter,
    follow: &[TokenKind],
) -> (Option<Operand>, &'a str)
where
    C: EvalContext + ?Sized,
{
    let expr_follow = with_follow(follow, TokenKind::LBracket);
    let mut cursor = Cursor::new(line);
    let value = match engine::evaluate(ctx, &mut cursor, &expr_follow) {
        Ok(value) => value,
        Err(error) => {
            reporter.error(error);
            return (None, cursor.rest());
        }
    };

    if cursor.peek_kind() != Some(TokenKind::LBracket) {
        let value = match value {
            Operand::Quantity(q) => Operand::Quantity(q.normalized(ctx.registry())),
            other => other,
        };
        return (Some(value), cursor.rest());
    }

    match convert_suffix(ctx, &mut cursor, value) {
        Ok(value) => (Some(value), cursor.rest()),
        Err(error) => {
            reporter.error(error);
            (None, cursor.rest())
        }
    }
}

fn convert_suffix<C>(ctx: &mut C, cursor: &mut Cursor<'_>, value: Operand) -> Result<Operand, CalcError>
where
    C: EvalContext + ?Sized,
{
    let open = cursor.eat(TokenKind::LBracket);
    debug_assert!(open.is_some());

    let quantity = match value {
        Operand::Quantity(q) => q,
        other => {
            return Err(CalcError::InvalidOperand {
                op: "[]".into(),
                operand: other.describe(),
            });
        }
    };

    let mark = cursor.pos();
    let system = cursor
        .eat_dotted_name()?
        .and_then(|name| ctx.registry().system_by_name(&name))
        .filter(|_| cursor.peek_kind() == Some(TokenKind::RBracket));

    let converted = match system {
        Some(system) => {
            let registry = ctx.registry();
            registry
                .convert_to_system(&quantity, system)
                .ok_or_else(|| CalcError::ConversionImpossible {
                    from: unit_label(&quantity.unit),
                    to: registry
                        .system(system)
                        .map(|s| s.name.clone())
                        .unwrap_or_default(),
                })?
        }
        None => {
            cursor.reset(mark);
            let unit = parse_unit_expression(cursor, &mut |name| ctx.unit(name))?
                .ok_or_else(|| unknown_unit(cursor))?;
            quantity.convert_to(ctx.registry(), &unit)?
        }
    };

    if cursor.eat(TokenKind::RBracket).is_none() {
        return Err(CalcError::MissingCloser {
            closer: "]".into(),
            span: cursor.here().into(),
        });
    }
    Ok(Operand::Quantity(converted))
}

fn unknown_unit(cursor: &Cursor<'_>) -> CalcError {
    match cursor.peek() {
        Ok(Some(token)) if token.kind == TokenKind::Ident => CalcError::UnknownUnit {
            name: token.text.to_string(),
        },
        Ok(Some(token)) => CalcError::UnexpectedToken {
            expected: "a unit".into(),
            found: token.text.to_string(),
            span: token.span.into(),
        },
        Ok(None) => CalcError::MissingOperand {
            span: cursor.here().into(),
        },
        Err(error) => error,
    }
}

/// Read a unit expression such as `Kg·m/s2`
pub fn parse_physical_unit<'a, C>(
    ctx: &C,
    line: &'a str,
    reporter: &mut Reporter,
) -> (Option<Unit>, &'a str)
where
    C: EvalContext + ?Sized,
{
    let mut cursor = Cursor::new(line);
    match parse_unit_expression(&mut cursor, &mut |name| ctx.unit(name)) {
        Ok(Some(unit)) => (Some(unit), cursor.rest()),
        Ok(None) => {
            reporter.error(unknown_unit(&cursor));
            (None, cursor.rest())
        }
        Err(error) => {
            reporter.error(error);
            (None, cursor.rest())
        }
    }
}

/// Read a name such as `x` or `Lab.Consts.g`
pub fn parse_qualified_identifier<'a>(
    line: &'a str,
    reporter: &mut Reporter,
) -> (Option<String>, &'a str) {
    let mut cursor = Cursor::new(line);
    match cursor.eat_dotted_name() {
        Ok(Some(name)) => (Some(name), cursor.rest()),
        Ok(None) => {
            let error = match cursor.peek() {
                Ok(Some(token)) => CalcError::UnexpectedToken {
                    expected: "an identifier".into(),
                    found: token.text.to_string(),
                    span: token.span.into(),
                },
                Ok(None) => CalcError::MissingOperand {
                    span: cursor.here().into(),
                },
                Err(error) => error,
            };
            reporter.error(error);
            (None, cursor.rest())
        }
        Err(error) => {
            reporter.error(error);
            (None, cursor.rest())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    /// Host with a flat variable table and one function `twice`
    struct TestContext {
        registry: UnitRegistry,
        variables: HashMap<String, Operand>,
    }

    impl TestContext {
        fn new() -> Self {
            Self {
                registry: UnitRegistry::standard(),
                variables: HashMap::new(),
            }
        }
    }

    impl EvalContext for TestContext {
        fn registry(&self) -> &UnitRegistry {
            &self.registry
        }

        fn identifier_item(&self, name: &str) -> Option<ItemKind> {
            if self.variables.contains_key(name) {
                Some(ItemKind::Variable)
            } else if name == "twice" {
                Some(ItemKind::Function)
            } else {
                None
            }
        }

        fn qualified_item(&self, _name: &str) -> Option<ItemKind> {
            None
        }

        fn variable_value(&self, name: &str) -> Option<Operand> {
            self.variables.get(name).cloned()
        }

        fn unit(&self, name: &str) -> Option<Unit> {
            if self.variables.contains_key(name) {
                return None;
            }
            self.registry.lookup(name)
        }

        fn call_function(&mut self, name: &str, args: Vec<Operand>) -> Result<Operand, CalcError> {
            match (name, args.as_slice()) {
                ("twice", [x]) => eval_binary(BinaryOp::Mul, x.clone(), Operand::number(2.0), &self.registry),
                _ => Err(CalcError::WrongArity {
                    name: name.to_string(),
                    expected: 1,
                    found: args.len(),
                }),
            }
        }

        fn read_script(&mut self, name: &str) -> Result<Operand, CalcError> {
            Err(CalcError::MissingScript {
                path: name.to_string(),
            })
        }
    }

    fn eval(ctx: &mut TestContext, line: &str) -> Result<String, String> {
        let mut reporter = Reporter::new();
        let (value, _) = parse_optional_converted_expression(ctx, line, &mut reporter, &[]);
        value.map(|v| v.to_string()).ok_or_else(|| reporter.message())
    }

    #[test]
    fn test_precedence() {
        let mut ctx = TestContext::new();
        assert_eq!(eval(&mut ctx, "2 + 3 * 4"), Ok("14".into()));
        assert_eq!(eval(&mut ctx, "(2 + 3) * 4"), Ok("20".into()));
        assert_eq!(eval(&mut ctx, "2 ^ 3 ^ 2"), Ok("64".into()));
        assert_eq!(eval(&mut ctx, "10 - 4 - 3"), Ok("3".into()));
        assert_eq!(eval(&mut ctx, "2 * -3"), Ok("-6".into()));
        assert_eq!(eval(&mut ctx, "1 + 2 == 3"), Ok("true".into()));
        assert_eq!(eval(&mut ctx, "!(1 > 2)"), Ok("true".into()));
    }

    #[test]
    fn test_units_on_literals() {
        let mut ctx = TestContext::new();
        assert_eq!(eval(&mut ctx, "3 N * 4 m"), Ok("12 J".into()));
        assert_eq!(eval(&mut ctx, "13 g + 99.987 Kg - 10 mg"), Ok("99999.99 g".into()));
        assert_eq!(eval(&mut ctx, "340 m/s [Km/h]"), Ok("1224 Km/h".into()));
        assert_eq!(eval(&mut ctx, "0x10 m"), Ok("16 m".into()));
        assert_eq!(eval(&mut ctx, "2 * m"), Ok("2 m".into()));
    }

    #[test]
    fn test_remainder_after_follow_token() {
        let mut ctx = TestContext::new();
        let mut reporter = Reporter::new();
        let (value, rest) = parse_expression(&mut ctx, "1 + 2, 5", &mut reporter, &[TokenKind::Comma]);
        assert_eq!(value, Some(Operand::number(3.0)));
        assert_eq!(rest, ", 5");

        let (values, rest) = parse_expression_list(&mut ctx, "1, 2 m; x", &mut reporter, &[]);
        assert_eq!(values.map(|v| v.len()), Some(2));
        assert_eq!(rest, "; x");
        assert!(!reporter.has_errors());
    }

    #[test]
    fn test_syntax_errors() {
        let mut ctx = TestContext::new();
        let mut reporter = Reporter::new();
        let (value, rest) = parse_expression(&mut ctx, "1 +", &mut reporter, &[]);
        assert!(value.is_none());
        assert_eq!(rest, "");
        assert!(matches!(reporter.errors()[0], CalcError::MissingOperand { .. }));

        let mut reporter = Reporter::new();
        let (_, rest) = parse_expression(&mut ctx, "(1 + 2", &mut reporter, &[]);
        assert_eq!(rest, "");
        assert!(matches!(reporter.errors()[0], CalcError::MissingCloser { .. }));

        let mut reporter = Reporter::new();
        let (_, rest) = parse_expression(&mut ctx, "1 + 2) * 3", &mut reporter, &[]);
        assert_eq!(rest, ") * 3");
        assert!(matches!(reporter.errors()[0], CalcError::UnmatchedParen { .. }));

        let mut reporter = Reporter::new();
        let (_, rest) = parse_expression(&mut ctx, "2 3", &mut reporter, &[]);
        assert_eq!(rest, "3");
        assert!(matches!(reporter.errors()[0], CalcError::MissingOperator { .. }));

        let mut reporter = Reporter::new();
        parse_expression(&mut ctx, "   ", &mut reporter, &[]);
        assert_eq!(reporter.errors(), &[CalcError::EmptyExpression]);
    }

    #[test]
    fn test_variables_and_calls() {
        let mut ctx = TestContext::new();
        ctx.variables
            .insert("x".into(), Operand::Quantity(Quantity::parse("3 m", &ctx.registry).unwrap()));
        assert_eq!(eval(&mut ctx, "twice(x + 1 m)"), Ok("8 m".into()));
        assert_eq!(eval(&mut ctx, "twice(1, 2)").is_err(), true);
        assert_eq!(
            eval(&mut ctx, "nosuch()"),
            Err("Script file `nosuch` not found".into())
        );
        assert_eq!(
            eval(&mut ctx, "y + 1"),
            Err("Unknown identifier `y`".into())
        );
    }

    #[test]
    fn test_conversion_suffix_errors() {
        let mut ctx = TestContext::new();
        assert!(matches!(eval(&mut ctx, "3 m [s]"), Err(m) if m.contains("Cannot convert")));
        assert!(matches!(eval(&mut ctx, "3 m [Km"), Err(m) if m.contains("Missing `]`")));
        assert!(matches!(eval(&mut ctx, "3 m [Bogus]"), Err(m) if m.contains("Unknown unit")));
        assert_eq!(eval(&mut ctx, "1 mi [SI]"), Ok("1609.344 m".into()));
    }

    #[test]
    fn test_boolean_expression() {
        let mut ctx = TestContext::new();
        let mut reporter = Reporter::new();
        let (b, _) = parse_boolean_expression(&mut ctx, "1 Km > 900 m", &mut reporter, &[]);
        assert_eq!(b, Some(true));
        let (b, _) = parse_boolean_expression(&mut ctx, "1 Km", &mut reporter, &[]);
        assert_eq!(b, None);
        assert!(matches!(reporter.errors()[0], CalcError::ExpectedBoolean { .. }));
    }

    #[test]
    fn test_physical_unit_and_identifier() {
        let ctx = TestContext::new();
        let mut reporter = Reporter::new();
        let (unit, rest) = parse_physical_unit(&ctx, "Kg*m/s^2 rest", &mut reporter);
        assert_eq!(unit.map(|u| u.to_string()), Some("Kg·m/s2".into()));
        assert_eq!(rest, " rest");

        let (name, rest) = parse_qualified_identifier("Lab.g = 9.81", &mut reporter);
        assert_eq!(name.as_deref(), Some("Lab.g"));
        assert_eq!(rest, " = 9.81");
        assert!(!reporter.has_errors());
    }

    use crate::quantity::Quantity;
}
