//! Diagnostic reporting with source locations
//!
//! Every failure the calculator can report is a [`CalcError`]. Parsing and
//! evaluation never panic on user input: they push diagnostics into a
//! [`Reporter`] and hand back whatever input they did not consume.

use crate::lexer::Span;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Convert our Span to miette's SourceSpan
impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// Calculator diagnostic
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum CalcError {
    // === Lexical Errors ===
    #[error("Unrecognized token `{text}` at position {}", .span.offset())]
    #[diagnostic(code(lex::unrecognized))]
    UnrecognizedToken {
        text: String,
        #[label("not a valid token")]
        span: SourceSpan,
    },

    #[error("Invalid number `{text}`")]
    #[diagnostic(
        code(lex::invalid_number),
        help("hexadecimal numbers start with `0x` and use `H` for exponents")
    )]
    InvalidNumber {
        text: String,
        #[label("cannot read this number")]
        span: SourceSpan,
    },

    #[error("Invalid date/time `{text}`")]
    #[diagnostic(code(lex::invalid_datetime), help("write dates as #YYYY-MM-DD HH:MM:SS#"))]
    InvalidDateTime {
        text: String,
        #[label("cannot read this date")]
        span: SourceSpan,
    },

    // === Syntax Errors ===
    #[error("Missing operand")]
    #[diagnostic(code(syntax::missing_operand))]
    MissingOperand {
        #[label("operand expected here")]
        span: SourceSpan,
    },

    #[error("Missing operator before `{found}`")]
    #[diagnostic(code(syntax::missing_operator))]
    MissingOperator {
        found: String,
        #[label("operator expected before this")]
        span: SourceSpan,
    },

    #[error("Unexpected `{found}`, expected {expected}")]
    #[diagnostic(code(syntax::unexpected_token))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("unexpected here")]
        span: SourceSpan,
    },

    #[error("Unmatched `)`")]
    #[diagnostic(code(syntax::unmatched_paren))]
    UnmatchedParen {
        #[label("no `(` to close")]
        span: SourceSpan,
    },

    #[error("Missing `{closer}`")]
    #[diagnostic(code(syntax::missing_closer))]
    MissingCloser {
        closer: String,
        #[label("expected `{closer}` here")]
        span: SourceSpan,
    },

    #[error("Empty expression")]
    #[diagnostic(code(syntax::empty_expression))]
    EmptyExpression,

    // === Semantic Errors ===
    #[error("Unknown identifier `{name}`")]
    #[diagnostic(code(resolve::unknown_identifier))]
    UnknownIdentifier { name: String },

    #[error("Unknown unit `{name}`")]
    #[diagnostic(code(unit::unknown))]
    UnknownUnit { name: String },

    #[error("Incompatible units: `{left}` and `{right}`")]
    #[diagnostic(code(unit::incompatible))]
    IncompatibleUnits { left: String, right: String },

    #[error("Cannot convert `{from}` to `{to}`")]
    #[diagnostic(code(unit::conversion_impossible))]
    ConversionImpossible { from: String, to: String },

    #[error("Invalid exponent {exponent}: {reason}")]
    #[diagnostic(code(unit::invalid_exponent))]
    InvalidExponent { exponent: String, reason: String },

    #[error("Operator `{op}` cannot be applied to {left} and {right}")]
    #[diagnostic(code(eval::invalid_operands))]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },

    #[error("Operator `{op}` cannot be applied to {operand}")]
    #[diagnostic(code(eval::invalid_operand))]
    InvalidOperand { op: String, operand: String },

    #[error("Expected a boolean expression, found {found}")]
    #[diagnostic(code(eval::expected_boolean))]
    ExpectedBoolean { found: String },

    #[error("`{name}` is already declared as a {existing}")]
    #[diagnostic(
        code(resolve::kind_clash),
        help("remove the existing {existing} first or choose another name")
    )]
    KindClash {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("`{name}` is a constant and cannot be changed")]
    #[diagnostic(code(resolve::read_only))]
    ReadOnly { name: String },

    #[error("`{name}` is a {kind}, not a value")]
    #[diagnostic(code(resolve::not_a_value))]
    NotAValue { name: String, kind: String },

    #[error("`{name}` is not a function")]
    #[diagnostic(code(resolve::not_callable))]
    NotCallable { name: String },

    #[error("`{name}` expects {expected} argument(s), got {found}")]
    #[diagnostic(code(resolve::wrong_arity))]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Argument `{parameter}` of `{function}` must be convertible to `{unit}`")]
    #[diagnostic(code(resolve::parameter_unit))]
    ParameterUnit {
        function: String,
        parameter: String,
        unit: String,
    },

    #[error("Function `{name}` produced no value")]
    #[diagnostic(code(eval::no_result))]
    NoResult { name: String },

    #[error("Cannot base unit `{name}` on another unit")]
    #[diagnostic(code(unit::invalid_base))]
    InvalidBaseUnit { name: String },

    #[error("{message}")]
    #[diagnostic(code(eval::failed))]
    Evaluation { message: String },

    #[error("Call depth limit of {limit} exceeded")]
    #[diagnostic(code(eval::recursion_limit))]
    RecursionLimit { limit: usize },

    // === Resource Errors ===
    #[error("Script file `{path}` not found")]
    #[diagnostic(code(resource::missing_script))]
    MissingScript { path: String },

    #[error("Cannot access `{path}`: {reason}")]
    #[diagnostic(code(resource::io))]
    Io { path: String, reason: String },

    #[error("Unterminated {construct} at end of input")]
    #[diagnostic(code(resource::unterminated))]
    UnterminatedConstruct { construct: String },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(config::invalid))]
    Config { reason: String },

    #[error("{}", join_messages(.errors))]
    #[diagnostic(code(calc::multiple))]
    Multiple {
        #[related]
        errors: Vec<CalcError>,
    },
}

impl CalcError {
    pub fn evaluation(message: impl Into<String>) -> Self {
        CalcError::Evaluation {
            message: message.into(),
        }
    }

    /// Errors nested inside a `Multiple` are flattened, others yield themselves
    pub fn flatten(&self) -> Vec<&CalcError> {
        match self {
            CalcError::Multiple { errors } => errors.iter().flat_map(|e| e.flatten()).collect(),
            other => vec![other],
        }
    }
}

/// Join the messages of several errors with `". "`
pub fn join_messages(errors: &[CalcError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(". ")
}

/// Error reporter that collects diagnostics
#[derive(Debug, Default)]
pub struct Reporter {
    errors: Vec<CalcError>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: CalcError) {
        tracing::trace!(%error, "diagnostic");
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Get errors by reference
    pub fn errors(&self) -> &[CalcError] {
        &self.errors
    }

    /// All messages joined the way they are shown to the user
    pub fn message(&self) -> String {
        join_messages(&self.errors)
    }

    /// Collapse the collected errors into a single error, if any
    pub fn into_error(mut self) -> Option<CalcError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => Some(CalcError::Multiple {
                errors: self.errors,
            }),
        }
    }

    /// `Ok(value)` when nothing was reported
    pub fn finish<T>(self, value: T) -> Result<T, CalcError> {
        match self.into_error() {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_joined() {
        let mut reporter = Reporter::new();
        reporter.error(CalcError::UnknownIdentifier { name: "x".into() });
        reporter.error(CalcError::UnknownUnit { name: "Foo".into() });

        assert_eq!(
            reporter.message(),
            "Unknown identifier `x`. Unknown unit `Foo`"
        );
        let error = reporter.into_error().unwrap();
        assert_eq!(error.flatten().len(), 2);
    }

    #[test]
    fn test_empty_reporter_finishes() {
        let reporter = Reporter::new();
        assert_eq!(reporter.finish(7), Ok(7));
    }
}
