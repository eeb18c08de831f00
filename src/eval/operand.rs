//! Runtime values of the expression evaluator

use std::fmt;

use chrono::NaiveDateTime;

use crate::quantity::{DEFAULT_PRECISION, Quantity};
use crate::units::Unit;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value produced by evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Number with a unit (bare numbers are dimensionless)
    Quantity(Quantity),
    DateTime(NaiveDateTime),
    String(String),
    /// A unit on its own, e.g. the `m` in `3 * m`
    Unit(Unit),
    Boolean(bool),
}

impl Operand {
    /// Dimensionless quantity
    pub fn number(value: f64) -> Self {
        Operand::Quantity(Quantity::number(value))
    }

    /// Get the kind name of this operand
    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Quantity(_) => "quantity",
            Operand::DateTime(_) => "date/time",
            Operand::String(_) => "string",
            Operand::Unit(_) => "unit",
            Operand::Boolean(_) => "boolean",
        }
    }

    /// Kind name plus the value, for messages
    pub fn describe(&self) -> String {
        format!("{} `{}`", self.type_name(), self)
    }

    /// Check if a variable may hold this value
    pub fn is_storable(&self) -> bool {
        matches!(
            self,
            Operand::Quantity(_) | Operand::DateTime(_) | Operand::String(_)
        )
    }

    /// Try to get as quantity
    pub fn as_quantity(&self) -> Option<&Quantity> {
        match self {
            Operand::Quantity(q) => Some(q),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Operand::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Operand::String(s) => Some(s),
            _ => None,
        }
    }

    /// Print with `precision` significant digits
    pub fn format(&self, precision: usize) -> String {
        match self {
            Operand::Quantity(q) => q.format(precision),
            Operand::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            Operand::String(s) => s.clone(),
            Operand::Unit(u) => u.to_string(),
            Operand::Boolean(b) => b.to_string(),
        }
    }

    /// Source form that evaluates back to this value
    pub fn literal(&self, precision: usize) -> String {
        match self {
            Operand::DateTime(dt) => format!("#{}#", dt.format(DATETIME_FORMAT)),
            Operand::String(s) => format!("{:?}", s),
            other => other.format(precision),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(DEFAULT_PRECISION))
    }
}

impl From<Quantity> for Operand {
    fn from(q: Quantity) -> Self {
        Operand::Quantity(q)
    }
}

impl From<NaiveDateTime> for Operand {
    fn from(dt: NaiveDateTime) -> Self {
        Operand::DateTime(dt)
    }
}

impl From<bool> for Operand {
    fn from(b: bool) -> Self {
        Operand::Boolean(b)
    }
}

/// Decode the body of a string literal (quotes included)
pub fn unescape(literal: &str) -> String {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_literal_forms() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(Operand::from(dt).literal(12), "#2024-03-01 12:30:00#");
        assert_eq!(Operand::String("a \"b\"".into()).literal(12), r#""a \"b\"""#);
        assert_eq!(Operand::number(2.5).literal(12), "2.5");
        assert_eq!(Operand::Boolean(true).to_string(), "true");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""line\nnext""#), "line\nnext");
        assert_eq!(unescape(r#""say \"hi\"""#), "say \"hi\"");
    }

    #[test]
    fn test_storable() {
        assert!(Operand::number(1.0).is_storable());
        assert!(!Operand::Boolean(false).is_storable());
        assert!(!Operand::Unit(Unit::Dimensionless).is_storable());
    }
}
