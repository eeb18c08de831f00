//! Operators and their dispatch on operand kinds

use std::cmp::Ordering;
use std::fmt;

use chrono::{Months, NaiveDateTime, TimeDelta};

use crate::diagnostics::CalcError;
use crate::lexer::TokenKind;
use crate::quantity::{Quantity, unit_label};
use crate::units::{Unit, UnitRegistry};

use super::Operand;

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Root,
}

/// Prefix operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Plus,
    Minus,
}

impl BinaryOp {
    pub fn from_token(kind: TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star | TokenKind::MiddleDot => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Caret => BinaryOp::Pow,
            TokenKind::Root => BinaryOp::Root,
            _ => return None,
        })
    }

    /// Binding strength: comparisons < not < add/sub < mul/div < pow/root
    /// < unary sign
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 1,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            BinaryOp::Pow | BinaryOp::Root => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Root => "root",
        }
    }
}

impl UnaryOp {
    pub fn precedence(&self) -> u8 {
        match self {
            UnaryOp::Not => 2,
            UnaryOp::Plus | UnaryOp::Minus => 6,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

fn invalid(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> CalcError {
    CalcError::InvalidOperands {
        op: op.symbol().to_string(),
        left: lhs.describe(),
        right: rhs.describe(),
    }
}

/// Apply a binary operator
pub fn eval_binary(
    op: BinaryOp,
    lhs: Operand,
    rhs: Operand,
    registry: &UnitRegistry,
) -> Result<Operand, CalcError> {
    match op {
        BinaryOp::Add => match (&lhs, &rhs) {
            (Operand::Quantity(a), Operand::Quantity(b)) => Ok(a.add(b, registry)?.into()),
            (Operand::DateTime(dt), Operand::Quantity(q))
            | (Operand::Quantity(q), Operand::DateTime(dt)) => {
                Ok(shift_datetime(*dt, q, 1.0, registry)?.into())
            }
            _ => Err(invalid(op, &lhs, &rhs)),
        },
        BinaryOp::Sub => match (&lhs, &rhs) {
            (Operand::Quantity(a), Operand::Quantity(b)) => Ok(a.sub(b, registry)?.into()),
            (Operand::DateTime(dt), Operand::Quantity(q)) => {
                Ok(shift_datetime(*dt, q, -1.0, registry)?.into())
            }
            _ => Err(invalid(op, &lhs, &rhs)),
        },
        BinaryOp::Mul => match (lhs, rhs) {
            (Operand::Quantity(a), Operand::Quantity(b)) => Ok(a.mul(&b, registry)?.into()),
            (Operand::Quantity(q), Operand::Unit(u)) | (Operand::Unit(u), Operand::Quantity(q)) => {
                Ok(Quantity::new(q.value, q.unit.mul(&u)).into())
            }
            (Operand::Unit(a), Operand::Unit(b)) => Ok(Operand::Unit(a.mul(&b))),
            (lhs, rhs) => Err(invalid(op, &lhs, &rhs)),
        },
        BinaryOp::Div => match (lhs, rhs) {
            (Operand::Quantity(a), Operand::Quantity(b)) => Ok(a.div(&b, registry)?.into()),
            (Operand::Quantity(q), Operand::Unit(u)) => {
                Ok(Quantity::new(q.value, q.unit.div(&u)).into())
            }
            (Operand::Unit(u), Operand::Quantity(q)) => {
                if q.value == 0.0 {
                    return Err(CalcError::evaluation("division by zero"));
                }
                Ok(Quantity::new(1.0 / q.value, u.div(&q.unit)).into())
            }
            (Operand::Unit(a), Operand::Unit(b)) => Ok(Operand::Unit(a.div(&b))),
            (lhs, rhs) => Err(invalid(op, &lhs, &rhs)),
        },
        BinaryOp::Pow | BinaryOp::Root => match (&lhs, &rhs) {
            (Operand::Quantity(base), Operand::Quantity(exp)) => {
                let exponent = dimensionless_exponent(op, exp)?;
                Ok(power(base, exponent, op == BinaryOp::Root, registry)?.into())
            }
            (Operand::Unit(u), Operand::Quantity(exp)) if op == BinaryOp::Pow => {
                let exponent = dimensionless_exponent(op, exp)?;
                let n = small_integer(exponent).ok_or_else(|| CalcError::InvalidExponent {
                    exponent: exp.to_string(),
                    reason: "units take integer powers only".into(),
                })?;
                Ok(Operand::Unit(u.powi(n)))
            }
            _ => Err(invalid(op, &lhs, &rhs)),
        },
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, &lhs, &rhs, registry)
        }
    }
}

/// Apply a prefix operator
pub fn eval_unary(op: UnaryOp, operand: Operand) -> Result<Operand, CalcError> {
    match (op, operand) {
        (UnaryOp::Not, Operand::Boolean(b)) => Ok(Operand::Boolean(!b)),
        (UnaryOp::Plus, q @ Operand::Quantity(_)) => Ok(q),
        (UnaryOp::Minus, Operand::Quantity(q)) => Ok(q.neg().into()),
        (op, operand) => Err(CalcError::InvalidOperand {
            op: op.symbol().to_string(),
            operand: operand.describe(),
        }),
    }
}

fn compare(
    op: BinaryOp,
    lhs: &Operand,
    rhs: &Operand,
    registry: &UnitRegistry,
) -> Result<Operand, CalcError> {
    let ordering = match (lhs, rhs) {
        (Operand::Quantity(a), Operand::Quantity(b)) => Some(a.compare(b, registry)?),
        (Operand::DateTime(a), Operand::DateTime(b)) => Some(a.cmp(b)),
        (Operand::String(a), Operand::String(b)) => Some(a.cmp(b)),
        (Operand::Boolean(a), Operand::Boolean(b)) => (a == b).then_some(Ordering::Equal),
        (Operand::Unit(a), Operand::Unit(b)) => {
            let same = registry
                .convert_value(1.0, a, b)
                .is_some_and(|v| crate::quantity::values_close(v, 1.0));
            same.then_some(Ordering::Equal)
        }
        _ => return Err(invalid(op, lhs, rhs)),
    };

    // Booleans and units only support equality
    let ordered = matches!(
        (lhs, rhs),
        (Operand::Quantity(_), _) | (Operand::DateTime(_), _) | (Operand::String(_), _)
    );
    let result = match (op, ordering) {
        (BinaryOp::Eq, o) => o == Some(Ordering::Equal),
        (BinaryOp::Ne, o) => o != Some(Ordering::Equal),
        (_, _) if !ordered => return Err(invalid(op, lhs, rhs)),
        (BinaryOp::Lt, o) => o == Some(Ordering::Less),
        (BinaryOp::Le, o) => o != Some(Ordering::Greater),
        (BinaryOp::Gt, o) => o == Some(Ordering::Greater),
        (BinaryOp::Ge, o) => o != Some(Ordering::Less),
        _ => return Err(invalid(op, lhs, rhs)),
    };
    Ok(Operand::Boolean(result))
}

fn dimensionless_exponent(op: BinaryOp, exp: &Quantity) -> Result<f64, CalcError> {
    if !exp.is_dimensionless() {
        return Err(CalcError::InvalidExponent {
            exponent: exp.to_string(),
            reason: format!("the right operand of `{}` must be a pure number", op),
        });
    }
    Ok(exp.value)
}

/// Exact integer that fits an exponent
fn small_integer(x: f64) -> Option<i8> {
    (x.fract() == 0.0 && x.abs() <= f64::from(i8::MAX)).then(|| x as i8)
}

/// Integer reciprocal of a fraction such as 0.5 or -0.25
fn integer_reciprocal(x: f64) -> Option<i8> {
    if x == 0.0 || x.abs() > 1.0 {
        return None;
    }
    let r = 1.0 / x;
    let rounded = r.round();
    if (r - rounded).abs() < 1e-9 {
        small_integer(rounded)
    } else {
        None
    }
}

/// `base ^ x` (or `base root x`) through the one integer primitive:
/// fractional exponents with an integer reciprocal swap power and root.
fn power(base: &Quantity, x: f64, root: bool, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
    let apply = |n: i8, as_root: bool| -> Result<Quantity, CalcError> {
        match (as_root, n < 0) {
            (false, _) => base.pow(n, registry),
            (true, false) => base.root(n, registry),
            (true, true) => base.root(-n, registry)?.pow(-1, registry),
        }
    };

    if let Some(n) = small_integer(x) {
        if root && n == 0 {
            return Err(CalcError::InvalidExponent {
                exponent: "0".into(),
                reason: "the zeroth root is undefined".into(),
            });
        }
        return apply(n, root);
    }
    if let Some(n) = integer_reciprocal(x) {
        return apply(n, !root);
    }
    if base.is_dimensionless() {
        let exponent = if root { 1.0 / x } else { x };
        let value = base.value.powf(exponent);
        if value.is_nan() {
            return Err(CalcError::InvalidExponent {
                exponent: x.to_string(),
                reason: "no real result".into(),
            });
        }
        return Ok(Quantity::number(value));
    }
    Err(CalcError::InvalidExponent {
        exponent: x.to_string(),
        reason: format!(
            "`{}` can only take integer powers and roots",
            unit_label(&base.unit)
        ),
    })
}

/// Calendar unit a duration is counted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalendarUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Years,
}

fn calendar_unit(unit: &Unit) -> Option<CalendarUnit> {
    let symbol = match unit {
        Unit::Base(b) => b.symbol.as_str(),
        Unit::Convertible(c) => c.symbol.as_str(),
        _ => return None,
    };
    match symbol {
        "s" => Some(CalendarUnit::Seconds),
        "min" => Some(CalendarUnit::Minutes),
        "h" => Some(CalendarUnit::Hours),
        "d" => Some(CalendarUnit::Days),
        "y" => Some(CalendarUnit::Years),
        _ => None,
    }
}

/// Move a timestamp by a duration. Whole numbers of a calendar unit are
/// added as such (years as twelve months); anything else is converted to
/// seconds.
fn shift_datetime(
    dt: NaiveDateTime,
    duration: &Quantity,
    sign: f64,
    registry: &UnitRegistry,
) -> Result<NaiveDateTime, CalcError> {
    let out_of_range = || CalcError::evaluation("date/time out of range");
    let amount = duration.value * sign;
    let whole = amount.fract() == 0.0 && amount.abs() < 1e12;

    let delta = match calendar_unit(&duration.unit) {
        Some(CalendarUnit::Years) if whole => {
            let months = Months::new(u32::try_from((amount.abs() * 12.0) as u64).map_err(|_| out_of_range())?);
            let shifted = if amount >= 0.0 {
                dt.checked_add_months(months)
            } else {
                dt.checked_sub_months(months)
            };
            return shifted.ok_or_else(out_of_range);
        }
        Some(CalendarUnit::Days) if whole => TimeDelta::try_days(amount as i64),
        Some(CalendarUnit::Hours) if whole => TimeDelta::try_hours(amount as i64),
        Some(CalendarUnit::Minutes) if whole => TimeDelta::try_minutes(amount as i64),
        Some(CalendarUnit::Seconds) if whole => TimeDelta::try_seconds(amount as i64),
        _ => {
            let second = registry
                .lookup("s")
                .ok_or_else(|| CalcError::UnknownUnit { name: "s".into() })?;
            let seconds = registry
                .convert_value(amount, &duration.unit, &second)
                .ok_or_else(|| CalcError::IncompatibleUnits {
                    left: "date/time".into(),
                    right: unit_label(&duration.unit),
                })?;
            TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)
        }
    };

    delta
        .and_then(|d| dt.checked_add_signed(d))
        .ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn q(text: &str, reg: &UnitRegistry) -> Operand {
        Quantity::parse(text, reg).unwrap().into()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Eq.precedence() < UnaryOp::Not.precedence());
        assert!(UnaryOp::Not.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
        assert!(BinaryOp::Mul.precedence() < BinaryOp::Pow.precedence());
        assert!(BinaryOp::Root.precedence() < UnaryOp::Minus.precedence());
    }

    #[test]
    fn test_fractional_power_becomes_root() {
        let reg = UnitRegistry::standard();
        let r = eval_binary(BinaryOp::Pow, q("9 m2", &reg), q("0.5", &reg), &reg).unwrap();
        assert_eq!(r.to_string(), "3 m");
        let r = eval_binary(BinaryOp::Root, q("9", &reg), q("0.5", &reg), &reg).unwrap();
        assert_eq!(r.to_string(), "81");
        let r = eval_binary(BinaryOp::Root, q("27 m3", &reg), q("3", &reg), &reg).unwrap();
        assert_eq!(r.to_string(), "3 m");
    }

    #[test]
    fn test_non_integer_power_of_unit_fails() {
        let reg = UnitRegistry::standard();
        let err = eval_binary(BinaryOp::Pow, q("2 m", &reg), q("1.5", &reg), &reg).unwrap_err();
        assert!(matches!(err, CalcError::InvalidExponent { .. }));
        let ok = eval_binary(BinaryOp::Pow, q("4", &reg), q("1.5", &reg), &reg).unwrap();
        assert_eq!(ok.to_string(), "8");
    }

    #[test]
    fn test_datetime_arithmetic() {
        let reg = UnitRegistry::standard();
        let start = Operand::DateTime(date(2024, 1, 31));

        let r = eval_binary(BinaryOp::Add, start.clone(), q("1 d", &reg), &reg).unwrap();
        assert_eq!(r, Operand::DateTime(date(2024, 2, 1)));

        let r = eval_binary(BinaryOp::Add, start.clone(), q("1 y", &reg), &reg).unwrap();
        assert_eq!(r, Operand::DateTime(date(2025, 1, 31)));

        let r = eval_binary(BinaryOp::Sub, start.clone(), q("1.5 h", &reg), &reg).unwrap();
        assert_eq!(r.to_string(), "2024-01-30 22:30:00");

        let r = eval_binary(BinaryOp::Add, start.clone(), q("2 Kg", &reg), &reg);
        assert!(r.is_err());
        let r = eval_binary(BinaryOp::Add, start.clone(), start, &reg);
        assert!(matches!(r, Err(CalcError::InvalidOperands { .. })));
    }

    #[test]
    fn test_comparisons() {
        let reg = UnitRegistry::standard();
        let t = |op, a: &str, b: &str| {
            eval_binary(op, q(a, &reg), q(b, &reg), &reg)
                .unwrap()
                .as_bool()
                .unwrap()
        };
        assert!(t(BinaryOp::Eq, "1 Km", "1000 m"));
        assert!(t(BinaryOp::Lt, "1 min", "61 s"));
        assert!(t(BinaryOp::Ge, "2 h", "120 min"));
        assert!(!t(BinaryOp::Ne, "0.5 L", "500 mL"));

        let err = eval_binary(BinaryOp::Lt, Operand::Boolean(true), Operand::Boolean(false), &reg);
        assert!(err.is_err());
    }

    #[test]
    fn test_unary() {
        assert_eq!(
            eval_unary(UnaryOp::Not, Operand::Boolean(false)).unwrap(),
            Operand::Boolean(true)
        );
        assert!(eval_unary(UnaryOp::Minus, Operand::String("a".into())).is_err());
    }
}
