//! Unit kinds
//!
//! Units are a tagged variant rather than a hierarchy. The leaf kinds
//! (base, named derived, convertible, anonymous derived) are shared through
//! `Rc`, so a quantity carries a cheap handle to the unit it was created
//! with even after its system has been extended.

use std::fmt;
use std::rc::Rc;

use super::{Dimension, Prefix, SystemId};

/// A base unit: exactly one exponent, equal to 1, in its system's vector
#[derive(Debug, Clone, PartialEq)]
pub struct BaseUnit {
    pub system: SystemId,
    pub index: usize,
    pub name: String,
    pub symbol: String,
}

/// A derived unit with its own symbol, e.g. `N` for `[1, 1, -2]`
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDerivedUnit {
    pub system: SystemId,
    pub name: String,
    pub symbol: String,
    pub dimension: Dimension,
}

/// A unit defined as `primary = value * scale + offset`
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertibleUnit {
    pub name: String,
    pub symbol: String,
    pub primary: Unit,
    pub scale: f64,
    pub offset: f64,
    /// Declared at runtime (shown in its primary unit unless asked for)
    pub user_defined: bool,
}

/// An anonymous unit holding a raw vector, printed from base symbols
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUnit {
    pub system: SystemId,
    pub dimension: Dimension,
    pub symbol: String,
}

/// Unit of a quantity
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Unit {
    /// Pure number
    #[default]
    Dimensionless,
    Base(Rc<BaseUnit>),
    NamedDerived(Rc<NamedDerivedUnit>),
    Convertible(Rc<ConvertibleUnit>),
    /// Decimal prefix applied to a simple unit (`Km`, `mg`)
    Prefixed { prefix: Prefix, unit: Box<Unit> },
    /// Product of unit powers as written by the user (`Km/h`, `N·m`)
    Combined(Vec<(Unit, i8)>),
    Derived(Rc<DerivedUnit>),
}

impl Unit {
    pub fn is_dimensionless(&self) -> bool {
        matches!(self, Unit::Dimensionless)
    }

    /// Name for messages and listings; falls back to the symbol
    pub fn name(&self) -> String {
        match self {
            Unit::Base(b) => b.name.clone(),
            Unit::NamedDerived(d) => d.name.clone(),
            Unit::Convertible(c) => c.name.clone(),
            Unit::Prefixed { prefix, unit } => format!("{}{}", prefix.name, unit.name()),
            _ => self.to_string(),
        }
    }

    /// Human readable kind, used when reporting kind clashes
    pub fn kind_name(&self) -> &'static str {
        match self {
            Unit::Dimensionless => "dimensionless unit",
            Unit::Base(_) => "base unit",
            Unit::NamedDerived(_) => "derived unit",
            Unit::Convertible(_) => "convertible unit",
            Unit::Prefixed { .. } => "prefixed unit",
            Unit::Combined(_) => "combined unit",
            Unit::Derived(_) => "derived unit",
        }
    }

    /// Runtime-declared convertible unit, if this is one
    pub fn as_user_convertible(&self) -> Option<&ConvertibleUnit> {
        match self {
            Unit::Convertible(c) if c.user_defined => Some(c),
            _ => None,
        }
    }

    /// Build a product of unit powers, merging repeated factors.
    ///
    /// Collapses to `Dimensionless` when nothing is left and to the bare
    /// unit when a single factor has exponent 1.
    pub fn combine(factors: impl IntoIterator<Item = (Unit, i8)>) -> Unit {
        let mut merged: Vec<(Unit, i8)> = Vec::new();
        let mut push = |unit: Unit, exp: i8| {
            if let Some(slot) = merged.iter_mut().find(|(u, _)| *u == unit) {
                slot.1 = slot.1.saturating_add(exp);
            } else {
                merged.push((unit, exp));
            }
        };
        for (unit, exp) in factors {
            match unit {
                Unit::Dimensionless => {}
                Unit::Combined(inner) => {
                    for (u, e) in inner {
                        push(u, e.saturating_mul(exp));
                    }
                }
                other => push(other, exp),
            }
        }
        merged.retain(|(_, e)| *e != 0);

        match merged.len() {
            0 => Unit::Dimensionless,
            1 if merged[0].1 == 1 => merged.remove(0).0,
            _ => Unit::Combined(merged),
        }
    }

    /// This unit raised to an integer power, kept in written form
    pub fn powi(&self, n: i8) -> Unit {
        Unit::combine([(self.clone(), n)])
    }

    pub fn mul(&self, other: &Unit) -> Unit {
        Unit::combine([(self.clone(), 1), (other.clone(), 1)])
    }

    pub fn div(&self, other: &Unit) -> Unit {
        Unit::combine([(self.clone(), 1), (other.clone(), -1)])
    }
}

/// Write `(symbol, exponent)` factors as `a·b2/c/d3`.
///
/// Without any positive factor the form is `c^-1·d^-3`, which the unit
/// grammar reads back.
pub fn write_factors<S: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    factors: &[(S, i8)],
) -> fmt::Result {
    let mut numerator = factors.iter().filter(|(_, e)| *e > 0).peekable();
    if numerator.peek().is_none() {
        for (i, (symbol, exp)) in factors.iter().filter(|(_, e)| *e != 0).enumerate() {
            if i > 0 {
                write!(f, "·")?;
            }
            write!(f, "{}^{}", symbol, exp)?;
        }
        return Ok(());
    }

    for (i, (symbol, exp)) in numerator.enumerate() {
        if i > 0 {
            write!(f, "·")?;
        }
        write!(f, "{}", symbol)?;
        if *exp != 1 {
            write!(f, "{}", exp)?;
        }
    }
    for (symbol, exp) in factors.iter().filter(|(_, e)| *e < 0) {
        write!(f, "/{}", symbol)?;
        if *exp != -1 {
            write!(f, "{}", -exp)?;
        }
    }
    Ok(())
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Dimensionless => Ok(()),
            Unit::Base(b) => write!(f, "{}", b.symbol),
            Unit::NamedDerived(d) => write!(f, "{}", d.symbol),
            Unit::Convertible(c) => write!(f, "{}", c.symbol),
            Unit::Prefixed { prefix, unit } => write!(f, "{}{}", prefix.symbol, unit),
            Unit::Combined(factors) => write_factors(f, factors),
            Unit::Derived(d) => write!(f, "{}", d.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(symbol: &str, index: usize) -> Unit {
        Unit::Base(Rc::new(BaseUnit {
            system: SystemId(0),
            index,
            name: symbol.to_string(),
            symbol: symbol.to_string(),
        }))
    }

    #[test]
    fn test_combine_merges_and_collapses() {
        let m = base("m", 0);
        let s = base("s", 2);
        assert_eq!(Unit::combine([(m.clone(), 1)]), m);
        assert_eq!(
            Unit::combine([(m.clone(), 1), (s.clone(), -1), (m.clone(), -1)]),
            Unit::Combined(vec![(s.clone(), -1)])
        );
        assert_eq!(m.div(&m), Unit::Dimensionless);
    }

    #[test]
    fn test_combined_display() {
        let kg = base("Kg", 1);
        let m = base("m", 0);
        let s = base("s", 2);
        let u = Unit::combine([(kg, 1), (m.clone(), -1), (s.clone(), -2)]);
        assert_eq!(u.to_string(), "Kg/m/s2");
        assert_eq!(m.powi(2).to_string(), "m2");
        assert_eq!(s.powi(-1).to_string(), "s^-1");
    }

    #[test]
    fn test_nested_combination_flattens() {
        let m = base("m", 0);
        let s = base("s", 2);
        let speed = m.div(&s);
        let accel = speed.div(&s);
        assert_eq!(accel, Unit::Combined(vec![(m, 1), (s, -2)]));
    }
}
