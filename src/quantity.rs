//! Physical quantities
//!
//! A [`Quantity`] is an immutable value with a unit. Arithmetic goes through
//! the [`UnitRegistry`] so that sums are taken in the left operand's unit
//! and products are reduced and shown with a named unit when one exists.

use std::cmp::Ordering;
use std::fmt;

use crate::diagnostics::CalcError;
use crate::lexer::{Cursor, TokenKind, parse_number};
use crate::units::{Unit, UnitRegistry, parse_unit_expression};

/// Significant digits used when printing
pub const DEFAULT_PRECISION: usize = 12;

const RELATIVE_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

/// Unit text for messages
pub fn unit_label(unit: &Unit) -> String {
    if unit.is_dimensionless() {
        "dimensionless".to_string()
    } else {
        unit.to_string()
    }
}

/// Check if two values are equal within the relative tolerance
pub fn values_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= RELATIVE_TOLERANCE * a.abs().max(b.abs())
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// A pure number
    pub fn number(value: f64) -> Self {
        Self::new(value, Unit::Dimensionless)
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_dimensionless()
    }

    pub fn convert_to(&self, registry: &UnitRegistry, unit: &Unit) -> Result<Quantity, CalcError> {
        registry
            .convert(self, unit)
            .ok_or_else(|| CalcError::ConversionImpossible {
                from: unit_label(&self.unit),
                to: unit_label(unit),
            })
    }

    /// The same quantity in the base units of its system
    pub fn to_base(&self, registry: &UnitRegistry) -> Option<Quantity> {
        let reduced = registry.reduce(&self.unit)?;
        Some(Quantity::new(
            self.value * reduced.factor + reduced.offset,
            registry.recognize_reduced(&reduced),
        ))
    }

    /// Offset units (degC) take part in products as absolute values
    fn without_offset(&self, registry: &UnitRegistry) -> Quantity {
        match registry.reduce(&self.unit) {
            Some(r) if r.offset != 0.0 => Quantity::new(
                self.value * r.factor + r.offset,
                registry.recognize_reduced(&r),
            ),
            _ => self.clone(),
        }
    }

    fn in_unit_of(&self, other: &Quantity, registry: &UnitRegistry) -> Result<f64, CalcError> {
        registry
            .convert_value(other.value, &other.unit, &self.unit)
            .ok_or_else(|| CalcError::IncompatibleUnits {
                left: unit_label(&self.unit),
                right: unit_label(&other.unit),
            })
    }

    /// Sum in the left operand's unit
    pub fn add(&self, other: &Quantity, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        let rhs = self.in_unit_of(other, registry)?;
        Ok(Quantity::new(self.value + rhs, self.unit.clone()))
    }

    /// Difference in the left operand's unit
    pub fn sub(&self, other: &Quantity, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        let rhs = self.in_unit_of(other, registry)?;
        Ok(Quantity::new(self.value - rhs, self.unit.clone()))
    }

    pub fn neg(&self) -> Quantity {
        Quantity::new(-self.value, self.unit.clone())
    }

    pub fn mul(&self, other: &Quantity, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        if other.is_dimensionless() {
            return Ok(Quantity::new(self.value * other.value, self.unit.clone()));
        }
        if self.is_dimensionless() {
            return Ok(Quantity::new(self.value * other.value, other.unit.clone()));
        }
        let (left, right) = (self.without_offset(registry), other.without_offset(registry));
        Ok(left.product(&right, 1, left.value * right.value, registry))
    }

    pub fn div(&self, other: &Quantity, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        if other.value == 0.0 {
            return Err(CalcError::evaluation("division by zero"));
        }
        if other.is_dimensionless() {
            return Ok(Quantity::new(self.value / other.value, self.unit.clone()));
        }
        let (left, right) = (self.without_offset(registry), other.without_offset(registry));
        Ok(left.product(&right, -1, left.value / right.value, registry))
    }

    /// Combine units of a product (`sign` 1) or quotient (`sign` -1).
    ///
    /// Units from systems with no conversion between them stay in written
    /// form instead of being reduced.
    fn product(&self, other: &Quantity, sign: i8, value: f64, registry: &UnitRegistry) -> Quantity {
        let written = Unit::combine([(self.unit.clone(), 1), (other.unit.clone(), sign)]);
        match registry.reduce(&written) {
            Some(reduced) => Quantity::new(
                value * reduced.factor,
                registry.recognize_reduced(&reduced),
            ),
            None => Quantity::new(value, written),
        }
    }

    /// Integer power
    pub fn pow(&self, n: i8, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        if n == 0 {
            return Ok(Quantity::number(1.0));
        }
        if n < 0 && self.value == 0.0 {
            return Err(CalcError::evaluation("division by zero"));
        }
        let q = self.without_offset(registry);
        let value = q.value.powi(i32::from(n));
        match &q.unit {
            Unit::Dimensionless => Ok(Quantity::number(value)),
            Unit::Base(_) | Unit::NamedDerived(_) | Unit::Derived(_) => {
                let reduced = registry.reduce(&q.unit).ok_or_else(|| CalcError::UnknownUnit {
                    name: q.unit.to_string(),
                })?;
                let dimension = reduced.dimension.scale(n);
                let unit = match reduced.system {
                    Some(system) => registry.recognize(system, &dimension),
                    None => Unit::Dimensionless,
                };
                Ok(Quantity::new(value, unit))
            }
            other => Ok(Quantity::new(value, other.powi(n))),
        }
    }

    /// Integer root; every exponent of the unit must be divisible by `n`
    pub fn root(&self, n: i8, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        if n <= 0 {
            return Err(CalcError::InvalidExponent {
                exponent: n.to_string(),
                reason: "a root needs a positive integer degree".into(),
            });
        }
        if self.value < 0.0 && n % 2 == 0 {
            return Err(CalcError::InvalidExponent {
                exponent: n.to_string(),
                reason: "even root of a negative value".into(),
            });
        }
        let degree = 1.0 / f64::from(n);
        let take_root = |v: f64| {
            if v < 0.0 {
                -(-v).powf(degree)
            } else {
                v.powf(degree)
            }
        };

        let q = self.without_offset(registry);
        if q.is_dimensionless() {
            return Ok(Quantity::number(take_root(q.value)));
        }

        if let Unit::Combined(factors) = &q.unit {
            if factors.iter().all(|(_, e)| e % n == 0) {
                let unit = Unit::combine(factors.iter().map(|(u, e)| (u.clone(), e / n)));
                return Ok(Quantity::new(take_root(q.value), unit));
            }
        }

        let not_a_power = || CalcError::InvalidExponent {
            exponent: n.to_string(),
            reason: format!("`{}` is not a perfect power", unit_label(&q.unit)),
        };
        let reduced = registry.reduce(&q.unit).ok_or_else(not_a_power)?;
        let dimension = reduced.dimension.divide_exact(n).ok_or_else(not_a_power)?;
        let unit = match reduced.system {
            Some(system) => registry.recognize(system, &dimension),
            None => Unit::Dimensionless,
        };
        Ok(Quantity::new(take_root(q.value * reduced.factor), unit))
    }

    /// Order two quantities; they must be mutually convertible
    pub fn compare(&self, other: &Quantity, registry: &UnitRegistry) -> Result<Ordering, CalcError> {
        let rhs = self.in_unit_of(other, registry)?;
        if values_close(self.value, rhs) {
            return Ok(Ordering::Equal);
        }
        self.value
            .partial_cmp(&rhs)
            .ok_or_else(|| CalcError::evaluation("cannot compare NaN values"))
    }

    /// Equality within the relative tolerance, after conversion
    pub fn approx_eq(&self, other: &Quantity, registry: &UnitRegistry) -> bool {
        matches!(self.compare(other, registry), Ok(Ordering::Equal))
    }

    /// The form shown to the user when no unit was asked for.
    ///
    /// Runtime-declared convertible units are shown in their primary unit,
    /// and anonymous units (and exact products such as `Kg·m/s2`) are
    /// matched against named derived units and declared convertible units
    /// with the same dimension.
    pub fn normalized(&self, registry: &UnitRegistry) -> Quantity {
        let mut q = self.clone();
        while let Some(c) = q.unit.as_user_convertible() {
            q = Quantity::new(q.value * c.scale + c.offset, c.primary.clone());
        }

        let anonymous = match &q.unit {
            Unit::Derived(derived) => Some((derived.system, derived.dimension.clone())),
            // Only exact products; `Km/h` keeps its spelling
            Unit::Combined(_) => registry
                .reduce(&q.unit)
                .filter(|r| r.factor == 1.0 && r.offset == 0.0)
                .and_then(|r| r.system.map(|system| (system, r.dimension))),
            _ => None,
        };
        if let Some((system, dimension)) = anonymous {
            let recognized = registry.recognize(system, &dimension);
            if !matches!(recognized, Unit::Derived(_)) {
                return Quantity::new(q.value, recognized);
            }
            let alias = registry
                .systems()
                .flat_map(|s| s.convertible_units().iter())
                .find(|c| {
                    c.user_defined
                        && c.scale == 1.0
                        && c.offset == 0.0
                        && registry
                            .reduce(&c.primary)
                            .is_some_and(|r| r.factor == 1.0 && r.dimension == dimension)
                });
            if let Some(alias) = alias {
                return Quantity::new(q.value, Unit::Convertible(alias.clone()));
            }
        }
        q
    }

    /// Print with `precision` significant digits
    pub fn format(&self, precision: usize) -> String {
        let value = format_value(self.value, precision);
        if self.unit.is_dimensionless() {
            value
        } else {
            format!("{} {}", value, self.unit)
        }
    }

    /// Read back a printed quantity such as `12 J` or `-1.5E20 m/s`
    pub fn parse(text: &str, registry: &UnitRegistry) -> Result<Quantity, CalcError> {
        let mut cursor = Cursor::new(text);
        let negative = cursor.eat(TokenKind::Minus).is_some();

        let token = match cursor.peek()? {
            Some(t) if matches!(t.kind, TokenKind::Number | TokenKind::HexNumber) => t,
            Some(t) => {
                return Err(CalcError::UnexpectedToken {
                    expected: "a number".into(),
                    found: t.text.to_string(),
                    span: t.span.into(),
                });
            }
            None => return Err(CalcError::EmptyExpression),
        };
        cursor.bump(&token);
        let value = parse_number(token.text, token.span)?;
        let value = if negative { -value } else { value };

        let unit = parse_unit_expression(&mut cursor, &mut |name| registry.lookup(name))?
            .unwrap_or_default();

        if let Some(extra) = cursor.peek()? {
            return Err(CalcError::UnexpectedToken {
                expected: "end of quantity".into(),
                found: extra.text.to_string(),
                span: extra.span.into(),
            });
        }
        Ok(Quantity::new(value, unit))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(DEFAULT_PRECISION))
    }
}

/// Round to `precision` significant digits and print without trailing
/// zeros; very large and very small magnitudes use `E` notation.
pub fn format_value(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let digits = precision.clamp(1, 17);
    let scientific = format!("{:.*e}", digits - 1, value);
    let rounded: f64 = scientific.parse().unwrap_or(value);

    let magnitude = rounded.abs();
    if (1e-6..1e15).contains(&magnitude) {
        return format!("{}", rounded);
    }
    match scientific.split_once('e') {
        Some((mantissa, exp)) => {
            let mantissa = if mantissa.contains('.') {
                mantissa.trim_end_matches('0').trim_end_matches('.')
            } else {
                mantissa
            };
            format!("{}E{}", mantissa, exp)
        }
        None => scientific,
    }
}
