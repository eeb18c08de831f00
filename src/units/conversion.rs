//! Conversions between unrelated unit systems

use tracing::debug;

use crate::quantity::Quantity;

use super::{Dimension, SystemId, UnitRegistry};

/// One linear factor per base dimension, mapping base values of `from`
/// into base values of `to`
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSystemConversion {
    pub from: SystemId,
    pub to: SystemId,
    factors: Vec<f64>,
}

impl UnitSystemConversion {
    pub fn new(from: SystemId, to: SystemId, factors: impl Into<Vec<f64>>) -> Self {
        Self {
            from,
            to,
            factors: factors.into(),
        }
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    /// Direction of this conversion between two systems, if it connects them
    pub fn direction(&self, from: SystemId, to: SystemId) -> Option<bool> {
        if self.from == from && self.to == to {
            Some(false)
        } else if self.from == to && self.to == from {
            Some(true)
        } else {
            None
        }
    }

    /// Accumulated factor for a quantity of dimension `dimension`.
    ///
    /// Fails if a nonzero dimension has no registered factor.
    pub fn factor(&self, dimension: &Dimension, backwards: bool) -> Option<f64> {
        let mut acc = 1.0;
        for (index, exp) in dimension.nonzero() {
            let f = *self.factors.get(index)?;
            if f == 0.0 || !f.is_finite() {
                return None;
            }
            let f = if backwards { 1.0 / f } else { f };
            acc *= f.powi(i32::from(exp));
        }
        Some(acc)
    }

    /// Convert into the other system, expressed in the unit recognized there
    pub fn convert(
        &self,
        registry: &UnitRegistry,
        quantity: &Quantity,
        backwards: bool,
    ) -> Option<Quantity> {
        let reduced = registry.reduce(&quantity.unit)?;
        let factor = self.factor(&reduced.dimension, backwards)?;
        let target = if backwards { self.from } else { self.to };
        let value = (quantity.value * reduced.factor + reduced.offset) * factor;
        debug!(
            from = %quantity.unit,
            factor,
            backwards,
            "converting between unit systems"
        );
        Some(Quantity::new(
            value,
            registry.recognize(target, &reduced.dimension),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_per_dimension() {
        let conv = UnitSystemConversion::new(SystemId(0), SystemId(1), vec![2.0, 10.0]);
        let area = Dimension::from_exponents(vec![2]);
        assert_eq!(conv.factor(&area, false), Some(4.0));
        assert_eq!(conv.factor(&area, true), Some(0.25));

        let density = Dimension::from_exponents(vec![-3, 1]);
        assert_eq!(conv.factor(&density, false), Some(10.0 / 8.0));
    }

    #[test]
    fn test_missing_factor_fails() {
        let conv = UnitSystemConversion::new(SystemId(0), SystemId(1), vec![2.0]);
        assert_eq!(conv.factor(&Dimension::base(1, 2), false), None);
        assert_eq!(conv.factor(&Dimension::none(), false), Some(1.0));
    }

    #[test]
    fn test_direction() {
        let conv = UnitSystemConversion::new(SystemId(0), SystemId(1), vec![]);
        assert_eq!(conv.direction(SystemId(0), SystemId(1)), Some(false));
        assert_eq!(conv.direction(SystemId(1), SystemId(0)), Some(true));
        assert_eq!(conv.direction(SystemId(1), SystemId(2)), None);
    }
}
