//! Dimension vectors
//!
//! A dimension is the list of exponents of a unit system's base units:
//! with SI ordered (m, Kg, s, A, K, mol, cd), force is `[1, 1, -2]`.
//! Vectors of different length compare equal when they agree after padding
//! the shorter one with zeros, so a system that gains a base unit at runtime
//! stays compatible with the vectors created before.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Exponent vector over the base units of one unit system
#[derive(Debug, Clone, Default)]
pub struct Dimension {
    exponents: Vec<i8>,
}

impl Dimension {
    /// Dimensionless (pure number)
    pub fn none() -> Self {
        Self::default()
    }

    /// The dimension of base unit `index` in a system with `len` base units
    pub fn base(index: usize, len: usize) -> Self {
        let mut exponents = vec![0; len.max(index + 1)];
        exponents[index] = 1;
        Self { exponents }
    }

    pub fn from_exponents(exponents: impl Into<Vec<i8>>) -> Self {
        Self {
            exponents: exponents.into(),
        }
    }

    pub fn exponents(&self) -> &[i8] {
        &self.exponents
    }

    /// Significant length (trailing zeros ignored)
    pub fn len(&self) -> usize {
        self.exponents
            .iter()
            .rposition(|&e| e != 0)
            .map_or(0, |i| i + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exponent of base unit `index` (zero beyond the stored length)
    pub fn get(&self, index: usize) -> i8 {
        self.exponents.get(index).copied().unwrap_or(0)
    }

    /// Check if this is a dimensionless vector
    pub fn is_none(&self) -> bool {
        self.exponents.iter().all(|&e| e == 0)
    }

    /// Index of the base unit if exactly one exponent is 1 and the rest are 0
    pub fn base_index(&self) -> Option<usize> {
        let mut found = None;
        for (i, &e) in self.exponents.iter().enumerate() {
            match e {
                0 => {}
                1 if found.is_none() => found = Some(i),
                _ => return None,
            }
        }
        found
    }

    /// Nonzero `(index, exponent)` pairs
    pub fn nonzero(&self) -> impl Iterator<Item = (usize, i8)> + '_ {
        self.exponents
            .iter()
            .enumerate()
            .filter(|&(_, &e)| e != 0)
            .map(|(i, &e)| (i, e))
    }

    fn zip_with(&self, other: &Dimension, f: impl Fn(i8, i8) -> i8) -> Dimension {
        let len = self.exponents.len().max(other.exponents.len());
        Dimension {
            exponents: (0..len).map(|i| f(self.get(i), other.get(i))).collect(),
        }
    }

    /// Dimension of a product
    pub fn add(&self, other: &Dimension) -> Dimension {
        self.zip_with(other, i8::saturating_add)
    }

    /// Dimension of a quotient
    pub fn sub(&self, other: &Dimension) -> Dimension {
        self.zip_with(other, i8::saturating_sub)
    }

    /// Dimension raised to an integer power
    pub fn scale(&self, n: i8) -> Dimension {
        Dimension {
            exponents: self.exponents.iter().map(|&e| e.saturating_mul(n)).collect(),
        }
    }

    /// Dimension of the n-th root, if every exponent is divisible by `n`
    pub fn divide_exact(&self, n: i8) -> Option<Dimension> {
        if n == 0 || self.exponents.iter().any(|&e| e % n != 0) {
            return None;
        }
        Some(Dimension {
            exponents: self.exponents.iter().map(|&e| e / n).collect(),
        })
    }

    /// Copy padded with zeros to at least `len` entries
    pub fn padded(&self, len: usize) -> Dimension {
        let mut exponents = self.exponents.clone();
        if exponents.len() < len {
            exponents.resize(len, 0);
        }
        Dimension { exponents }
    }
}

impl PartialEq for Dimension {
    fn eq(&self, other: &Self) -> bool {
        let len = self.exponents.len().max(other.exponents.len());
        (0..len).all(|i| self.get(i) == other.get(i))
    }
}

impl Eq for Dimension {}

impl Hash for Dimension {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.exponents[..self.len()].hash(state);
    }
}

impl From<&[i8]> for Dimension {
    fn from(exponents: &[i8]) -> Self {
        Self::from_exponents(exponents.to_vec())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.exponents[..self.len()].iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", e)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_padding_equality() {
        let short = Dimension::from_exponents(vec![1, 0, -2]);
        let long = Dimension::from_exponents(vec![1, 0, -2, 0, 0, 0, 0]);
        assert_eq!(short, long);
        assert_ne!(short, Dimension::from_exponents(vec![1, 0, -2, 1]));
    }

    #[test]
    fn test_base_index() {
        assert_eq!(Dimension::base(2, 7).base_index(), Some(2));
        assert_eq!(Dimension::from_exponents(vec![1, 1]).base_index(), None);
        assert_eq!(Dimension::from_exponents(vec![2]).base_index(), None);
        assert_eq!(Dimension::none().base_index(), None);
    }

    #[test]
    fn test_combination() {
        let force = Dimension::from_exponents(vec![1, 1, -2]);
        let length = Dimension::base(0, 3);
        assert_eq!(force.add(&length), Dimension::from_exponents(vec![2, 1, -2]));
        assert_eq!(force.sub(&force), Dimension::none());
        assert_eq!(length.scale(3), Dimension::from_exponents(vec![3]));
    }

    #[test]
    fn test_divide_exact() {
        let area = Dimension::from_exponents(vec![2, 0, -4]);
        assert_eq!(
            area.divide_exact(2),
            Some(Dimension::from_exponents(vec![1, 0, -2]))
        );
        assert_eq!(area.divide_exact(3), None);
    }

    #[test]
    fn test_display_ignores_trailing_zeros() {
        let d = Dimension::from_exponents(vec![1, 1, -2, 0, 0]);
        assert_eq!(d.to_string(), "[1, 1, -2]");
    }
}
