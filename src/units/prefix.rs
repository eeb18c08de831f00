//! Decimal unit prefixes

use serde::Serialize;

/// A decimal scale prefix such as `K` (kilo) or `m` (milli)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Prefix {
    pub symbol: &'static str,
    pub name: &'static str,
    pub exponent: i8,
}

impl Prefix {
    pub const fn new(symbol: &'static str, name: &'static str, exponent: i8) -> Self {
        Self {
            symbol,
            name,
            exponent,
        }
    }

    /// Multiplier this prefix applies
    pub fn factor(&self) -> f64 {
        10f64.powi(i32::from(self.exponent))
    }
}

/// Known prefixes; `da` precedes `d` so the longer symbol is tried first
pub const PREFIXES: &[Prefix] = &[
    Prefix::new("Y", "yotta", 24),
    Prefix::new("Z", "zetta", 21),
    Prefix::new("E", "exa", 18),
    Prefix::new("P", "peta", 15),
    Prefix::new("T", "tera", 12),
    Prefix::new("G", "giga", 9),
    Prefix::new("M", "mega", 6),
    Prefix::new("K", "kilo", 3),
    Prefix::new("k", "kilo", 3),
    Prefix::new("h", "hecto", 2),
    Prefix::new("da", "deca", 1),
    Prefix::new("d", "deci", -1),
    Prefix::new("c", "centi", -2),
    Prefix::new("m", "milli", -3),
    Prefix::new("µ", "micro", -6),
    Prefix::new("u", "micro", -6),
    Prefix::new("n", "nano", -9),
    Prefix::new("p", "pico", -12),
    Prefix::new("f", "femto", -15),
    Prefix::new("a", "atto", -18),
    Prefix::new("z", "zepto", -21),
    Prefix::new("y", "yocto", -24),
];

/// Every way `symbol` splits into a known prefix and a non-empty remainder
pub fn split_prefixed(symbol: &str) -> impl Iterator<Item = (Prefix, &str)> {
    PREFIXES.iter().filter_map(move |prefix| {
        symbol
            .strip_prefix(prefix.symbol)
            .filter(|rest| !rest.is_empty())
            .map(|rest| (*prefix, rest))
    })
}
