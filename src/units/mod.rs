//! Dimensional algebra
//!
//! Units are exponent vectors over the base units of a unit system. This
//! module holds the unit kinds, the systems that group them, conversions
//! between systems, and the [`UnitRegistry`] that owns all of it.

mod conversion;
mod dimension;
mod parse;
mod prefix;
mod registry;
mod standard;
mod system;
mod unit;

pub use conversion::UnitSystemConversion;
pub use dimension::Dimension;
pub use parse::parse_unit_expression;
pub use prefix::{PREFIXES, Prefix, split_prefixed};
pub use registry::{Reduced, UnitDefinition, UnitRegistry};
pub use system::{SystemId, UnitSystem};
pub use unit::{BaseUnit, ConvertibleUnit, DerivedUnit, NamedDerivedUnit, Unit};
