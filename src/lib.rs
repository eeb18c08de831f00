//! Physical-quantity calculator
//!
//! Expressions mix numbers with units, and the result carries the unit
//! the arithmetic produces:
//!
//! ```text
//! pc> 3 N * 4 m
//! 12 J
//! pc> var SoundSpeed = 340 m/s
//! pc> SoundSpeed [Km/h]
//! 1224 Km/h
//! pc> unit Foo = 2.5 m
//! pc> 3 Foo
//! 7.5 m
//! pc> func addTwo(a, b) { a + b }
//! pc> addTwo(3 m, 4 m)
//! 7 m
//! ```
//!
//! # Architecture
//!
//! ```text
//! line → session (commands, declarations) → eval (shunting yard)
//!                                              ↓
//!                     env (scopes) ← EvalContext → units (registry) → quantity
//! ```

pub mod config;
pub mod decl;
pub mod diagnostics;
pub mod env;
pub mod eval;
pub mod lexer;
pub mod quantity;
pub mod session;
pub mod units;

pub use config::CalculatorConfig;
pub use diagnostics::{CalcError, Reporter};
pub use eval::{EvalContext, Operand};
pub use quantity::Quantity;
pub use session::Calculator;
pub use units::{Dimension, Unit, UnitRegistry};

/// Calculator version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Evaluate one expression in a fresh session
pub fn evaluate(expression: &str) -> Result<Operand, CalcError> {
    Calculator::default().evaluate(expression)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_evaluate() {
        let value = evaluate("3 N * 4 m").unwrap();
        assert_eq!(value.to_string(), "12 J");
    }
}
