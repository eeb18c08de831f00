//! Native functions available in every session

use std::cmp::Ordering;
use std::rc::Rc;

use chrono::Local;

use crate::diagnostics::CalcError;
use crate::eval::Operand;
use crate::quantity::Quantity;
use crate::units::UnitRegistry;

use super::{Function, NamedItem, NativeFunction, Scopes};

const NATIVES: &[NativeFunction] = &[
    NativeFunction {
        name: "Abs",
        min_args: 1,
        max_args: Some(1),
        call: abs,
    },
    NativeFunction {
        name: "Sqrt",
        min_args: 1,
        max_args: Some(1),
        call: sqrt,
    },
    NativeFunction {
        name: "Round",
        min_args: 1,
        max_args: Some(2),
        call: round,
    },
    NativeFunction {
        name: "Now",
        min_args: 0,
        max_args: Some(0),
        call: now,
    },
    NativeFunction {
        name: "Today",
        min_args: 0,
        max_args: Some(0),
        call: today,
    },
    NativeFunction {
        name: "Min",
        min_args: 1,
        max_args: None,
        call: min,
    },
    NativeFunction {
        name: "Max",
        min_args: 1,
        max_args: None,
        call: max,
    },
];

/// Bind the native functions in the builtin scope
pub fn install_natives(scopes: &mut Scopes) {
    for native in NATIVES {
        scopes.set_builtin(
            native.name,
            NamedItem::Function(Rc::new(Function::Native(native.clone()))),
        );
    }
}

fn quantity_arg<'a>(function: &str, args: &'a [Operand], index: usize) -> Result<&'a Quantity, CalcError> {
    match args.get(index) {
        Some(Operand::Quantity(q)) => Ok(q),
        Some(other) => Err(CalcError::InvalidOperand {
            op: function.to_string(),
            operand: other.describe(),
        }),
        None => Err(CalcError::WrongArity {
            name: function.to_string(),
            expected: index + 1,
            found: args.len(),
        }),
    }
}

fn abs(args: &[Operand], _registry: &UnitRegistry) -> Result<Operand, CalcError> {
    let q = quantity_arg("Abs", args, 0)?;
    Ok(Quantity::new(q.value.abs(), q.unit.clone()).into())
}

fn sqrt(args: &[Operand], registry: &UnitRegistry) -> Result<Operand, CalcError> {
    let q = quantity_arg("Sqrt", args, 0)?;
    Ok(q.root(2, registry)?.into())
}

/// `Round(x)` or `Round(x, digits)`, in the unit of `x`
fn round(args: &[Operand], _registry: &UnitRegistry) -> Result<Operand, CalcError> {
    let q = quantity_arg("Round", args, 0)?;
    let digits = match args.get(1) {
        None => 0,
        Some(_) => {
            let d = quantity_arg("Round", args, 1)?;
            if !d.is_dimensionless() || d.value.fract() != 0.0 || d.value.abs() > 15.0 {
                return Err(CalcError::InvalidOperand {
                    op: "Round".into(),
                    operand: format!("digit count `{}`", d),
                });
            }
            d.value as i32
        }
    };
    let scale = 10f64.powi(digits);
    Ok(Quantity::new((q.value * scale).round() / scale, q.unit.clone()).into())
}

fn now(_args: &[Operand], _registry: &UnitRegistry) -> Result<Operand, CalcError> {
    Ok(Operand::DateTime(Local::now().naive_local()))
}

fn today(_args: &[Operand], _registry: &UnitRegistry) -> Result<Operand, CalcError> {
    let midnight = Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CalcError::evaluation("cannot represent midnight today"))?;
    Ok(Operand::DateTime(midnight))
}

fn extreme(
    name: &str,
    args: &[Operand],
    registry: &UnitRegistry,
    keep: Ordering,
) -> Result<Operand, CalcError> {
    let mut best = args.first().cloned().ok_or_else(|| CalcError::WrongArity {
        name: name.to_string(),
        expected: 1,
        found: 0,
    })?;
    for arg in &args[1..] {
        let ordering = match (arg, &best) {
            (Operand::Quantity(a), Operand::Quantity(b)) => a.compare(b, registry)?,
            (Operand::DateTime(a), Operand::DateTime(b)) => a.cmp(b),
            (Operand::String(a), Operand::String(b)) => a.cmp(b),
            (a, b) => {
                return Err(CalcError::InvalidOperands {
                    op: name.to_string(),
                    left: b.describe(),
                    right: a.describe(),
                });
            }
        };
        if ordering == keep {
            best = arg.clone();
        }
    }
    Ok(best)
}

fn min(args: &[Operand], registry: &UnitRegistry) -> Result<Operand, CalcError> {
    extreme("Min", args, registry, Ordering::Less)
}

fn max(args: &[Operand], registry: &UnitRegistry) -> Result<Operand, CalcError> {
    extreme("Max", args, registry, Ordering::Greater)
}
