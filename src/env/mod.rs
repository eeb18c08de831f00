//! Identifier environment
//!
//! Scopes form a tree. Unqualified lookup follows each scope's outer link
//! towards the root; qualified lookup (`Lab.g`) descends from a namespace
//! into its own table. Variables, constants, units, unit systems, functions
//! and namespaces share one case-insensitive namespace per scope.

mod listing;
mod natives;
mod scope;

pub use natives::install_natives;
pub use scope::{Binding, Environment, Resolved, ScopeId, ScopeKind, Scopes};

use std::fmt;
use std::rc::Rc;

use crate::diagnostics::CalcError;
use crate::eval::Operand;
use crate::units::{SystemId, Unit, UnitRegistry};

/// Kind of a bound identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Variable,
    Constant,
    Unit,
    System,
    Function,
    Namespace,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Variable => "variable",
            ItemKind::Constant => "constant",
            ItemKind::Unit => "unit",
            ItemKind::System => "unit system",
            ItemKind::Function => "function",
            ItemKind::Namespace => "namespace",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Item bound to a name
#[derive(Debug, Clone)]
pub enum NamedItem {
    Unit(Unit),
    /// Holds a quantity, date/time or string
    Variable(Operand),
    /// Read-only variable
    Constant(Operand),
    System(SystemId),
    Function(Rc<Function>),
    /// Nested scope, reached by qualified names
    Namespace(ScopeId),
}

impl NamedItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            NamedItem::Unit(_) => ItemKind::Unit,
            NamedItem::Variable(_) => ItemKind::Variable,
            NamedItem::Constant(_) => ItemKind::Constant,
            NamedItem::System(_) => ItemKind::System,
            NamedItem::Function(_) => ItemKind::Function,
            NamedItem::Namespace(_) => ItemKind::Namespace,
        }
    }

    /// Value of a variable or constant
    pub fn value(&self) -> Option<&Operand> {
        match self {
            NamedItem::Variable(v) | NamedItem::Constant(v) => Some(v),
            _ => None,
        }
    }
}

/// Host callback behind a native function
pub type NativeFn = fn(&[Operand], &UnitRegistry) -> Result<Operand, CalcError>;

#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    pub call: NativeFn,
}

/// Formal parameter, optionally constrained to a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub unit: Option<Unit>,
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} [{}]", self.name, unit),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Function defined by a `func` declaration: its body lines are replayed
/// as commands on every call
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Function {
    Native(NativeFunction),
    User(UserFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(n) => n.name,
            Function::User(u) => &u.name,
        }
    }

    /// Check an argument count, reporting the expected count on mismatch
    pub fn check_arity(&self, found: usize) -> Result<(), CalcError> {
        let (min, max) = match self {
            Function::Native(n) => (n.min_args, n.max_args),
            Function::User(u) => (u.parameters.len(), Some(u.parameters.len())),
        };
        if found < min || max.is_some_and(|max| found > max) {
            return Err(CalcError::WrongArity {
                name: self.name().to_string(),
                expected: if found < min { min } else { max.unwrap_or(min) },
                found,
            });
        }
        Ok(())
    }
}
