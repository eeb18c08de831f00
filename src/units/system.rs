//! Unit systems
//!
//! A system is a named set of base units (which fix the dimension vector
//! layout), named derived units, and convertible units. Extending a system
//! that may not be modified creates a new layer that stores only the
//! additions and points at its parent.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use super::{BaseUnit, ConvertibleUnit, NamedDerivedUnit};

/// Handle to a system owned by a [`super::UnitRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SystemId(pub u32);

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct UnitSystem {
    pub id: SystemId,
    pub name: String,
    /// New units may be added in place
    pub modifiable: bool,
    /// Installed by the registry at startup
    pub builtin: bool,
    /// The system this layer extends
    pub parent: Option<SystemId>,
    /// Number of base units in all ancestor layers
    pub(crate) base_offset: usize,
    pub(crate) base: Vec<Rc<BaseUnit>>,
    pub(crate) derived: Vec<Rc<NamedDerivedUnit>>,
    pub(crate) convertible: Vec<Rc<ConvertibleUnit>>,
}

impl UnitSystem {
    pub fn new(id: SystemId, name: impl Into<String>, modifiable: bool) -> Self {
        Self {
            id,
            name: name.into(),
            modifiable,
            builtin: false,
            parent: None,
            base_offset: 0,
            base: Vec::new(),
            derived: Vec::new(),
            convertible: Vec::new(),
        }
    }

    /// A layer on top of `parent` that stores only its own additions
    pub fn extending(id: SystemId, parent: &UnitSystem) -> Self {
        Self {
            id,
            name: parent.name.clone(),
            modifiable: false,
            builtin: false,
            parent: Some(parent.id),
            base_offset: parent.base_count(),
            base: Vec::new(),
            derived: Vec::new(),
            convertible: Vec::new(),
        }
    }

    /// Base units across this layer and its ancestors
    pub fn base_count(&self) -> usize {
        self.base_offset + self.base.len()
    }

    pub fn base_units(&self) -> &[Rc<BaseUnit>] {
        &self.base
    }

    pub fn derived_units(&self) -> &[Rc<NamedDerivedUnit>] {
        &self.derived
    }

    pub fn convertible_units(&self) -> &[Rc<ConvertibleUnit>] {
        &self.convertible
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.derived.is_empty() && self.convertible.is_empty()
    }

    /// Add a base unit or replace the one with the same name and symbol
    pub(crate) fn put_base(&mut self, name: &str, symbol: &str) -> Rc<BaseUnit> {
        if let Some(existing) = self
            .base
            .iter()
            .find(|b| b.name == name && b.symbol == symbol)
        {
            return existing.clone();
        }
        let unit = Rc::new(BaseUnit {
            system: self.id,
            index: self.base_count(),
            name: name.to_string(),
            symbol: symbol.to_string(),
        });
        self.base.push(unit.clone());
        unit
    }

    pub(crate) fn put_derived(&mut self, unit: NamedDerivedUnit) -> Rc<NamedDerivedUnit> {
        let unit = Rc::new(unit);
        match self
            .derived
            .iter_mut()
            .find(|d| d.name == unit.name && d.symbol == unit.symbol)
        {
            Some(slot) => *slot = unit.clone(),
            None => self.derived.push(unit.clone()),
        }
        unit
    }

    pub(crate) fn put_convertible(&mut self, unit: ConvertibleUnit) -> Rc<ConvertibleUnit> {
        let unit = Rc::new(unit);
        match self
            .convertible
            .iter_mut()
            .find(|c| c.name == unit.name && c.symbol == unit.symbol)
        {
            Some(slot) => *slot = unit.clone(),
            None => self.convertible.push(unit.clone()),
        }
        unit
    }

    /// Drop a unit from this layer; base units are never removed
    pub(crate) fn remove_named(&mut self, symbol: &str) -> bool {
        let before = self.derived.len() + self.convertible.len();
        self.derived.retain(|d| d.symbol != symbol && d.name != symbol);
        self.convertible
            .retain(|c| c.symbol != symbol && c.name != symbol);
        before != self.derived.len() + self.convertible.len()
    }
}
