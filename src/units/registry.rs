//! Registry of unit systems
//!
//! The registry owns every system and cross-system conversion and is passed
//! by reference into every parse and evaluation call. Lookups walk the
//! systems in lookup order; each entry is the newest layer of a system, so
//! units added by an extension shadow the ones of its parent.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostics::CalcError;
use crate::quantity::Quantity;

use super::prefix::split_prefixed;
use super::unit::write_factors;
use super::{
    ConvertibleUnit, DerivedUnit, Dimension, NamedDerivedUnit, SystemId, Unit, UnitSystem,
    UnitSystemConversion,
};

/// A unit reduced to the base units of one system:
/// `base value = value * factor + offset`
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    /// `None` for pure numbers, which belong to every system
    pub system: Option<SystemId>,
    pub dimension: Dimension,
    pub factor: f64,
    pub offset: f64,
}

impl Reduced {
    pub fn dimensionless() -> Self {
        Self {
            system: None,
            dimension: Dimension::none(),
            factor: 1.0,
            offset: 0.0,
        }
    }
}

/// What a `unit` declaration introduces
#[derive(Debug, Clone, PartialEq)]
pub enum UnitDefinition {
    /// A new base unit, i.e. a new dimension
    Base,
    /// `primary = value * scale + offset`
    Convertible {
        primary: Unit,
        scale: f64,
        offset: f64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    systems: IndexMap<SystemId, UnitSystem>,
    conversions: Vec<UnitSystemConversion>,
    lookup_order: Vec<SystemId>,
    next_id: u32,
}

impl UnitRegistry {
    /// An empty registry; see [`UnitRegistry::standard`] for the built-in tables
    pub fn new() -> Self {
        Self::default()
    }

    // ---- systems -------------------------------------------------------

    pub(crate) fn allocate_id(&mut self) -> SystemId {
        let id = SystemId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a system at the end of the lookup order
    pub(crate) fn install(&mut self, system: UnitSystem) -> SystemId {
        let id = system.id;
        self.lookup_order.push(id);
        self.systems.insert(id, system);
        id
    }

    pub fn add_conversion(&mut self, conversion: UnitSystemConversion) {
        self.conversions.push(conversion);
    }

    pub fn system(&self, id: SystemId) -> Option<&UnitSystem> {
        self.systems.get(&id)
    }

    /// Current layer of every system, in lookup order
    pub fn systems(&self) -> impl Iterator<Item = &UnitSystem> + '_ {
        self.lookup_order.iter().filter_map(|id| self.systems.get(id))
    }

    /// Current layer of the system with this name (case-insensitive)
    pub fn system_by_name(&self, name: &str) -> Option<SystemId> {
        self.systems()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.id)
    }

    /// A layer followed by all of its ancestors
    pub fn lineage(&self, id: SystemId) -> impl Iterator<Item = &UnitSystem> + '_ {
        std::iter::successors(self.systems.get(&id), move |s| {
            s.parent.and_then(|p| self.systems.get(&p))
        })
    }

    /// Outermost ancestor of a layer
    pub fn root(&self, id: SystemId) -> SystemId {
        self.lineage(id).last().map_or(id, |s| s.id)
    }

    /// Check if `ancestor` is `id` or one of the layers it extends
    pub fn is_ancestor(&self, ancestor: SystemId, id: SystemId) -> bool {
        self.lineage(id).any(|s| s.id == ancestor)
    }

    fn related(&self, a: SystemId, b: SystemId) -> bool {
        self.is_ancestor(a, b) || self.is_ancestor(b, a)
    }

    fn base_count(&self, id: SystemId) -> usize {
        self.systems.get(&id).map_or(0, |s| s.base_count())
    }

    /// Registered conversion between the roots of two systems
    pub fn conversion_between(
        &self,
        from: SystemId,
        to: SystemId,
    ) -> Option<(&UnitSystemConversion, bool)> {
        let (from, to) = (self.root(from), self.root(to));
        self.conversions
            .iter()
            .find_map(|c| c.direction(from, to).map(|backwards| (c, backwards)))
    }

    /// Factor mapping base values of `from` into base values of `to`
    fn bridge(&self, from: SystemId, to: SystemId, dimension: &Dimension) -> Option<f64> {
        if self.related(from, to) {
            return Some(1.0);
        }
        let (conversion, backwards) = self.conversion_between(from, to)?;
        conversion.factor(dimension, backwards)
    }

    // ---- lookup --------------------------------------------------------

    fn find_in_lineage(&self, id: SystemId, text: &str) -> Option<Unit> {
        for layer in self.lineage(id) {
            if let Some(b) = layer.base.iter().find(|b| b.symbol == text) {
                return Some(Unit::Base(b.clone()));
            }
            if let Some(d) = layer.derived.iter().find(|d| d.symbol == text) {
                return Some(Unit::NamedDerived(d.clone()));
            }
            if let Some(c) = layer.convertible.iter().find(|c| c.symbol == text) {
                return Some(Unit::Convertible(c.clone()));
            }
        }
        for layer in self.lineage(id) {
            if let Some(b) = layer.base.iter().find(|b| b.name == text) {
                return Some(Unit::Base(b.clone()));
            }
            if let Some(d) = layer.derived.iter().find(|d| d.name == text) {
                return Some(Unit::NamedDerived(d.clone()));
            }
            if let Some(c) = layer.convertible.iter().find(|c| c.name == text) {
                return Some(Unit::Convertible(c.clone()));
            }
        }
        None
    }

    /// Exact match by symbol or name across all systems
    pub fn unit_from_symbol(&self, symbol: &str) -> Option<Unit> {
        self.lookup_order
            .iter()
            .find_map(|&id| self.find_in_lineage(id, symbol))
    }

    /// Resolve a unit as written: exact symbol or name, then a decimal
    /// prefix plus a known unit (`Km`), then a trailing exponent (`m2`).
    pub fn lookup(&self, text: &str) -> Option<Unit> {
        self.resolve_with(text, &|t| self.unit_from_symbol(t))
    }

    /// Like [`UnitRegistry::lookup`], restricted to one system
    pub fn lookup_in_system(&self, system: SystemId, text: &str) -> Option<Unit> {
        self.resolve_with(text, &|t| self.find_in_lineage(system, t))
    }

    fn resolve_with(&self, text: &str, exact: &dyn Fn(&str) -> Option<Unit>) -> Option<Unit> {
        if let Some(unit) = exact(text) {
            return Some(unit);
        }
        for (prefix, rest) in split_prefixed(text) {
            match exact(rest) {
                Some(unit @ (Unit::Base(_) | Unit::NamedDerived(_) | Unit::Convertible(_))) => {
                    return Some(Unit::Prefixed {
                        prefix,
                        unit: Box::new(unit),
                    });
                }
                _ => {}
            }
        }
        let stem = text.trim_end_matches(|c: char| c.is_ascii_digit());
        if !stem.is_empty() && stem.len() < text.len() {
            let exp: i8 = text[stem.len()..].parse().ok()?;
            let unit = self.resolve_with(stem, exact)?;
            return Some(unit.powi(exp));
        }
        None
    }

    /// Current layer of the system whose lineage defines `symbol` exactly
    pub fn system_defining(&self, symbol: &str) -> Option<SystemId> {
        self.lookup_order
            .iter()
            .copied()
            .find(|&id| self.find_in_lineage(id, symbol).is_some())
    }

    // ---- algebra -------------------------------------------------------

    /// Reduce a unit to base units of one system.
    ///
    /// Fails for products mixing systems with no registered conversion.
    pub fn reduce(&self, unit: &Unit) -> Option<Reduced> {
        match unit {
            Unit::Dimensionless => Some(Reduced::dimensionless()),
            Unit::Base(b) => Some(Reduced {
                system: Some(b.system),
                dimension: Dimension::base(b.index, self.base_count(b.system)),
                factor: 1.0,
                offset: 0.0,
            }),
            Unit::NamedDerived(d) => Some(Reduced {
                system: Some(d.system),
                dimension: d.dimension.clone(),
                factor: 1.0,
                offset: 0.0,
            }),
            Unit::Derived(d) => Some(Reduced {
                system: Some(d.system),
                dimension: d.dimension.clone(),
                factor: 1.0,
                offset: 0.0,
            }),
            Unit::Convertible(c) => {
                let r = self.reduce(&c.primary)?;
                Some(Reduced {
                    factor: c.scale * r.factor,
                    offset: c.offset * r.factor + r.offset,
                    ..r
                })
            }
            Unit::Prefixed { prefix, unit } => {
                let r = self.reduce(unit)?;
                Some(Reduced {
                    factor: prefix.factor() * r.factor,
                    ..r
                })
            }
            Unit::Combined(factors) => self.reduce_product(factors),
        }
    }

    fn reduce_product(&self, factors: &[(Unit, i8)]) -> Option<Reduced> {
        let reduced = factors
            .iter()
            .map(|(u, e)| self.reduce(u).map(|r| (r, *e)))
            .collect::<Option<Vec<_>>>()?;

        // Express the product in the deepest layer among related systems
        let mut target: Option<SystemId> = None;
        for (r, _) in &reduced {
            if let Some(s) = r.system {
                match target {
                    None => target = Some(s),
                    Some(t) if t != s && self.is_ancestor(t, s) => target = Some(s),
                    _ => {}
                }
            }
        }

        let mut dimension = Dimension::none();
        let mut factor = 1.0;
        for (r, e) in &reduced {
            let scaled = r.dimension.scale(*e);
            let bridge = match (r.system, target) {
                (Some(from), Some(to)) => self.bridge(from, to, &scaled)?,
                _ => 1.0,
            };
            dimension = dimension.add(&scaled);
            factor *= r.factor.powi(i32::from(*e)) * bridge;
        }
        Some(Reduced {
            system: target,
            dimension,
            factor,
            offset: 0.0,
        })
    }

    /// Check if two units measure the same thing
    pub fn compatible(&self, a: &Unit, b: &Unit) -> bool {
        a == b || self.convert_value(1.0, a, b).is_some()
    }

    /// Convert a value between units; `None` if they are not convertible
    pub fn convert_value(&self, value: f64, from: &Unit, to: &Unit) -> Option<f64> {
        if from == to {
            return Some(value);
        }
        if let Unit::Convertible(c) = from {
            if c.primary == *to {
                return Some(value * c.scale + c.offset);
            }
        }
        if let Unit::Convertible(c) = to {
            if c.primary == *from {
                return Some((value - c.offset) / c.scale);
            }
        }

        let source = self.reduce(from)?;
        let target = self.reduce(to)?;
        if target.factor == 0.0 {
            return None;
        }
        let bridge = match (source.system, target.system) {
            (Some(a), Some(b)) => self.bridge(a, b, &source.dimension)?,
            _ => 1.0,
        };
        if source.dimension != target.dimension {
            return None;
        }
        let base = (value * source.factor + source.offset) * bridge;
        Some((base - target.offset) / target.factor)
    }

    /// Convert a quantity into `target`
    pub fn convert(&self, quantity: &Quantity, target: &Unit) -> Option<Quantity> {
        let value = self.convert_value(quantity.value, &quantity.unit, target)?;
        Some(Quantity::new(value, target.clone()))
    }

    /// Express a quantity in the units of `system`, converting across
    /// systems when needed
    pub fn convert_to_system(&self, quantity: &Quantity, system: SystemId) -> Option<Quantity> {
        let reduced = self.reduce(&quantity.unit)?;
        match reduced.system {
            Some(own) if !self.related(own, system) => {
                let (conversion, backwards) = self.conversion_between(own, system)?;
                let converted = conversion.convert(self, quantity, backwards)?;
                // the conversion lands in the root; re-recognize in the requested layer
                let dimension = self.reduce(&converted.unit)?.dimension;
                Some(Quantity::new(
                    converted.value,
                    self.recognize(system, &dimension),
                ))
            }
            _ => Some(Quantity::new(
                quantity.value * reduced.factor + reduced.offset,
                self.recognize(system, &reduced.dimension),
            )),
        }
    }

    /// The unit shown for a dimension: a base unit, else the first named
    /// derived unit with an identical vector, else an anonymous unit.
    pub fn recognize(&self, system: SystemId, dimension: &Dimension) -> Unit {
        if dimension.is_none() {
            return Unit::Dimensionless;
        }
        if let Some(index) = dimension.base_index() {
            for layer in self.lineage(system) {
                if let Some(b) = layer.base.iter().find(|b| b.index == index) {
                    return Unit::Base(b.clone());
                }
            }
        }
        for layer in self.lineage(system) {
            if let Some(d) = layer.derived.iter().find(|d| d.dimension == *dimension) {
                return Unit::NamedDerived(d.clone());
            }
        }
        Unit::Derived(Rc::new(DerivedUnit {
            system,
            dimension: dimension.clone(),
            symbol: self.generic_symbol(system, dimension),
        }))
    }

    /// Unit for a reduced value; pure numbers stay dimensionless
    pub fn recognize_reduced(&self, reduced: &Reduced) -> Unit {
        match reduced.system {
            Some(system) => self.recognize(system, &reduced.dimension),
            None => Unit::Dimensionless,
        }
    }

    fn generic_symbol(&self, system: SystemId, dimension: &Dimension) -> String {
        struct Factors<'a>(&'a [(String, i8)]);
        impl fmt::Display for Factors<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write_factors(f, self.0)
            }
        }

        let factors: Vec<(String, i8)> = dimension
            .nonzero()
            .map(|(index, exp)| {
                let symbol = self
                    .lineage(system)
                    .find_map(|l| l.base.iter().find(|b| b.index == index))
                    .map_or_else(|| format!("d{}", index), |b| b.symbol.clone());
                (symbol, exp)
            })
            .collect();
        Factors(&factors).to_string()
    }

    // ---- runtime definitions -------------------------------------------

    /// Create an empty modifiable system, or return the existing one
    pub fn define_system(&mut self, name: &str) -> SystemId {
        if let Some(id) = self.system_by_name(name) {
            return id;
        }
        let id = self.allocate_id();
        self.systems.insert(id, UnitSystem::new(id, name, true));
        self.lookup_order.insert(0, id);
        debug!(system = name, "created unit system");
        id
    }

    /// Define a unit at runtime.
    ///
    /// Without a target a new modifiable one-unit system is created. A
    /// modifiable target is changed in place (a unit with the same name and
    /// symbol keeps its slot). Any other target is left untouched: a new
    /// layer extending it takes its place in the lookup order.
    pub fn define_unit(
        &mut self,
        target: Option<SystemId>,
        name: &str,
        symbol: &str,
        definition: UnitDefinition,
    ) -> Result<Unit, CalcError> {
        if let UnitDefinition::Convertible { primary, scale, .. } = &definition {
            if *scale == 0.0 || !scale.is_finite() {
                return Err(CalcError::evaluation(format!(
                    "unit `{}` needs a finite, nonzero scale",
                    name
                )));
            }
            if self.reduce(primary).is_none() {
                return Err(CalcError::UnknownUnit {
                    name: primary.to_string(),
                });
            }
        }

        let system = match target {
            None => {
                let id = self.allocate_id();
                self.systems.insert(id, UnitSystem::new(id, name, true));
                self.lookup_order.insert(0, id);
                debug!(unit = name, "created one-unit system");
                id
            }
            Some(id) => {
                let layer = self.systems.get(&id).ok_or_else(|| {
                    CalcError::evaluation(format!("unknown unit system {}", id))
                })?;

                let existing_base = self
                    .lineage(id)
                    .flat_map(|l| l.base.iter())
                    .find(|b| b.symbol == symbol)
                    .cloned();
                match (&definition, existing_base) {
                    (UnitDefinition::Convertible { .. }, Some(_)) => {
                        return Err(CalcError::InvalidBaseUnit {
                            name: symbol.to_string(),
                        });
                    }
                    (UnitDefinition::Base, Some(b)) if b.name == name => {
                        return Ok(Unit::Base(b));
                    }
                    _ => {}
                }

                if layer.modifiable {
                    id
                } else {
                    self.extend(id)
                }
            }
        };

        let layer = self.systems.get_mut(&system).ok_or_else(|| {
            CalcError::evaluation(format!("unknown unit system {}", system))
        })?;
        let unit = match definition {
            UnitDefinition::Base => Unit::Base(layer.put_base(name, symbol)),
            UnitDefinition::Convertible {
                primary,
                scale,
                offset,
            } => Unit::Convertible(layer.put_convertible(ConvertibleUnit {
                name: name.to_string(),
                symbol: symbol.to_string(),
                primary,
                scale,
                offset,
                user_defined: true,
            })),
        };
        debug!(unit = symbol, system = %system, "defined unit");
        Ok(unit)
    }

    /// Add a layer on top of `parent` and let it take the parent's place
    fn extend(&mut self, parent: SystemId) -> SystemId {
        let id = self.allocate_id();
        let Some(base) = self.systems.get(&parent) else {
            return parent;
        };
        let layer = UnitSystem::extending(id, base);
        debug!(system = %layer.name, parent = %parent, layer = %id, "extending unit system");
        self.systems.insert(id, layer);
        match self.lookup_order.iter_mut().find(|h| **h == parent) {
            Some(slot) => *slot = id,
            None => self.lookup_order.insert(0, id),
        }
        id
    }

    /// Add a named derived unit to a system (used for the built-in tables
    /// and by hosts that register their own)
    pub fn add_derived_unit(
        &mut self,
        system: SystemId,
        name: &str,
        symbol: &str,
        dimension: Dimension,
    ) -> Option<Unit> {
        let layer = self.systems.get_mut(&system)?;
        Some(Unit::NamedDerived(layer.put_derived(NamedDerivedUnit {
            system,
            name: name.to_string(),
            symbol: symbol.to_string(),
            dimension,
        })))
    }

    /// Remove a runtime-defined unit; built-in units stay
    pub fn remove_unit(&mut self, symbol: &str) -> bool {
        let heads: Vec<SystemId> = self.lookup_order.clone();
        let mut removed = false;
        for head in heads {
            let ids: Vec<SystemId> = self.lineage(head).map(|l| l.id).collect();
            for id in ids {
                if let Some(layer) = self.systems.get_mut(&id) {
                    if !layer.builtin && layer.remove_named(symbol) {
                        removed = true;
                    }
                }
            }
        }
        removed
    }
}
