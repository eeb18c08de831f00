//! Scopes and bindings

use indexmap::IndexMap;
use tracing::debug;

use crate::diagnostics::CalcError;
use crate::eval::Operand;
use crate::units::{SystemId, Unit};

use super::{Function, ItemKind, NamedItem};
use std::rc::Rc;

/// Handle to a scope owned by [`Scopes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Scope level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Session root, builtins, and `namespace` declarations
    Namespace,
    /// One function call; discarded when the call returns
    Function,
}

/// A name as declared plus the item bound to it
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub item: NamedItem,
}

/// A single scope
#[derive(Debug, Clone)]
pub struct Environment {
    pub name: String,
    pub kind: ScopeKind,
    /// Lookup continues here when a name is not bound locally
    pub outer: Option<ScopeId>,
    /// Keyed by lowercase name
    items: IndexMap<String, Binding>,
}

impl Environment {
    pub fn new(name: impl Into<String>, kind: ScopeKind, outer: Option<ScopeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            outer,
            items: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.items.get(&name.to_lowercase())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.items.get_mut(&name.to_lowercase())
    }

    fn insert(&mut self, name: &str, item: NamedItem) {
        self.items.insert(
            name.to_lowercase(),
            Binding {
                name: name.to_string(),
                item,
            },
        );
    }

    fn remove(&mut self, name: &str) -> Option<Binding> {
        self.items.shift_remove(&name.to_lowercase())
    }

    /// Bindings in declaration order
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of resolving a possibly qualified name
#[derive(Debug, Clone, Copy)]
pub enum Resolved<'a> {
    Item {
        scope: ScopeId,
        binding: &'a Binding,
    },
    /// `System.unit`; the member is looked up in the unit registry
    SystemMember { system: SystemId, member: &'a str },
}

impl Resolved<'_> {
    pub fn kind(&self) -> ItemKind {
        match self {
            Resolved::Item { binding, .. } => binding.item.kind(),
            Resolved::SystemMember { .. } => ItemKind::Unit,
        }
    }
}

/// Tree of scopes with a current position.
///
/// Slot 0 holds builtins (native functions and the built-in unit systems);
/// slot 1 is the session root whose outer link is the builtin scope.
#[derive(Debug, Clone)]
pub struct Scopes {
    frames: Vec<Option<Environment>>,
    free: Vec<usize>,
    current: ScopeId,
}

const BUILTIN: ScopeId = ScopeId(0);
const ROOT: ScopeId = ScopeId(1);

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            frames: vec![
                Some(Environment::new("builtin", ScopeKind::Namespace, None)),
                Some(Environment::new("global", ScopeKind::Namespace, Some(BUILTIN))),
            ],
            free: Vec::new(),
            current: ROOT,
        }
    }

    pub fn builtin(&self) -> ScopeId {
        BUILTIN
    }

    pub fn root(&self) -> ScopeId {
        ROOT
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Make `id` the current scope, returning the previous one
    pub fn set_current(&mut self, id: ScopeId) -> ScopeId {
        std::mem::replace(&mut self.current, id)
    }

    pub fn get(&self, id: ScopeId) -> Option<&Environment> {
        self.frames.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ScopeId) -> Option<&mut Environment> {
        self.frames.get_mut(id.0).and_then(Option::as_mut)
    }

    fn frame_mut(&mut self, id: ScopeId) -> Result<&mut Environment, CalcError> {
        self.get_mut(id)
            .ok_or_else(|| CalcError::evaluation("scope no longer exists"))
    }

    /// Number of live scopes (builtin and root included)
    pub fn live_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    /// Depth of the current scope below the root
    pub fn depth(&self) -> usize {
        self.chain(self.current).count().saturating_sub(2)
    }

    fn alloc(&mut self, env: Environment) -> ScopeId {
        match self.free.pop() {
            Some(slot) => {
                self.frames[slot] = Some(env);
                ScopeId(slot)
            }
            None => {
                self.frames.push(Some(env));
                ScopeId(self.frames.len() - 1)
            }
        }
    }

    /// Open a child of the current scope and make it current
    pub fn push(&mut self, name: &str, kind: ScopeKind) -> ScopeId {
        let id = self.alloc(Environment::new(name, kind, Some(self.current)));
        self.current = id;
        id
    }

    /// Discard a scope and the namespaces declared in it. If it was
    /// current, its outer scope becomes current.
    pub fn pop(&mut self, id: ScopeId) {
        if id == BUILTIN || id == ROOT {
            return;
        }
        let Some(env) = self.frames.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        self.free.push(id.0);
        if self.current == id {
            self.current = env.outer.unwrap_or(ROOT);
        }
        for binding in env.items.into_values() {
            if let NamedItem::Namespace(child) = binding.item {
                self.pop(child);
            }
        }
    }

    /// Scopes from `start` outwards
    pub fn chain(&self, start: ScopeId) -> impl Iterator<Item = (ScopeId, &Environment)> + '_ {
        std::iter::successors(self.get(start).map(|env| (start, env)), move |(_, env)| {
            env.outer.and_then(|id| self.get(id).map(|outer| (id, outer)))
        })
    }

    // ---- lookup --------------------------------------------------------

    /// Innermost binding of `name`, searching from the current scope
    pub fn find_identifier(&self, name: &str) -> Option<(ScopeId, &Binding)> {
        self.find_identifier_from(self.current, name)
    }

    pub fn find_identifier_from(&self, start: ScopeId, name: &str) -> Option<(ScopeId, &Binding)> {
        self.chain(start)
            .find_map(|(id, env)| env.get(name).map(|binding| (id, binding)))
    }

    /// Resolve `a.b.c`: the first segment lexically, the rest as members
    /// of namespaces (or, for the last segment, of a unit system)
    pub fn find_qualified<'a>(&'a self, path: &'a str) -> Option<Resolved<'a>> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let (mut scope, mut binding) = self.find_identifier(first)?;

        let mut rest = segments.peekable();
        while let Some(segment) = rest.next() {
            match binding.item {
                NamedItem::Namespace(child) => {
                    binding = self.get(child)?.get(segment)?;
                    scope = child;
                }
                NamedItem::System(system) if rest.peek().is_none() => {
                    return Some(Resolved::SystemMember {
                        system,
                        member: segment,
                    });
                }
                _ => return None,
            }
        }
        Some(Resolved::Item { scope, binding })
    }

    /// Kind of the item a (possibly qualified) name refers to
    pub fn identifier_kind(&self, name: &str) -> Option<ItemKind> {
        self.find_qualified(name).map(|r| r.kind())
    }

    /// Scope that a qualified name's last segment belongs to, plus that segment
    fn target_scope<'a>(&self, name: &'a str) -> Result<(ScopeId, &'a str), CalcError> {
        match name.rsplit_once('.') {
            None => Ok((self.current, name)),
            Some((path, last)) => match self.find_qualified(path) {
                Some(Resolved::Item { binding, .. }) => match binding.item {
                    NamedItem::Namespace(child) => Ok((child, last)),
                    _ => Err(CalcError::NotAValue {
                        name: path.to_string(),
                        kind: binding.item.kind().to_string(),
                    }),
                },
                _ => Err(CalcError::UnknownIdentifier {
                    name: path.to_string(),
                }),
            },
        }
    }

    // ---- declarations --------------------------------------------------

    fn bind_in(&mut self, scope: ScopeId, name: &str, item: NamedItem) -> Result<(), CalcError> {
        let frame = self.frame_mut(scope)?;
        if let Some(existing) = frame.get(name) {
            let existing_kind = existing.item.kind();
            if existing_kind == ItemKind::Constant {
                return Err(CalcError::ReadOnly {
                    name: existing.name.clone(),
                });
            }
            if existing_kind != item.kind() {
                return Err(CalcError::KindClash {
                    name: existing.name.clone(),
                    existing: existing_kind.to_string(),
                    requested: item.kind().to_string(),
                });
            }
        }
        frame.insert(name, item);
        Ok(())
    }

    /// Declare in the current scope (or in the namespace a qualified name
    /// points into). A name bound locally under another kind is rejected.
    pub fn set_local_identifier(&mut self, name: &str, item: NamedItem) -> Result<(), CalcError> {
        let (scope, last) = self.target_scope(name)?;
        self.bind_in(scope, last, item)
    }

    /// Assign: an existing binding of the same kind in an enclosing scope
    /// is updated in place, otherwise the name is declared locally.
    pub fn set_identifier(&mut self, name: &str, item: NamedItem) -> Result<ScopeId, CalcError> {
        if name.contains('.') {
            let (scope, last) = self.target_scope(name)?;
            self.bind_in(scope, last, item)?;
            return Ok(scope);
        }

        let found = self.find_identifier(name).map(|(id, b)| (id, b.item.kind()));
        let scope = match found {
            Some((id, ItemKind::Constant)) if id != BUILTIN => id,
            Some((id, kind)) if kind == item.kind() && id != BUILTIN => id,
            _ => self.current,
        };
        self.bind_in(scope, name, item)?;
        Ok(scope)
    }

    /// Bind in the builtin scope (native functions, built-in systems)
    pub fn set_builtin(&mut self, name: &str, item: NamedItem) {
        if let Some(frame) = self.get_mut(BUILTIN) {
            frame.insert(name, item);
        }
    }

    pub fn variable_get(&self, name: &str) -> Option<Operand> {
        match self.find_qualified(name)? {
            Resolved::Item { binding, .. } => binding.item.value().cloned(),
            Resolved::SystemMember { .. } => None,
        }
    }

    /// Assign a variable (see [`Scopes::set_identifier`])
    pub fn variable_set(&mut self, name: &str, value: Operand) -> Result<ScopeId, CalcError> {
        if !value.is_storable() {
            return Err(CalcError::InvalidOperand {
                op: "=".into(),
                operand: value.describe(),
            });
        }
        self.set_identifier(name, NamedItem::Variable(value))
    }

    /// Declare a variable in the current scope
    pub fn variable_declare(&mut self, name: &str, value: Operand) -> Result<(), CalcError> {
        if !value.is_storable() {
            return Err(CalcError::InvalidOperand {
                op: "var".into(),
                operand: value.describe(),
            });
        }
        self.set_local_identifier(name, NamedItem::Variable(value))
    }

    pub fn constant_set(&mut self, name: &str, value: Operand) -> Result<(), CalcError> {
        if !value.is_storable() {
            return Err(CalcError::InvalidOperand {
                op: "const".into(),
                operand: value.describe(),
            });
        }
        self.set_local_identifier(name, NamedItem::Constant(value))
    }

    pub fn unit_get(&self, name: &str) -> Option<Unit> {
        match self.find_qualified(name)? {
            Resolved::Item { binding, .. } => match &binding.item {
                NamedItem::Unit(u) => Some(u.clone()),
                _ => None,
            },
            Resolved::SystemMember { .. } => None,
        }
    }

    pub fn unit_set(&mut self, name: &str, unit: Unit) -> Result<(), CalcError> {
        self.set_local_identifier(name, NamedItem::Unit(unit))
    }

    pub fn system_set(&mut self, name: &str, system: SystemId) -> Result<(), CalcError> {
        self.set_local_identifier(name, NamedItem::System(system))
    }

    /// Point every binding of a system at a new layer
    pub fn rebind_system(&mut self, old: SystemId, new: SystemId) {
        for env in self.frames.iter_mut().flatten() {
            for binding in env.items.values_mut() {
                if matches!(binding.item, NamedItem::System(id) if id == old) {
                    binding.item = NamedItem::System(new);
                }
            }
        }
    }

    pub fn function_find(&self, name: &str) -> Option<Rc<Function>> {
        match self.find_qualified(name)? {
            Resolved::Item { binding, .. } => match &binding.item {
                NamedItem::Function(f) => Some(f.clone()),
                _ => None,
            },
            Resolved::SystemMember { .. } => None,
        }
    }

    pub fn function_set(&mut self, name: &str, function: Function) -> Result<(), CalcError> {
        self.set_local_identifier(name, NamedItem::Function(Rc::new(function)))
    }

    /// Open (or reopen) a namespace declared in the current scope
    pub fn namespace(&mut self, name: &str) -> Result<ScopeId, CalcError> {
        let (scope, last) = self.target_scope(name)?;
        if let Some(binding) = self.get(scope).and_then(|env| env.get(last)) {
            return match binding.item {
                NamedItem::Namespace(id) => Ok(id),
                ref other => Err(CalcError::KindClash {
                    name: binding.name.clone(),
                    existing: other.kind().to_string(),
                    requested: ItemKind::Namespace.to_string(),
                }),
            };
        }
        let id = self.alloc(Environment::new(last, ScopeKind::Namespace, Some(scope)));
        self.bind_in(scope, last, NamedItem::Namespace(id))?;
        debug!(namespace = name, "declared namespace");
        Ok(id)
    }

    /// Remove the innermost binding of a name; builtins cannot be removed
    pub fn remove(&mut self, name: &str) -> Result<NamedItem, CalcError> {
        let unknown = || CalcError::UnknownIdentifier {
            name: name.to_string(),
        };
        let (scope, last) = match name.rsplit_once('.') {
            Some(_) => self.target_scope(name)?,
            None => (self.find_identifier(name).ok_or_else(unknown)?.0, name),
        };
        if scope == BUILTIN {
            return Err(CalcError::ReadOnly {
                name: name.to_string(),
            });
        }
        let binding = self.frame_mut(scope)?.remove(last).ok_or_else(unknown)?;
        if let NamedItem::Namespace(child) = binding.item {
            self.pop(child);
        }
        Ok(binding.item)
    }

    /// Drop every binding of the current scope
    pub fn clear(&mut self) {
        let current = self.current;
        let Some(env) = self.get_mut(current) else {
            return;
        };
        let items = std::mem::take(&mut env.items);
        for binding in items.into_values() {
            if let NamedItem::Namespace(child) = binding.item {
                self.pop(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Quantity;

    fn num(v: f64) -> Operand {
        Operand::Quantity(Quantity::number(v))
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let mut scopes = Scopes::new();
        scopes.variable_set("Speed", num(3.0)).unwrap();
        assert_eq!(scopes.variable_get("speed"), Some(num(3.0)));
        let (_, binding) = scopes.find_identifier("SPEED").unwrap();
        assert_eq!(binding.name, "Speed");
    }

    #[test]
    fn test_shadowing_and_pop() {
        let mut scopes = Scopes::new();
        scopes.variable_set("x", num(1.0)).unwrap();
        let call = scopes.push("f", ScopeKind::Function);
        scopes.variable_declare("x", num(2.0)).unwrap();
        assert_eq!(scopes.variable_get("x"), Some(num(2.0)));
        scopes.pop(call);
        assert_eq!(scopes.current(), scopes.root());
        assert_eq!(scopes.variable_get("x"), Some(num(1.0)));
    }

    #[test]
    fn test_assignment_updates_outer_binding() {
        let mut scopes = Scopes::new();
        scopes.variable_set("total", num(1.0)).unwrap();
        let call = scopes.push("f", ScopeKind::Function);
        let scope = scopes.variable_set("total", num(5.0)).unwrap();
        assert_eq!(scope, scopes.root());
        scopes.variable_set("local", num(2.0)).unwrap();
        scopes.pop(call);
        assert_eq!(scopes.variable_get("total"), Some(num(5.0)));
        assert_eq!(scopes.variable_get("local"), None);
    }

    #[test]
    fn test_kind_clash_in_same_scope() {
        let mut scopes = Scopes::new();
        scopes.variable_set("x", num(1.0)).unwrap();
        let err = scopes.unit_set("x", Unit::Dimensionless).unwrap_err();
        assert!(matches!(err, CalcError::KindClash { .. }));
    }

    #[test]
    fn test_constants_are_read_only() {
        let mut scopes = Scopes::new();
        scopes.constant_set("c", num(3e8)).unwrap();
        let err = scopes.variable_set("c", num(1.0)).unwrap_err();
        assert_eq!(err, CalcError::ReadOnly { name: "c".into() });
    }

    #[test]
    fn test_namespace_members() {
        let mut scopes = Scopes::new();
        let lab = scopes.namespace("Lab").unwrap();
        scopes.variable_set("Lab.g", num(9.81)).unwrap();
        assert_eq!(scopes.variable_get("lab.G"), Some(num(9.81)));
        assert_eq!(scopes.variable_get("g"), None);
        assert_eq!(scopes.namespace("Lab").unwrap(), lab);

        scopes.remove("Lab").unwrap();
        assert!(scopes.get(lab).is_none());
    }

    #[test]
    fn test_non_storable_values_are_rejected() {
        let mut scopes = Scopes::new();
        assert!(scopes.variable_set("b", Operand::Boolean(true)).is_err());
    }

    #[test]
    fn test_freed_slots_are_reused() {
        let mut scopes = Scopes::new();
        let first = scopes.push("a", ScopeKind::Function);
        scopes.pop(first);
        let second = scopes.push("b", ScopeKind::Function);
        assert_eq!(first, second);
        assert_eq!(scopes.live_count(), 3);
    }
}
