//! Environment tests
//!
//! Tests for:
//! - Case-insensitive bindings that keep their declared spelling
//! - Shadowing across function scopes and the builtin scope
//! - Namespaces and qualified names
//! - Removal, clearing and listings

use physcalc::env::{ItemKind, NamedItem, Resolved, ScopeKind, Scopes, install_natives};
use physcalc::{CalcError, Operand, UnitRegistry};
use pretty_assertions::assert_eq;

fn num(v: f64) -> Operand {
    Operand::number(v)
}

fn with_natives() -> Scopes {
    let mut scopes = Scopes::new();
    install_natives(&mut scopes);
    scopes
}

// ==================== Lookup ====================

#[test]
fn test_names_keep_declared_spelling() {
    let mut scopes = Scopes::new();
    scopes.variable_declare("SoundSpeed", num(340.0)).unwrap();
    scopes.variable_set("soundspeed", num(343.0)).unwrap();

    let (_, binding) = scopes.find_identifier("SOUNDSPEED").unwrap();
    assert_eq!(binding.name, "soundspeed");
    assert_eq!(scopes.variable_get("SoundSpeed"), Some(num(343.0)));
    assert_eq!(scopes.get(scopes.root()).unwrap().len(), 1);
}

#[test]
fn test_natives_live_in_builtin_scope() {
    let scopes = with_natives();
    let (scope, binding) = scopes.find_identifier("max").unwrap();
    assert_eq!(scope, scopes.builtin());
    assert_eq!(binding.item.kind(), ItemKind::Function);
    assert!(scopes.get(scopes.root()).unwrap().is_empty());
}

#[test]
fn test_root_binding_shadows_builtin() {
    let mut scopes = with_natives();
    scopes.variable_set("Max", num(10.0)).unwrap();
    assert_eq!(scopes.identifier_kind("max"), Some(ItemKind::Variable));
    assert!(scopes.function_find("Max").is_none());

    scopes.remove("max").unwrap();
    assert_eq!(scopes.identifier_kind("max"), Some(ItemKind::Function));
}

#[test]
fn test_builtins_cannot_be_removed() {
    let mut scopes = with_natives();
    assert_eq!(
        scopes.remove("Sqrt").unwrap_err(),
        CalcError::ReadOnly { name: "Sqrt".into() }
    );
    assert!(matches!(
        scopes.remove("nothing"),
        Err(CalcError::UnknownIdentifier { .. })
    ));
}

// ==================== Function scopes ====================

#[test]
fn test_nested_calls_see_callers() {
    let mut scopes = Scopes::new();
    scopes.variable_set("a", num(1.0)).unwrap();
    let outer = scopes.push("f", ScopeKind::Function);
    scopes.variable_declare("b", num(2.0)).unwrap();
    let inner = scopes.push("g", ScopeKind::Function);
    assert_eq!(scopes.depth(), 2);
    assert_eq!(scopes.variable_get("a"), Some(num(1.0)));
    assert_eq!(scopes.variable_get("b"), Some(num(2.0)));

    scopes.pop(inner);
    assert_eq!(scopes.current(), outer);
    scopes.pop(outer);
    assert_eq!(scopes.depth(), 0);
    assert_eq!(scopes.variable_get("b"), None);
}

#[test]
fn test_declaration_shadows_without_touching_outer() {
    let mut scopes = Scopes::new();
    scopes.variable_set("x", num(1.0)).unwrap();
    let call = scopes.push("f", ScopeKind::Function);
    scopes.variable_declare("x", num(2.0)).unwrap();
    scopes.variable_set("x", num(3.0)).unwrap();
    assert_eq!(scopes.variable_get("x"), Some(num(3.0)));
    scopes.pop(call);
    assert_eq!(scopes.variable_get("x"), Some(num(1.0)));
}

#[test]
fn test_assigning_outer_constant_is_read_only() {
    let mut scopes = Scopes::new();
    scopes.constant_set("c", num(299792458.0)).unwrap();
    scopes.push("f", ScopeKind::Function);
    assert!(matches!(
        scopes.variable_set("C", num(1.0)),
        Err(CalcError::ReadOnly { .. })
    ));
    // A local declaration may still shadow it
    scopes.variable_declare("c", num(1.0)).unwrap();
    assert_eq!(scopes.variable_get("c"), Some(num(1.0)));
}

// ==================== Namespaces ====================

#[test]
fn test_nested_namespaces() {
    let mut scopes = Scopes::new();
    let lab = scopes.namespace("Lab").unwrap();
    let optics = scopes.namespace("Lab.Optics").unwrap();
    scopes.constant_set("Lab.Optics.n", num(1.5)).unwrap();

    assert_eq!(scopes.get(optics).unwrap().outer, Some(lab));
    assert_eq!(scopes.variable_get("lab.optics.N"), Some(num(1.5)));
    assert_eq!(scopes.identifier_kind("Lab.Optics"), Some(ItemKind::Namespace));
    assert_eq!(scopes.variable_get("Lab.n"), None);
}

#[test]
fn test_namespace_body_sees_enclosing_scope() {
    let mut scopes = Scopes::new();
    scopes.variable_set("g", num(9.81)).unwrap();
    let lab = scopes.namespace("Lab").unwrap();
    let previous = scopes.set_current(lab);
    scopes.variable_declare("h", num(2.0)).unwrap();
    assert_eq!(scopes.variable_get("g"), Some(num(9.81)));
    scopes.set_current(previous);

    assert_eq!(scopes.variable_get("h"), None);
    assert_eq!(scopes.variable_get("Lab.h"), Some(num(2.0)));
}

#[test]
fn test_namespace_name_clash() {
    let mut scopes = Scopes::new();
    scopes.variable_set("Lab", num(1.0)).unwrap();
    assert!(matches!(
        scopes.namespace("Lab"),
        Err(CalcError::KindClash { .. })
    ));
    assert!(matches!(
        scopes.variable_set("Lab.g", num(1.0)),
        Err(CalcError::NotAValue { .. })
    ));
    assert!(matches!(
        scopes.variable_set("Nowhere.g", num(1.0)),
        Err(CalcError::UnknownIdentifier { .. })
    ));
}

#[test]
fn test_system_members_resolve_to_units() {
    let reg = UnitRegistry::standard();
    let si = reg.system_by_name("SI").unwrap();
    let mut scopes = Scopes::new();
    scopes.set_builtin("SI", NamedItem::System(si));

    match scopes.find_qualified("SI.m") {
        Some(Resolved::SystemMember { system, member }) => {
            assert_eq!(system, si);
            assert_eq!(member, "m");
        }
        other => panic!("expected a system member, got {:?}", other),
    }
    assert!(scopes.find_qualified("SI.m.x").is_none());
}

#[test]
fn test_rebind_system_follows_extension() {
    let mut reg = UnitRegistry::standard();
    let mut scopes = Scopes::new();
    let info = reg.define_system("Info");
    scopes.system_set("Info", info).unwrap();
    reg.define_unit(Some(info), "bit", "bit", physcalc::units::UnitDefinition::Base)
        .unwrap();
    let head = reg.system_by_name("Info").unwrap();

    scopes.rebind_system(info, head);
    match scopes.find_identifier("info").map(|(_, b)| &b.item) {
        Some(NamedItem::System(id)) => assert_eq!(*id, head),
        other => panic!("expected a system binding, got {:?}", other),
    }
}

// ==================== Removal and listing ====================

#[test]
fn test_clear_drops_namespaces() {
    let mut scopes = Scopes::new();
    scopes.variable_set("x", num(1.0)).unwrap();
    let lab = scopes.namespace("Lab").unwrap();
    let live = scopes.live_count();

    scopes.clear();
    assert!(scopes.get(scopes.root()).unwrap().is_empty());
    assert!(scopes.get(lab).is_none());
    assert_eq!(scopes.live_count(), live - 1);
}

#[test]
fn test_remove_qualified_member() {
    let mut scopes = Scopes::new();
    scopes.namespace("Lab").unwrap();
    scopes.variable_set("Lab.g", num(9.81)).unwrap();
    let removed = scopes.remove("Lab.g").unwrap();
    assert_eq!(removed.value(), Some(&num(9.81)));
    assert_eq!(scopes.variable_get("Lab.g"), None);
}

#[test]
fn test_listing_declarations() {
    let mut scopes = with_natives();
    scopes.variable_set("name", Operand::String("probe".into())).unwrap();
    scopes.constant_set("k", num(0.5)).unwrap();

    assert_eq!(
        scopes.listing(12, false),
        vec!["// namespace scope `global`", "var name = \"probe\"", "const k = 0.5"]
    );
    let with_builtin = scopes.listing(12, true);
    assert!(with_builtin.contains(&"// native function Sqrt".to_string()));
}
