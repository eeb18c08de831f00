//! Integration tests for units of measure
//!
//! Tests for:
//! - Dimension vectors and their zero-padding equality
//! - Unit lookup (prefixes, powers, names)
//! - Conversions inside a system and across systems
//! - Runtime unit definitions and system extension
//! - Quantity arithmetic and printing

use physcalc::quantity::format_value;
use physcalc::units::{Dimension, UnitDefinition, UnitRegistry};
use physcalc::{CalcError, Quantity, Unit};
use pretty_assertions::assert_eq;

fn q(text: &str, reg: &UnitRegistry) -> Quantity {
    Quantity::parse(text, reg).unwrap()
}

fn unit(text: &str, reg: &UnitRegistry) -> Unit {
    reg.lookup(text).unwrap_or_else(|| panic!("unknown unit {}", text))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ==================== Dimensions ====================

#[test]
fn test_dimension_trailing_zeros_are_ignored() {
    let velocity = Dimension::from_exponents(vec![1, 0, -1]);
    let padded = Dimension::from_exponents(vec![1, 0, -1, 0, 0, 0, 0]);
    assert_eq!(velocity, padded);
    assert_eq!(velocity.padded(7), padded);
    assert!(Dimension::from_exponents(vec![0, 0, 0]).is_none());
}

#[test]
fn test_dimension_algebra() {
    let force = Dimension::from_exponents(vec![1, 1, -2]);
    let length = Dimension::base(0, 7);
    let energy = force.add(&length);
    assert_eq!(energy, Dimension::from_exponents(vec![2, 1, -2]));
    assert_eq!(energy.sub(&length), force);
    assert_eq!(length.scale(2).divide_exact(2), Some(length.clone()));
    assert_eq!(force.divide_exact(2), None);
}

// ==================== Lookup ====================

#[test]
fn test_lookup_by_symbol_and_name() {
    let reg = UnitRegistry::standard();
    assert!(matches!(reg.lookup("N"), Some(Unit::NamedDerived(_))));
    assert!(matches!(reg.lookup("m"), Some(Unit::Base(_))));
    assert!(matches!(reg.lookup("newton"), Some(Unit::NamedDerived(_))));
    assert!(reg.lookup("furlong").is_none());
}

#[test]
fn test_lookup_prefixed_units() {
    let reg = UnitRegistry::standard();
    assert_eq!(unit("Km", &reg).to_string(), "Km");
    assert_eq!(unit("ms", &reg).to_string(), "ms");
    assert_eq!(unit("MW", &reg).to_string(), "MW");
    assert!(matches!(reg.lookup("Km"), Some(Unit::Prefixed { .. })));
}

#[test]
fn test_lookup_powers() {
    let reg = UnitRegistry::standard();
    assert_eq!(unit("m3", &reg).to_string(), "m3");
    assert_eq!(unit("cm2", &reg).to_string(), "cm2");
}

// ==================== Conversions ====================

#[test]
fn test_convert_within_si() {
    let reg = UnitRegistry::standard();
    let v = reg
        .convert_value(340.0, &unit("m", &reg).div(&unit("s", &reg)), &unit("Km", &reg).div(&unit("h", &reg)))
        .unwrap();
    assert!(close(v, 1224.0));
    assert_eq!(reg.convert_value(1.0, &unit("Kg", &reg), &unit("g", &reg)), Some(1000.0));
}

#[test]
fn test_convert_with_offset() {
    let reg = UnitRegistry::standard();
    let v = reg.convert_value(0.0, &unit("degC", &reg), &unit("K", &reg)).unwrap();
    assert!(close(v, 273.15));
    let v = reg.convert_value(32.0, &unit("degF", &reg), &unit("degC", &reg)).unwrap();
    assert!(v.abs() < 1e-9);
}

#[test]
fn test_convert_across_systems() {
    let reg = UnitRegistry::standard();
    let mile = q("1 mi", &reg);
    let si = reg.system_by_name("SI").unwrap();
    let meters = reg.convert_to_system(&mile, si).unwrap();
    assert_eq!(meters.to_string(), "1609.344 m");

    let pounds = reg.convert_value(1.0, &unit("Kg", &reg), &unit("lb", &reg)).unwrap();
    assert!(close(pounds, 2.204622621849));
}

#[test]
fn test_incompatible_conversion() {
    let reg = UnitRegistry::standard();
    assert_eq!(reg.convert_value(1.0, &unit("m", &reg), &unit("s", &reg)), None);
    let err = q("3 m", &reg).convert_to(&reg, &unit("s", &reg)).unwrap_err();
    assert_eq!(
        err,
        CalcError::ConversionImpossible {
            from: "m".into(),
            to: "s".into()
        }
    );
}

// ==================== Runtime definitions ====================

#[test]
fn test_define_convertible_unit() {
    let mut reg = UnitRegistry::standard();
    let m = unit("m", &reg);
    let foo = reg
        .define_unit(
            None,
            "Foo",
            "Foo",
            UnitDefinition::Convertible {
                primary: m.clone(),
                scale: 2.5,
                offset: 0.0,
            },
        )
        .unwrap();
    assert_eq!(reg.convert_value(3.0, &foo, &m), Some(7.5));
    assert_eq!(q("3 Foo", &reg).normalized(&reg).to_string(), "7.5 m");
}

#[test]
fn test_extending_builtin_system_keeps_the_original() {
    let mut reg = UnitRegistry::standard();
    let si = reg.system_by_name("SI").unwrap();
    reg.define_unit(Some(si), "bit", "bit", UnitDefinition::Base).unwrap();

    let head = reg.system_by_name("SI").unwrap();
    assert_ne!(head, si);
    assert!(reg.is_ancestor(si, head));
    assert!(reg.lookup_in_system(si, "bit").is_none());
    assert!(reg.lookup_in_system(head, "bit").is_some());
    assert!(reg.lookup_in_system(head, "J").is_some());
}

#[test]
fn test_zero_scale_is_rejected() {
    let mut reg = UnitRegistry::standard();
    let m = unit("m", &reg);
    let result = reg.define_unit(
        None,
        "Nothing",
        "Nothing",
        UnitDefinition::Convertible {
            primary: m,
            scale: 0.0,
            offset: 0.0,
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_remove_runtime_unit() {
    let mut reg = UnitRegistry::standard();
    let system = reg.define_system("Info");
    reg.define_unit(Some(system), "byte", "B", UnitDefinition::Base).unwrap();
    assert!(reg.lookup("B").is_some());
    assert!(reg.remove_unit("B"));
    assert!(reg.lookup("B").is_none());
    assert!(!reg.remove_unit("m"));
}

// ==================== Quantities ====================

#[test]
fn test_force_times_distance_is_energy() {
    let reg = UnitRegistry::standard();
    let work = q("3 N", &reg).mul(&q("4 m", &reg), &reg).unwrap();
    assert_eq!(work.to_string(), "12 J");
}

#[test]
fn test_sum_uses_left_unit() {
    let reg = UnitRegistry::standard();
    let total = q("1 Km", &reg).add(&q("250 m", &reg), &reg).unwrap();
    assert_eq!(total.to_string(), "1.25 Km");
}

#[test]
fn test_power_and_root() {
    let reg = UnitRegistry::standard();
    let volume = q("2 m", &reg).pow(3, &reg).unwrap();
    assert_eq!(volume.to_string(), "8 m3");
    assert_eq!(volume.root(3, &reg).unwrap().to_string(), "2 m");
    assert!(q("2 m", &reg).pow(2, &reg).unwrap().root(3, &reg).is_err());
}

#[test]
fn test_printing_precision() {
    assert_eq!(format_value(2.0 / 3.0, 4), "0.6667");
    assert_eq!(format_value(1234567.0, 3), "1230000");
    assert_eq!(format_value(6.02214076e23, 12), "6.02214076E23");
}

#[test]
fn test_parse_printed_quantity() {
    let reg = UnitRegistry::standard();
    for text in ["12 J", "-3.5 Km/h", "9.81 m/s2", "42"] {
        assert_eq!(q(text, &reg).to_string(), text);
    }
}
