//! Built-in unit tables

use super::{
    ConvertibleUnit, Dimension, NamedDerivedUnit, SystemId, Unit, UnitRegistry, UnitSystem,
    UnitSystemConversion,
};

/// `(name, symbol)` in dimension-vector order
const SI_BASE: &[(&str, &str)] = &[
    ("meter", "m"),
    ("kilogram", "Kg"),
    ("second", "s"),
    ("ampere", "A"),
    ("kelvin", "K"),
    ("mole", "mol"),
    ("candela", "cd"),
];

/// `(name, symbol, exponents over m Kg s A K mol cd)`
const SI_DERIVED: &[(&str, &str, &[i8])] = &[
    ("newton", "N", &[1, 1, -2]),
    ("joule", "J", &[2, 1, -2]),
    ("watt", "W", &[2, 1, -3]),
    ("pascal", "Pa", &[-1, 1, -2]),
    ("hertz", "Hz", &[0, 0, -1]),
    ("coulomb", "C", &[0, 0, 1, 1]),
    ("volt", "V", &[2, 1, -3, -1]),
    ("ohm", "Ohm", &[2, 1, -3, -2]),
    ("farad", "F", &[-2, -1, 4, 2]),
    ("tesla", "T", &[0, 1, -2, -1]),
    ("weber", "Wb", &[2, 1, -2, -1]),
    ("henry", "H", &[2, 1, -2, -2]),
    ("siemens", "S", &[-2, -1, 3, 2]),
    ("gray", "Gy", &[2, 0, -2]),
];

/// A convertible unit in terms of a power of a unit of the same system
struct ConvertibleSpec {
    name: &'static str,
    symbol: &'static str,
    primary: &'static str,
    power: i8,
    scale: f64,
    offset: f64,
}

const fn conv(
    name: &'static str,
    symbol: &'static str,
    primary: &'static str,
    scale: f64,
) -> ConvertibleSpec {
    ConvertibleSpec {
        name,
        symbol,
        primary,
        power: 1,
        scale,
        offset: 0.0,
    }
}

const SI_CONVERTIBLE: &[ConvertibleSpec] = &[
    conv("gram", "g", "Kg", 0.001),
    conv("minute", "min", "s", 60.0),
    conv("hour", "h", "s", 3600.0),
    conv("day", "d", "s", 86_400.0),
    conv("year", "y", "s", 31_557_600.0),
    ConvertibleSpec {
        power: 3,
        ..conv("liter", "L", "m", 0.001)
    },
    ConvertibleSpec {
        offset: 273.15,
        ..conv("celsius", "degC", "K", 1.0)
    },
    ConvertibleSpec {
        offset: 273.15 - 32.0 * 5.0 / 9.0,
        ..conv("fahrenheit", "degF", "K", 5.0 / 9.0)
    },
    conv("bar", "bar", "Pa", 1e5),
    conv("atmosphere", "atm", "Pa", 101_325.0),
];

const IMPERIAL_BASE: &[(&str, &str)] = &[
    ("foot", "ft"),
    ("pound", "lb"),
    ("second", "s"),
    ("ampere", "A"),
    ("rankine", "°R"),
    ("mole", "mol"),
    ("candela", "cd"),
];

const IMPERIAL_CONVERTIBLE: &[ConvertibleSpec] = &[
    conv("inch", "in", "ft", 1.0 / 12.0),
    conv("yard", "yd", "ft", 3.0),
    conv("mile", "mi", "ft", 5280.0),
    conv("ounce", "oz", "lb", 1.0 / 16.0),
];

/// Base values of SI multiplied per dimension give imperial base values
const SI_TO_IMPERIAL: [f64; 7] = [1.0 / 0.3048, 1.0 / 0.453_592_37, 1.0, 1.0, 1.8, 1.0, 1.0];

fn build_system(
    id: SystemId,
    name: &str,
    base: &[(&str, &str)],
    derived: &[(&str, &str, &[i8])],
    convertible: &[ConvertibleSpec],
) -> UnitSystem {
    let mut system = UnitSystem::new(id, name, false);
    system.builtin = true;

    for (name, symbol) in base {
        system.put_base(name, symbol);
    }
    for (name, symbol, exponents) in derived {
        system.put_derived(NamedDerivedUnit {
            system: id,
            name: name.to_string(),
            symbol: symbol.to_string(),
            dimension: Dimension::from(*exponents),
        });
    }
    for spec in convertible {
        let primary = system
            .base
            .iter()
            .find(|b| b.symbol == spec.primary)
            .map(|b| Unit::Base(b.clone()))
            .or_else(|| {
                system
                    .derived
                    .iter()
                    .find(|d| d.symbol == spec.primary)
                    .map(|d| Unit::NamedDerived(d.clone()))
            });
        if let Some(primary) = primary {
            system.put_convertible(ConvertibleUnit {
                name: spec.name.to_string(),
                symbol: spec.symbol.to_string(),
                primary: primary.powi(spec.power),
                scale: spec.scale,
                offset: spec.offset,
                user_defined: false,
            });
        }
    }
    system
}

impl UnitRegistry {
    /// SI plus the imperial system and the conversion between them
    pub fn standard() -> Self {
        Self::with_builtin_systems(true)
    }

    /// SI, optionally with the imperial system
    pub fn with_builtin_systems(imperial: bool) -> Self {
        let mut registry = UnitRegistry::new();

        let si = registry.allocate_id();
        let si = registry.install(build_system(si, "SI", SI_BASE, SI_DERIVED, SI_CONVERTIBLE));

        if imperial {
            let id = registry.allocate_id();
            let imperial = registry.install(build_system(
                id,
                "Imperial",
                IMPERIAL_BASE,
                &[],
                IMPERIAL_CONVERTIBLE,
            ));
            registry.add_conversion(UnitSystemConversion::new(si, imperial, SI_TO_IMPERIAL));
        }
        registry
    }
}
