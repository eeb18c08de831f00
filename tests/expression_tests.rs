//! Expression evaluation tests
//!
//! Tests the parse surface against a full calculator session:
//! literals → shunting yard → unit algebra → optional conversion

use physcalc::eval::{
    parse_boolean_expression, parse_expression, parse_expression_list,
    parse_optional_converted_expression, parse_physical_unit, parse_qualified_identifier,
};
use physcalc::lexer::TokenKind;
use physcalc::{CalcError, Calculator, Operand, Reporter};
use pretty_assertions::assert_eq;

/// Evaluate with an optional conversion suffix and print the result
fn eval(source: &str) -> Result<String, CalcError> {
    let mut calc = Calculator::default();
    let mut reporter = Reporter::new();
    let (value, _) = parse_optional_converted_expression(&mut calc, source, &mut reporter, &[]);
    match value {
        Some(value) if !reporter.has_errors() => Ok(value.to_string()),
        _ => Err(reporter.into_error().expect("a failed parse reports an error")),
    }
}

fn assert_evaluates(source: &str, expected: &str) {
    match eval(source) {
        Ok(printed) => assert_eq!(printed, expected, "evaluating `{}`", source),
        Err(e) => panic!("`{}` failed: {}", source, e),
    }
}

// ==================== Arithmetic ====================

#[test]
fn test_operator_precedence() {
    assert_evaluates("1 + 2 * 3", "7");
    assert_evaluates("(1 + 2) * 3", "9");
    assert_evaluates("2 * 3 ^ 2", "18");
    assert_evaluates("12 / 4 / 3", "1");
    assert_evaluates("2 ^ 3 ^ 2", "64");
}

#[test]
fn test_unary_operators() {
    assert_evaluates("-3 m + 5 m", "2 m");
    assert_evaluates("+4", "4");
    assert_evaluates("-2 ^ 2", "4");
    assert_evaluates("!true", "false");
    assert_evaluates("!(2 m > 1 m)", "false");
}

#[test]
fn test_unit_algebra() {
    assert_evaluates("3 N * 4 m", "12 J");
    assert_evaluates("13 g + 99.987 Kg - 10 mg", "99999.99 g");
    assert_evaluates("10 m / 2 s", "5 m/s");
    assert_evaluates("(3 m) ^ 2", "9 m2");
    assert_evaluates("16 m2 ^ 0.5", "4 m");
    assert_evaluates("27 m3 root 3", "3 m");
    assert_evaluates("6 J / 2 s", "3 W");
}

#[test]
fn test_unit_literal_matching_named_unit() {
    assert_evaluates("5 Kg*m/s2", "5 N");
    assert_evaluates("3 N/m2", "3 Pa");
    assert_evaluates("2 Kg * 3 m/s2", "6 N");
    assert_evaluates("36 Km/h", "36 Km/h");
    assert_evaluates("5 Kg*m/s2 [Kg*m/s2]", "5 Kg·m/s2");
}

#[test]
fn test_unit_operands() {
    assert_evaluates("5 * Km", "5 Km");
    assert_evaluates("m / s", "m/s");
    assert_evaluates("Km <> m", "true");
}

#[test]
fn test_literals() {
    assert_evaluates("1.5E3 m", "1500 m");
    assert_evaluates("0x1H2", "256");
    assert_evaluates("\"tab\\tseparated\"", "tab\tseparated");
    assert_evaluates("#2024-02-28# + 2 d", "2024-03-01 00:00:00");
    assert_evaluates("#2024-01-01 10:00# - 90 min", "2024-01-01 08:30:00");
}

// ==================== Comparisons ====================

#[test]
fn test_comparisons_convert_units() {
    assert_evaluates("1 Km > 999 m", "true");
    assert_evaluates("1 h == 3600 s", "true");
    assert_evaluates("1 ft < 1 m", "true");
    assert_evaluates("2 <> 2", "false");
    assert_evaluates("1 + 1 == 2", "true");
}

#[test]
fn test_boolean_expression() {
    let mut calc = Calculator::default();
    let mut reporter = Reporter::new();
    let (value, rest) = parse_boolean_expression(&mut calc, "3 m >= 300 cm) {", &mut reporter, &[TokenKind::RParen]);
    assert_eq!(value, Some(true));
    assert_eq!(rest, ") {");

    let (value, _) = parse_boolean_expression(&mut calc, "3 m", &mut reporter, &[]);
    assert_eq!(value, None);
    assert!(matches!(reporter.errors()[0], CalcError::ExpectedBoolean { .. }));
}

// ==================== Conversion suffix ====================

#[test]
fn test_conversion_suffix() {
    assert_evaluates("340 m/s [Km/h]", "1224 Km/h");
    assert_evaluates("100 degC [degF]", "212 degF");
    assert_evaluates("1 mi [SI]", "1609.344 m");
    assert_evaluates("2 Km [ft]", "6561.67979003 ft");
}

#[test]
fn test_conversion_errors() {
    assert!(matches!(eval("3 m [s]"), Err(CalcError::ConversionImpossible { .. })));
    assert!(matches!(eval("3 m [Km"), Err(CalcError::MissingCloser { .. })));
    assert!(matches!(eval("3 m [furlong]"), Err(CalcError::UnknownUnit { .. })));
    assert!(matches!(eval("true [m]"), Err(CalcError::InvalidOperand { .. })));
}

// ==================== Calls ====================

#[test]
fn test_native_functions() {
    assert_evaluates("Sqrt(16 m2)", "4 m");
    assert_evaluates("Abs(-3 s)", "3 s");
    assert_evaluates("Max(2 Km, 900 m)", "2 Km");
    assert_evaluates("Min(2 Km, 900 m, 1 mi)", "900 m");
    assert_evaluates("round(3.14159 m, 2)", "3.14 m");
}

#[test]
fn test_call_errors() {
    assert!(matches!(eval("Sqrt(1, 2)"), Err(CalcError::WrongArity { .. })));
    assert!(matches!(eval("Sqrt(1"), Err(CalcError::MissingCloser { .. })));
    assert!(matches!(eval("nowhere_to_be_found()"), Err(CalcError::MissingScript { .. })));
}

// ==================== Errors and remainders ====================

#[test]
fn test_missing_operand_leaves_nothing() {
    let mut calc = Calculator::default();
    let mut reporter = Reporter::new();
    let (value, rest) = parse_expression(&mut calc, "1 +", &mut reporter, &[]);
    assert_eq!(value, None);
    assert_eq!(rest, "");
    assert_eq!(reporter.error_count(), 1);
    assert!(matches!(reporter.errors()[0], CalcError::MissingOperand { .. }));
}

#[test]
fn test_errors() {
    assert!(matches!(eval("1 m + 1 s"), Err(CalcError::IncompatibleUnits { .. })));
    assert!(matches!(eval("\"a\" + \"b\""), Err(CalcError::InvalidOperands { .. })));
    assert!(matches!(eval("2 3"), Err(CalcError::MissingOperator { .. })));
    assert!(matches!(eval("(1 + 2"), Err(CalcError::MissingCloser { .. })));
    assert!(matches!(eval("undefined_name"), Err(CalcError::UnknownIdentifier { .. })));
    assert!(matches!(eval("   "), Err(CalcError::EmptyExpression)));
    assert!(matches!(eval("1 / 0 m"), Err(_)));
}

#[test]
fn test_expression_list() {
    let mut calc = Calculator::default();
    let mut reporter = Reporter::new();
    let (values, rest) = parse_expression_list(&mut calc, "1 m, \"two\", 3 > 2) tail", &mut reporter, &[TokenKind::RParen]);
    let values = values.unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values[1], Operand::String("two".into()));
    assert_eq!(values[2], Operand::Boolean(true));
    assert_eq!(rest, ") tail");
}

#[test]
fn test_physical_unit_and_identifier() {
    let calc = Calculator::default();
    let mut reporter = Reporter::new();
    let (unit, rest) = parse_physical_unit(&calc, "Kg*m/s^2 rest", &mut reporter);
    assert_eq!(unit.map(|u| u.to_string()), Some("Kg·m/s2".to_string()));
    assert_eq!(rest, " rest");

    let (name, rest) = parse_qualified_identifier("Lab.Consts.g = 9.81", &mut reporter);
    assert_eq!(name.as_deref(), Some("Lab.Consts.g"));
    assert_eq!(rest, " = 9.81");
    assert!(!reporter.has_errors());
}
