//! Numeric and date/time literal decoding
//!
//! Decimal literals use `E`/`e` for a base-10 exponent. Hexadecimal literals
//! start with `0x` and use `H`/`h` for a base-16 exponent written in hex
//! digits, e.g. `0x1.8H2` is `1.5 * 16^2 = 384`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::diagnostics::CalcError;

use super::Span;

/// Decode a numeric literal (with optional leading sign)
pub fn parse_number(text: &str, span: Span) -> Result<f64, CalcError> {
    let invalid = || CalcError::InvalidNumber {
        text: text.to_string(),
        span: span.into(),
    };

    let (negative, body) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let value = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        parse_hex(hex).ok_or_else(invalid)?
    } else {
        body.parse::<f64>().map_err(|_| invalid())?
    };

    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(if negative { -value } else { value })
}

fn parse_hex(text: &str) -> Option<f64> {
    let (mantissa, exponent) = match text.find(['h', 'H']) {
        Some(i) => (&text[..i], Some(&text[i + 1..])),
        None => (text, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() {
        return None;
    }

    let mut value = 0.0f64;
    for c in int_part.chars() {
        value = value * 16.0 + f64::from(c.to_digit(16)?);
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += f64::from(c.to_digit(16)?) * scale;
        scale /= 16.0;
    }

    if let Some(exp) = exponent {
        let (negative, digits) = match exp.as_bytes().first() {
            Some(b'-') => (true, &exp[1..]),
            Some(b'+') => (false, &exp[1..]),
            _ => (false, exp),
        };
        let power = i32::from_str_radix(digits, 16).ok()?;
        let power = if negative { -power } else { power };
        value *= 16f64.powi(power);
    }
    Some(value)
}

/// Decode a `#...#` date/time literal
pub fn parse_datetime(text: &str, span: Span) -> Result<NaiveDateTime, CalcError> {
    let inner = text.trim_matches('#').trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];

    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(inner, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(inner, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| CalcError::InvalidDateTime {
            text: text.to_string(),
            span: span.into(),
        })
}
