//! Lossless conversion between display currency strings and integer minor
//! units.
//!
//! Amounts are persisted as integers (value × 100); the display layer's
//! decimal strings never reach storage as floats. Parsing is strict: anything
//! non-numeric is a typed error, never a silent zero.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Failure to interpret a display string as a currency amount.
#[derive(Debug, Error)]
pub enum AmountError {
    #[error("Not a currency amount: '{0}'")]
    NotNumeric(String),

    #[error("Amount out of range: '{0}'")]
    OutOfRange(String),
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").unwrap())
}

/// Parse a display string (`"1952.14"`) into minor units (`195214`).
///
/// Excess fractional digits are truncated, matching the display layer's
/// two-decimal rendering. Pure integer arithmetic throughout.
pub fn to_minor_units(display: &str) -> Result<i64, AmountError> {
    let trimmed = display.trim();
    if !amount_re().is_match(trimmed) {
        return Err(AmountError::NotNumeric(display.to_string()));
    }

    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };

    let whole: i64 = whole
        .parse()
        .map_err(|_| AmountError::OutOfRange(display.to_string()))?;
    let cents = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac[..2].parse::<i64>().unwrap_or(0),
    };

    let minor = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(cents))
        .ok_or_else(|| AmountError::OutOfRange(display.to_string()))?;
    Ok(if negative { -minor } else { minor })
}

/// Render minor units as a fixed two-decimal display string
/// (`195214` → `"1952.14"`).
pub fn from_minor_units(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
