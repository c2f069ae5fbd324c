//! Size literal parsing and comparison
//!
//! A size literal is a decimal quantity followed by a unit suffix. Binary
//! units (`K`, `Ki`, `KiB`, ...) are 1024-based, which matches how Multipass
//! itself interprets a bare `G`. SI units (`KB`, `MB`, ...) are 1000-based.
//!
//! ```text
//!   " 5.0 GiB "  ──strip──►  "5.0GiB"  ──split──►  ("5.0", "GiB")
//!                                                     │       │
//!                                          drop ".0"  ▼       ▼  unit
//!                                                    "5"  ×  1024³  =  5368709120
//! ```

use std::fmt;

/// Fraction digits beyond this cannot change the rounded byte count for any
/// supported unit, so they are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

/// A recognized unit suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Kilo,
    Kibi,
    Mega,
    Mebi,
    Giga,
    Gibi,
    Tera,
    Tebi,
}

impl Unit {
    /// Parse a unit suffix, ignoring case. Returns None for anything unknown,
    /// including the empty suffix.
    pub fn parse(suffix: &str) -> Option<Self> {
        let unit = match suffix.to_ascii_uppercase().as_str() {
            "B" => Unit::Bytes,
            "K" | "KI" | "KIB" => Unit::Kibi,
            "KB" => Unit::Kilo,
            "M" | "MI" | "MIB" => Unit::Mebi,
            "MB" => Unit::Mega,
            "G" | "GI" | "GIB" => Unit::Gibi,
            "GB" => Unit::Giga,
            "T" | "TI" | "TIB" => Unit::Tebi,
            "TB" => Unit::Tera,
            _ => return None,
        };
        Some(unit)
    }

    /// Number of bytes in one of this unit
    pub fn multiplier(self) -> u64 {
        match self {
            Unit::Bytes => 1,
            Unit::Kilo => 1_000,
            Unit::Kibi => 1u64 << 10,
            Unit::Mega => 1_000_000,
            Unit::Mebi => 1u64 << 20,
            Unit::Giga => 1_000_000_000,
            Unit::Gibi => 1u64 << 30,
            Unit::Tera => 1_000_000_000_000,
            Unit::Tebi => 1u64 << 40,
        }
    }
}

/// Error type for malformed size literals (InvalidSizeFormat)
///
/// Every variant carries the literal exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    /// No numeric quantity before the unit
    MissingQuantity(String),
    /// The quantity is not a plain decimal number
    InvalidQuantity(String),
    /// The unit suffix is missing or not recognized
    UnknownUnit { input: String, unit: String },
    /// The byte count does not fit in 64 bits
    Overflow(String),
}

impl SizeError {
    /// The offending literal
    pub fn input(&self) -> &str {
        match self {
            SizeError::MissingQuantity(input)
            | SizeError::InvalidQuantity(input)
            | SizeError::Overflow(input) => input,
            SizeError::UnknownUnit { input, .. } => input,
        }
    }
}

impl fmt::Display for SizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeError::MissingQuantity(input) => {
                write!(f, "invalid size format {:?}: missing numeric quantity", input)
            }
            SizeError::InvalidQuantity(input) => {
                write!(f, "invalid size format {:?}: quantity is not a decimal number", input)
            }
            SizeError::UnknownUnit { input, unit } if unit.is_empty() => {
                write!(f, "invalid size format {:?}: missing unit suffix", input)
            }
            SizeError::UnknownUnit { input, unit } => {
                write!(f, "invalid size format {:?}: unknown unit {:?}", input, unit)
            }
            SizeError::Overflow(input) => {
                write!(f, "invalid size format {:?}: size does not fit in 64 bits", input)
            }
        }
    }
}

impl std::error::Error for SizeError {}

/// Convert a size literal into a byte count
///
/// Fractional byte counts round to the nearest byte, halves rounding up.
pub fn to_canonical_bytes(input: &str) -> Result<u64, SizeError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let literal = compact.trim_matches(|c: char| c == '"' || c == '\'');

    let (number, suffix) = split_quantity(literal);
    if number.is_empty() {
        return Err(SizeError::MissingQuantity(input.to_string()));
    }

    let unit = Unit::parse(suffix).ok_or_else(|| SizeError::UnknownUnit {
        input: input.to_string(),
        unit: suffix.to_string(),
    })?;

    quantity_to_bytes(drop_zero_fraction(number), unit.multiplier(), input)
}

/// Compare two size literals by magnitude
///
/// `"1024MiB"` and `"1GiB"` are equal; so are `"5GiB"` and `"5.0 GiB"`.
pub fn equal_sizes(a: &str, b: &str) -> Result<bool, SizeError> {
    Ok(to_canonical_bytes(a)? == to_canonical_bytes(b)?)
}

/// Remove whitespace and a redundant zero fraction from a size literal,
/// keeping the unit spelling. `multipass get` reports `"5.0GiB"`; this gives
/// back `"5GiB"`.
pub fn strip_zero_decimal(input: &str) -> String {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let (number, suffix) = split_quantity(&compact);
    format!("{}{}", drop_zero_fraction(number), suffix)
}

/// Split at the last digit or dot: everything up to it is the quantity,
/// everything after is the unit.
fn split_quantity(literal: &str) -> (&str, &str) {
    match literal.rfind(|c: char| c.is_ascii_digit() || c == '.') {
        Some(idx) => literal.split_at(idx + 1),
        None => ("", literal),
    }
}

/// "5.0" -> "5", "5.00" -> "5"; anything else unchanged
fn drop_zero_fraction(number: &str) -> &str {
    match number.split_once('.') {
        Some((whole, fraction)) if !whole.is_empty() && fraction.bytes().all(|b| b == b'0') => {
            whole
        }
        _ => number,
    }
}

fn quantity_to_bytes(number: &str, multiplier: u64, input: &str) -> Result<u64, SizeError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !is_digits(whole) || !is_digits(fraction) {
        return Err(SizeError::InvalidQuantity(input.to_string()));
    }

    let overflow = || SizeError::Overflow(input.to_string());
    let multiplier = u128::from(multiplier);

    // Digits are validated above, so a parse failure can only be overflow.
    let whole: u128 = whole.parse().map_err(|_| overflow())?;
    let whole_bytes = whole.checked_mul(multiplier).ok_or_else(overflow)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    let fraction_bytes = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(fraction.len() as u32);
        let value: u128 = fraction.parse().map_err(|_| overflow())?;
        (value * multiplier + scale / 2) / scale
    };

    let total = whole_bytes.checked_add(fraction_bytes).ok_or_else(overflow)?;
    u64::try_from(total).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_binary_units() {
        assert_eq!(to_canonical_bytes("1KiB").unwrap(), 1024);
        assert_eq!(to_canonical_bytes("512MiB").unwrap(), 512 * 1024 * 1024);
        assert_eq!(to_canonical_bytes("5GiB").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("1TiB").unwrap(), 1024 * GIB);
    }

    #[test]
    fn test_bare_and_short_suffixes_are_binary() {
        assert_eq!(to_canonical_bytes("5G").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("5Gi").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("128M").unwrap(), 128 * 1024 * 1024);
    }

    #[test]
    fn test_si_units() {
        assert_eq!(to_canonical_bytes("1KB").unwrap(), 1_000);
        assert_eq!(to_canonical_bytes("2GB").unwrap(), 2_000_000_000);
        assert_eq!(to_canonical_bytes("1TB").unwrap(), 1_000_000_000_000);
    }

    #[test]
    fn test_plain_bytes() {
        assert_eq!(to_canonical_bytes("4096B").unwrap(), 4096);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(to_canonical_bytes("5gib").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("5GIB").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("5gb").unwrap(), 5_000_000_000);
    }

    #[test]
    fn test_whitespace_and_quotes() {
        assert_eq!(to_canonical_bytes("5 GiB").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("  5 G i B ").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("\"5GiB\"").unwrap(), 5 * GIB);
        assert_eq!(to_canonical_bytes("'5GiB'").unwrap(), 5 * GIB);
    }

    #[test]
    fn test_fractions() {
        assert_eq!(to_canonical_bytes("1.5KiB").unwrap(), 1536);
        assert_eq!(to_canonical_bytes("0.5GiB").unwrap(), GIB / 2);
        // 0.5 bytes rounds up
        assert_eq!(to_canonical_bytes("0.5B").unwrap(), 1);
        assert_eq!(to_canonical_bytes("0.4B").unwrap(), 0);
    }

    #[test]
    fn test_equivalent_spellings_are_equal() {
        for literal in ["5GiB", "5 GiB", "5.0GiB", "5.00 GiB", "5120MiB", "5G"] {
            assert!(equal_sizes("5GiB", literal).unwrap(), "{} should equal 5GiB", literal);
        }
    }

    #[test]
    fn test_cross_unit_equality() {
        assert!(equal_sizes("1024MiB", "1GiB").unwrap());
        assert!(equal_sizes("1000MB", "1GB").unwrap());
        assert!(!equal_sizes("1GB", "1GiB").unwrap());
    }

    #[test]
    fn test_different_sizes_are_not_equal() {
        assert!(!equal_sizes("5GiB", "6GiB").unwrap());
    }

    #[test]
    fn test_unknown_unit() {
        let err = to_canonical_bytes("5XB").unwrap_err();
        assert_eq!(
            err,
            SizeError::UnknownUnit {
                input: "5XB".to_string(),
                unit: "XB".to_string()
            }
        );
        assert!(err.to_string().contains("5XB"));
    }

    #[test]
    fn test_missing_unit() {
        let err = to_canonical_bytes("512").unwrap_err();
        assert!(matches!(err, SizeError::UnknownUnit { ref unit, .. } if unit.is_empty()));
        assert!(err.to_string().contains("missing unit"));
    }

    #[test]
    fn test_missing_quantity() {
        assert_eq!(
            to_canonical_bytes("GiB").unwrap_err(),
            SizeError::MissingQuantity("GiB".to_string())
        );
        assert!(matches!(to_canonical_bytes(""), Err(SizeError::MissingQuantity(_))));
    }

    #[test]
    fn test_invalid_quantity() {
        assert!(matches!(to_canonical_bytes("1.2.3GiB"), Err(SizeError::InvalidQuantity(_))));
        assert!(matches!(to_canonical_bytes(".5GiB"), Err(SizeError::InvalidQuantity(_))));
        assert!(matches!(to_canonical_bytes("-5GiB"), Err(SizeError::InvalidQuantity(_))));
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            to_canonical_bytes("99999999999TiB"),
            Err(SizeError::Overflow(_))
        ));
    }

    #[test]
    fn test_error_propagates_through_equal_sizes() {
        assert!(equal_sizes("5XB", "5GiB").is_err());
        assert!(equal_sizes("5GiB", "5XB").is_err());
    }

    #[test]
    fn test_error_keeps_original_input() {
        let err = to_canonical_bytes(" 5 XB ").unwrap_err();
        assert_eq!(err.input(), " 5 XB ");
    }

    #[test]
    fn test_strip_zero_decimal() {
        assert_eq!(strip_zero_decimal("5.0GiB"), "5GiB");
        assert_eq!(strip_zero_decimal("5.0 GiB"), "5GiB");
        assert_eq!(strip_zero_decimal("1.5GiB"), "1.5GiB");
        assert_eq!(strip_zero_decimal("512MiB"), "512MiB");
        assert_eq!(strip_zero_decimal("GiB"), "GiB");
    }
}
