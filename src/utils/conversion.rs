//! Hex encoding and numeric formatting utilities.

use alloy::primitives::hex;
use bigdecimal::BigDecimal;

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================
// Decimal Helpers
// ============================================

/// 10^exp as a BigDecimal, built by repeated multiplication so the
/// function cannot fail for any exponent.
pub fn big_pow10(exp: u32) -> BigDecimal {
    let ten = BigDecimal::from(10u32);
    let mut out = BigDecimal::from(1u32);
    for _ in 0..exp {
        out *= &ten;
    }
    out
}

// ============================================
// Price Formatting
// ============================================

/// Round a value to the given number of significant digits.
///
/// Returns 0.0 for zero and non-finite inputs.
pub fn round_significant(value: f64, digits: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return 0.0;
    }
    let magnitude = value.abs().log10().floor();
    let scale = 10f64.powf(digits as f64 - 1.0 - magnitude);
    (value * scale).round() / scale
}

/// Render a price for API payloads: 6 significant digits, 6 decimal
/// places (`0.0005` becomes `"0.000500"`).
pub fn format_price(value: f64) -> String {
    format!("{:.6}", round_significant(value, 6))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encode_prefixes_and_lowercases() {
        assert_eq!(hex_encode(&[0xAB, 0xCD]), "0xabcd");
        assert_eq!(hex_encode(&[]), "0x");
    }

    #[test]
    fn big_pow10_matches_expected_values() {
        assert_eq!(big_pow10(0), BigDecimal::from(1u32));
        assert_eq!(big_pow10(3), BigDecimal::from(1000u32));
    }

    #[test]
    fn round_significant_keeps_six_digits() {
        assert_eq!(round_significant(123.456789, 6), 123.457);
        assert_eq!(round_significant(0.000123456789, 6), 0.000123457);
        assert_eq!(round_significant(0.0, 6), 0.0);
        assert_eq!(round_significant(f64::NAN, 6), 0.0);
    }

    #[test]
    fn format_price_renders_six_decimals() {
        assert_eq!(format_price(0.0005), "0.000500");
        assert_eq!(format_price(1.0), "1.000000");
        assert_eq!(format_price(123.456789), "123.457000");
    }
}
