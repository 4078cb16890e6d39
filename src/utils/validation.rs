//! Input and price validation helpers.

use std::str::FromStr;

use alloy::primitives::Address;

use super::conversion::hex_encode;

// ============================================
// Price Validation Constants
// ============================================

/// Maximum reasonable price ratio between two tokens.
/// 1e12 allows extreme pairs while catching decimal errors.
pub const MAX_PRICE_RATIO: f64 = 1e12;

/// Minimum reasonable price ratio. Inverse of MAX_PRICE_RATIO.
pub const MIN_PRICE_RATIO: f64 = 1e-12;

/// Validate a price ratio is within reasonable bounds.
/// Returns Some(price) if valid, None if invalid.
#[inline]
pub fn validate_price_ratio(price: f64) -> Option<f64> {
    if price > 0.0 && price.is_finite() && price >= MIN_PRICE_RATIO && price <= MAX_PRICE_RATIO {
        Some(price)
    } else {
        None
    }
}

// ============================================
// Address Validation
// ============================================

/// Parse a wallet or token address (`0x` + 40 hex chars, any case) and
/// return its lowercase canonical form.
pub fn parse_wallet_address(input: &str) -> Option<String> {
    Address::from_str(input.trim())
        .ok()
        .map(|addr| hex_encode(addr.as_slice()))
}

// ============================================
// Pagination Clamping
// ============================================

/// Clamp a requested page size into [1, 100], falling back to `default`.
pub fn clamp_limit(limit: Option<u32>, default: i64) -> i64 {
    match limit {
        Some(value) => i64::from(value).clamp(1, 100),
        None => default,
    }
}

/// Clamp a requested page number to at least 1, defaulting to 1.
pub fn clamp_page(page: Option<u32>) -> i64 {
    match page {
        Some(value) => i64::from(value).max(1),
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_normalize_to_lowercase() {
        let parsed =
            parse_wallet_address("0xA0B86991C6218B36C1D19D4A2E9EB0CE3606EB48").expect("valid");
        assert_eq!(parsed, "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
    }

    #[test]
    fn malformed_addresses_are_rejected() {
        assert!(parse_wallet_address("0x123").is_none());
        assert!(parse_wallet_address("not an address").is_none());
        assert!(parse_wallet_address("").is_none());
    }

    #[test]
    fn limits_clamp_into_bounds() {
        assert_eq!(clamp_limit(None, 50), 50);
        assert_eq!(clamp_limit(Some(0), 50), 1);
        assert_eq!(clamp_limit(Some(100), 50), 100);
        assert_eq!(clamp_limit(Some(500), 50), 100);
    }

    #[test]
    fn pages_clamp_to_one() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page(Some(7)), 7);
    }

    #[test]
    fn price_ratio_bounds_are_inclusive() {
        assert_eq!(validate_price_ratio(1e-12), Some(1e-12));
        assert_eq!(validate_price_ratio(1e12), Some(1e12));
        assert_eq!(validate_price_ratio(0.0), None);
        assert_eq!(validate_price_ratio(1e13), None);
        assert_eq!(validate_price_ratio(f64::INFINITY), None);
    }
}
