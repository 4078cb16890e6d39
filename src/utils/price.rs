//! Price conversion utilities for Uniswap V4 pools.
//!
//! Converts sqrtPriceX96 values to decimal-adjusted prices.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::Sign;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

use super::conversion::big_pow10;
use super::validation::validate_price_ratio;

/// Q96 = 2^96 (exact)
static Q96: Lazy<BigDecimal> = Lazy::new(|| {
    BigDecimal::from_str("79228162514264337593543950336").expect("Q96 literal parses")
});

/// Convert a sqrtPriceX96 string to the pool's adjusted price with full
/// precision.
///
/// The string form preserves the full U256 value. The result is
/// `(sqrtPriceX96 / 2^96)^2 * 10^(decimals0 - decimals1)`, validated
/// against the reasonable-ratio bounds.
///
/// Returns `None` for zero, out-of-range or malformed inputs.
pub fn sqrt_price_x96_to_price(
    sqrt_price_x96: &str,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Option<f64> {
    if token0_decimals > 24 || token1_decimals > 24 {
        return None;
    }

    let sqrt_price = BigDecimal::from_str(sqrt_price_x96).ok()?;
    if sqrt_price.sign() == Sign::NoSign {
        return None;
    }

    // raw_price = (sqrtPriceX96 / Q96)^2
    let normalized = &sqrt_price / &*Q96;
    let raw_price = &normalized * &normalized;

    // decimal adjustment: 10^(decimals0 - decimals1)
    let decimal_diff = token0_decimals as i32 - token1_decimals as i32;
    let adjusted = if decimal_diff >= 0 {
        raw_price * big_pow10(decimal_diff as u32)
    } else {
        raw_price / big_pow10((-decimal_diff) as u32)
    };

    let adjusted_f64 = adjusted.to_f64()?;
    validate_price_ratio(adjusted_f64)
}

/// Price of the opposite pool side, validated against the same bounds.
pub fn invert_price(price: f64) -> Option<f64> {
    if price > 0.0 && price.is_finite() {
        validate_price_ratio(1.0 / price)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2^96 as a decimal string.
    const Q96_STR: &str = "79228162514264337593543950336";

    #[test]
    fn unit_sqrt_price_gives_unit_price() {
        let price = sqrt_price_x96_to_price(Q96_STR, 18, 18).expect("valid");
        assert!((price - 1.0).abs() < 1e-12);
    }

    #[test]
    fn decimal_difference_is_applied() {
        // Equal raw price but token0 has 6 decimals, token1 has 18:
        // adjustment is 10^-12.
        let price = sqrt_price_x96_to_price(Q96_STR, 6, 18).expect("valid");
        assert!((price - 1e-12).abs() < 1e-24);
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert_eq!(sqrt_price_x96_to_price("0", 18, 18), None);
        assert_eq!(sqrt_price_x96_to_price("not a number", 18, 18), None);
        assert_eq!(sqrt_price_x96_to_price(Q96_STR, 25, 18), None);
    }

    #[test]
    fn inversion_round_trips() {
        let price = 0.0005;
        let inverted = invert_price(price).expect("valid");
        assert!((inverted - 2000.0).abs() < 1e-9);
        assert_eq!(invert_price(0.0), None);
        assert_eq!(invert_price(f64::NAN), None);
    }
}
