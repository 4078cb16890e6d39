//! Uniswap V4 pool ID utilities.

use alloy::primitives::{keccak256, Address};
use alloy::sol_types::SolValue;

/// Compute the Uniswap V4 pool ID from pool parameters.
///
/// The pool ID is computed as:
/// ```text
/// keccak256(abi.encode(currency0, currency1, fee, tickSpacing, hooks))
/// ```
///
/// Where currency0 and currency1 are sorted by address (lower address
/// first). The native currency (zero address) therefore always lands in
/// the currency0 slot when paired with any non-zero address.
///
/// # Returns
/// The 32-byte pool ID as a hex string (lowercase, with 0x prefix)
pub fn compute_pool_id(
    currency_a: Address,
    currency_b: Address,
    fee: u32,
    tick_spacing: i32,
    hooks: Address,
) -> String {
    // Sort currencies: lower address is currency0
    // This matches Uniswap's sortsBefore logic
    let (currency0, currency1) = if currency_a < currency_b {
        (currency_a, currency_b)
    } else {
        (currency_b, currency_a)
    };

    // ABI encode the parameters: each word is 32 bytes, so the wider
    // uint32/int32 encodings are bit-identical to uint24/int24 here.
    let encoded = (currency0, currency1, fee, tick_spacing, hooks).abi_encode();

    let hash = keccak256(&encoded);

    format!("{hash:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(s: &str) -> Address {
        Address::from_str(s).expect("valid address")
    }

    #[test]
    fn pool_id_is_order_independent() {
        let usdc = addr("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let id1 = compute_pool_id(Address::ZERO, usdc, 3000, 60, Address::ZERO);
        let id2 = compute_pool_id(usdc, Address::ZERO, 3000, 60, Address::ZERO);
        assert_eq!(id1, id2);
    }

    #[test]
    fn pool_id_is_lowercase_hex() {
        let usdc = addr("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let id = compute_pool_id(Address::ZERO, usdc, 3000, 60, Address::ZERO);
        assert!(id.starts_with("0x"));
        assert_eq!(id.len(), 66);
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn different_hooks_produce_different_ids() {
        let usdc = addr("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let hook = addr("0x1234567890abcdef1234567890abcdef12345678");
        let id_no_hooks = compute_pool_id(Address::ZERO, usdc, 3000, 60, Address::ZERO);
        let id_with_hooks = compute_pool_id(Address::ZERO, usdc, 3000, 60, hook);
        assert_ne!(id_no_hooks, id_with_hooks);
    }

    #[test]
    fn different_fee_tiers_produce_different_ids() {
        let usdc = addr("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        let id_3000 = compute_pool_id(Address::ZERO, usdc, 3000, 60, Address::ZERO);
        let id_500 = compute_pool_id(Address::ZERO, usdc, 500, 10, Address::ZERO);
        assert_ne!(id_3000, id_500);
    }
}
