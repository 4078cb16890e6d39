//! Semantic currency resolution.

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;

use crate::chain::gateway::ChainGateway;
use crate::chain::retry::{with_retry, RetryPolicy};

/// A pool currency: the chain's native asset (zero address slot) or an
/// ERC-20 with lazily fetched metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum Currency {
    Native {
        chain_id: u64,
    },
    Fungible {
        chain_id: u64,
        address: Address,
        decimals: u8,
        symbol: String,
        name: String,
    },
}

impl Currency {
    pub fn address(&self) -> Address {
        match self {
            Currency::Native { .. } => Address::ZERO,
            Currency::Fungible { address, .. } => *address,
        }
    }

    pub fn decimals(&self) -> u8 {
        match self {
            Currency::Native { .. } => 18,
            Currency::Fungible { decimals, .. } => *decimals,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Currency::Native { .. } => "ETH",
            Currency::Fungible { symbol, .. } => symbol,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Currency::Native { .. } => "Ether",
            Currency::Fungible { name, .. } => name,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native { .. })
    }
}

/// Resolves an address to a semantic currency. No caching across calls;
/// the pool processor shares values within one pool by resolving both
/// sides concurrently.
pub struct CurrencyResolver {
    gateway: Arc<ChainGateway>,
    retry: RetryPolicy,
}

impl CurrencyResolver {
    pub fn new(gateway: Arc<ChainGateway>, retry: RetryPolicy) -> Self {
        Self { gateway, retry }
    }

    pub async fn resolve(&self, address: Address) -> Result<Currency> {
        if address == Address::ZERO {
            return Ok(Currency::Native {
                chain_id: self.gateway.chain_id(),
            });
        }

        let meta = with_retry(&self.retry, || self.gateway.fungible_meta(address)).await?;

        Ok(Currency::Fungible {
            chain_id: self.gateway.chain_id(),
            address,
            decimals: meta.decimals,
            symbol: meta.symbol,
            name: meta.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_currency_defaults() {
        let native = Currency::Native { chain_id: 8453 };
        assert_eq!(native.address(), Address::ZERO);
        assert_eq!(native.decimals(), 18);
        assert_eq!(native.symbol(), "ETH");
        assert!(native.is_native());
    }

    #[test]
    fn fungible_exposes_metadata() {
        let addr = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
            .parse()
            .expect("valid");
        let usdc = Currency::Fungible {
            chain_id: 8453,
            address: addr,
            decimals: 6,
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
        };
        assert_eq!(usdc.address(), addr);
        assert_eq!(usdc.decimals(), 6);
        assert!(!usdc.is_native());
    }
}
