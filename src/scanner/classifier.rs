//! Pool classification configuration.

use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;
use anyhow::{Context, Result};

use crate::config::ClassifierSettings;

/// Maps hook contracts to coin types and holds the configured base
/// pairings (the "quote" currencies deciding which pair side is the
/// token).
pub struct Classifier {
    hooks: HashMap<Address, String>,
    base_pairings: HashSet<Address>,
}

impl Classifier {
    pub fn from_settings(settings: &ClassifierSettings) -> Result<Self> {
        let mut hooks = HashMap::with_capacity(settings.hooks.len());
        for (address, coin_type) in &settings.hooks {
            let parsed: Address = address
                .parse()
                .with_context(|| format!("Invalid hook address '{address}'"))?;
            hooks.insert(parsed, coin_type.clone());
        }

        let mut base_pairings = HashSet::with_capacity(settings.base_pairings.len());
        for address in &settings.base_pairings {
            let parsed: Address = address
                .parse()
                .with_context(|| format!("Invalid base pairing address '{address}'"))?;
            base_pairings.insert(parsed);
        }

        Ok(Self {
            hooks,
            base_pairings,
        })
    }

    pub fn coin_type(&self, hook: &Address) -> Option<&str> {
        self.hooks.get(hook).map(String::as_str)
    }

    pub fn is_tracked_hook(&self, hook: &Address) -> bool {
        self.hooks.contains_key(hook)
    }

    pub fn is_base_pairing(&self, address: &Address) -> bool {
        self.base_pairings.contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATOR_HOOK: &str = "0x1111111111111111111111111111111111111111";
    const CONTENT_HOOK: &str = "0x2222222222222222222222222222222222222222";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    fn classifier() -> Classifier {
        let settings = ClassifierSettings {
            hooks: HashMap::from([
                (CREATOR_HOOK.to_string(), "creator".to_string()),
                // Mixed-case input must parse the same.
                (CONTENT_HOOK.to_uppercase().replace("0X", "0x"), "content".to_string()),
            ]),
            base_pairings: vec![USDC.to_string()],
        };
        Classifier::from_settings(&settings).expect("valid settings")
    }

    #[test]
    fn hooks_resolve_to_coin_types() {
        let classifier = classifier();
        let creator: Address = CREATOR_HOOK.parse().expect("valid");
        let content: Address = CONTENT_HOOK.parse().expect("valid");
        assert_eq!(classifier.coin_type(&creator), Some("creator"));
        assert_eq!(classifier.coin_type(&content), Some("content"));
        assert!(classifier.is_tracked_hook(&creator));
    }

    #[test]
    fn unknown_hooks_are_not_tracked() {
        let classifier = classifier();
        let unknown: Address = "0xdead00000000000000000000000000000000dead"
            .parse()
            .expect("valid");
        assert_eq!(classifier.coin_type(&unknown), None);
        assert!(!classifier.is_tracked_hook(&unknown));
    }

    #[test]
    fn base_pairings_are_recognized() {
        let classifier = classifier();
        let usdc: Address = USDC.parse().expect("valid");
        assert!(classifier.is_base_pairing(&usdc));
        assert!(!classifier.is_base_pairing(&Address::ZERO));
    }

    #[test]
    fn malformed_addresses_fail_fast() {
        let settings = ClassifierSettings {
            hooks: HashMap::from([("not-an-address".to_string(), "creator".to_string())]),
            base_pairings: vec![],
        };
        assert!(Classifier::from_settings(&settings).is_err());
    }
}
