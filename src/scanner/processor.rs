//! Pool state loading, token classification and pricing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use rustc_hash::FxHashMap;

use crate::chain::{run_batched, with_retry, ChainGateway, Currency, CurrencyResolver, RetryPolicy};
use crate::scanner::classifier::Classifier;
use crate::scanner::types::{AppType, PoolKey, TokenRecord};
use crate::utils::{compute_pool_id, format_price, hex_encode, invert_price, sqrt_price_x96_to_price};

/// At most this many pools processed concurrently.
const POOL_BATCH_SIZE: usize = 3;

/// Pacing between pool batches.
const POOL_BATCH_DELAY: Duration = Duration::from_millis(300);

/// Which pair side carries the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSide {
    Currency0,
    Currency1,
}

/// Loads a pool's on-chain state, classifies its token and computes the
/// denominated price.
pub struct PoolProcessor {
    gateway: Arc<ChainGateway>,
    resolver: CurrencyResolver,
    classifier: Arc<Classifier>,
    retry: RetryPolicy,
}

impl PoolProcessor {
    pub fn new(gateway: Arc<ChainGateway>, classifier: Arc<Classifier>, retry: RetryPolicy) -> Self {
        let resolver = CurrencyResolver::new(gateway.clone(), retry.clone());
        Self {
            gateway,
            resolver,
            classifier,
            retry,
        }
    }

    /// Process pool keys in bounded batches. A pool failing any step is
    /// logged and dropped; siblings are unaffected.
    pub async fn process(
        &self,
        keys: Vec<PoolKey>,
        timestamps: &FxHashMap<u64, u64>,
    ) -> Vec<TokenRecord> {
        run_batched(keys, POOL_BATCH_SIZE, POOL_BATCH_DELAY, |key| {
            self.process_one(key, timestamps)
        })
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn process_one(
        &self,
        key: PoolKey,
        timestamps: &FxHashMap<u64, u64>,
    ) -> Option<TokenRecord> {
        match self.build_record(&key, timestamps).await {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(
                    "Dropping pool {}/{} (hook {}): {err:#}",
                    key.currency0, key.currency1, key.hooks
                );
                None
            }
        }
    }

    async fn build_record(
        &self,
        key: &PoolKey,
        timestamps: &FxHashMap<u64, u64>,
    ) -> Result<TokenRecord> {
        let (currency0, currency1) = tokio::try_join!(
            self.resolver.resolve(key.currency0),
            self.resolver.resolve(key.currency1),
        )?;

        let pool_id = compute_pool_id(
            key.currency0,
            key.currency1,
            key.fee,
            key.tick_spacing,
            key.hooks,
        );

        let state = with_retry(&self.retry, || self.gateway.pool_state(&pool_id)).await?;

        // The scanner pre-filters on tracked hooks; a miss here is a bug.
        let coin_type = self
            .classifier
            .coin_type(&key.hooks)
            .context("hook has no configured coin type")?
            .to_string();

        let sqrt_price_x96 = state.sqrt_price_x96.to_string();
        let price_for_currency1 = sqrt_price_x96_to_price(
            &sqrt_price_x96,
            currency0.decimals(),
            currency1.decimals(),
        )
        .context("sqrtPriceX96 out of range")?;

        let (app_type, token_side, human_price) = classify(
            self.classifier.is_base_pairing(&currency0.address()),
            self.classifier.is_base_pairing(&currency1.address()),
            price_for_currency1,
        )?;

        let token: &Currency = match token_side {
            TokenSide::Currency0 => &currency0,
            TokenSide::Currency1 => &currency1,
        };

        let discovery_timestamp = timestamps
            .get(&key.discovery_block)
            .copied()
            .with_context(|| format!("no timestamp for block {}", key.discovery_block))?;

        Ok(TokenRecord {
            pool_id,
            app_type,
            coin_type,
            token_address: hex_encode(token.address().as_slice()),
            token_name: token.name().to_string(),
            token_symbol: token.symbol().to_string(),
            token_decimals: token.decimals(),
            current_tick: state.tick,
            sqrt_price_x96,
            human_price: format_price(human_price),
            discovery_block: key.discovery_block,
            discovery_timestamp,
        })
    }
}

/// Pick the token side and its denominated price.
///
/// `price_for_currency1` is what one unit of the currency1 side is worth
/// in currency0; the reciprocal prices the currency0 side. Pools with a
/// base pairing on either side are `Tba` and the token is the non-base
/// side; when both sides are bases, currency1 is treated as the token.
fn classify(
    base0: bool,
    base1: bool,
    price_for_currency1: f64,
) -> Result<(AppType, TokenSide, f64)> {
    if base0 {
        // Covers the both-bases tie as well: currency1 is the token.
        return Ok((AppType::Tba, TokenSide::Currency1, price_for_currency1));
    }
    if base1 {
        let price = invert_price(price_for_currency1).context("price inversion out of range")?;
        return Ok((AppType::Tba, TokenSide::Currency0, price));
    }
    let price = invert_price(price_for_currency1).context("price inversion out of range")?;
    Ok((AppType::Zora, TokenSide::Currency0, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_on_currency0_prices_currency1() {
        let (app_type, side, price) = classify(true, false, 0.0005).expect("valid");
        assert_eq!(app_type, AppType::Tba);
        assert_eq!(side, TokenSide::Currency1);
        assert_eq!(format_price(price), "0.000500");
    }

    #[test]
    fn base_on_currency1_prices_currency0() {
        let (app_type, side, price) = classify(false, true, 0.0005).expect("valid");
        assert_eq!(app_type, AppType::Tba);
        assert_eq!(side, TokenSide::Currency0);
        assert!((price - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn no_base_yields_primary_partition() {
        let (app_type, side, _) = classify(false, false, 2.0).expect("valid");
        assert_eq!(app_type, AppType::Zora);
        assert_eq!(side, TokenSide::Currency0);
    }

    #[test]
    fn both_bases_tie_picks_currency1() {
        let (app_type, side, price) = classify(true, true, 1.0).expect("valid");
        assert_eq!(app_type, AppType::Tba);
        assert_eq!(side, TokenSide::Currency1);
        assert_eq!(price, 1.0);
    }

    #[test]
    fn out_of_range_inversion_is_an_error() {
        // 1e-13 inverts to 1e13, beyond the validated ratio bounds.
        assert!(classify(false, true, 1e-13).is_err());
    }
}
