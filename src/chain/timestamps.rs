//! Batched, memoized block-number -> timestamp lookups.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use moka::future::Cache;
use rustc_hash::FxHashMap;

use crate::chain::batch::run_batched;
use crate::chain::gateway::ChainGateway;
use crate::chain::retry::{with_retry, RetryPolicy};

/// At most this many block-header reads in flight at once.
const LOOKUP_BATCH_SIZE: usize = 10;

/// Pacing between lookup batches.
const LOOKUP_BATCH_DELAY: Duration = Duration::from_millis(200);

/// Resolves block numbers to header timestamps.
///
/// Duplicates in the input collapse to one lookup. Block timestamps are
/// immutable once mined, so memoizing them across scan cycles is safe;
/// the TTL only bounds memory.
pub struct BlockTimestamps {
    gateway: Arc<ChainGateway>,
    retry: RetryPolicy,
    cache: Cache<u64, u64>,
}

impl BlockTimestamps {
    pub fn new(gateway: Arc<ChainGateway>, retry: RetryPolicy) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Self {
            gateway,
            retry,
            cache,
        }
    }

    /// One entry per unique input block number.
    pub async fn resolve(&self, block_numbers: &[u64]) -> Result<FxHashMap<u64, u64>> {
        let mut unique: Vec<u64> = block_numbers.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut resolved = FxHashMap::default();
        let mut missing = Vec::new();
        for number in unique {
            match self.cache.get(&number).await {
                Some(timestamp) => {
                    resolved.insert(number, timestamp);
                }
                None => missing.push(number),
            }
        }

        let fetched = run_batched(missing, LOOKUP_BATCH_SIZE, LOOKUP_BATCH_DELAY, |number| {
            self.lookup(number)
        })
        .await;

        for (number, result) in fetched {
            let timestamp =
                result.with_context(|| format!("failed to resolve timestamp for block {number}"))?;
            self.cache.insert(number, timestamp).await;
            resolved.insert(number, timestamp);
        }

        Ok(resolved)
    }

    async fn lookup(&self, number: u64) -> (u64, Result<u64>) {
        let result = with_retry(&self.retry, || self.gateway.block_timestamp(number)).await;
        (number, result)
    }
}
