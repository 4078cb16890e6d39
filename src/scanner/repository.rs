//! Write-through token partitions.
//!
//! Records merge into their partition address-keyed with newest-wins
//! semantics; both partition blobs are persisted in one atomic KV batch.
//! Every newly discovered address is announced on the event bus.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::bus::{BusEvent, EventBus};
use crate::engines::launchpad::LaunchpadToken;
use crate::kv::KvClient;
use crate::scanner::types::{AppType, PartitionMeta, TokenPartition, TokenRecord};

/// Per-store summary returned to the scanner.
#[derive(Debug, Clone, Default)]
pub struct StoreOutcome {
    pub added: usize,
    pub zora_added: usize,
    pub tba_added: usize,
}

/// Write-through cache of classified tokens, partitioned by app type.
pub struct TokenRepository {
    kv: Arc<KvClient>,
    bus: Arc<EventBus>,
    ttl_secs: u64,
    network_id: u64,
}

impl TokenRepository {
    pub fn new(kv: Arc<KvClient>, bus: Arc<EventBus>, ttl_secs: u64, network_id: u64) -> Self {
        Self {
            kv,
            bus,
            ttl_secs,
            network_id,
        }
    }

    /// Merge `records` into their partitions and persist both blobs
    /// atomically. Newly added addresses publish `new-token-created`.
    pub async fn store(&self, records: Vec<TokenRecord>) -> Result<StoreOutcome> {
        let mut incoming: HashMap<AppType, Vec<TokenRecord>> = HashMap::new();
        for record in records {
            incoming.entry(record.app_type).or_default().push(record);
        }

        let mut outcome = StoreOutcome::default();
        let mut blobs: Vec<(String, TokenPartition)> = Vec::with_capacity(AppType::ALL.len());
        let mut announcements: Vec<TokenRecord> = Vec::new();

        for app_type in AppType::ALL {
            let new_records = incoming.remove(&app_type).unwrap_or_default();
            let existing = self
                .kv
                .get_json::<TokenPartition>(app_type.cache_key())
                .await?
                .map(|partition| partition.records)
                .unwrap_or_default();

            let (merged, added) = merge_records(existing, &new_records);
            match app_type {
                AppType::Zora => outcome.zora_added = added.len(),
                AppType::Tba => outcome.tba_added = added.len(),
            }
            outcome.added += added.len();
            announcements.extend(added);

            let meta = recompute_meta(&merged);
            blobs.push((
                app_type.cache_key().to_string(),
                TokenPartition {
                    name: app_type.as_str().to_string(),
                    records: merged,
                    meta,
                },
            ));
        }

        self.kv.set_json_many(&blobs, self.ttl_secs).await?;

        if outcome.added > 0 {
            info!(
                "Stored {} new tokens ({} ZORA, {} TBA)",
                outcome.added, outcome.zora_added, outcome.tba_added
            );
        }

        for record in announcements {
            let token = discovery_announcement(&record, self.network_id);
            let payload = serde_json::to_value(&token)?;
            self.bus
                .emit(BusEvent::new("new-token-created", &token.address, payload))
                .await;
        }

        Ok(outcome)
    }

    /// Every partition currently present in the cache.
    pub async fn all(&self) -> Result<Vec<TokenPartition>> {
        let mut partitions = Vec::with_capacity(AppType::ALL.len());
        for app_type in AppType::ALL {
            if let Some(partition) = self.partition(app_type).await? {
                partitions.push(partition);
            }
        }
        Ok(partitions)
    }

    pub async fn partition(&self, app_type: AppType) -> Result<Option<TokenPartition>> {
        self.kv.get_json(app_type.cache_key()).await
    }

    /// Partition metadata keyed by partition name.
    pub async fn metadata(&self) -> Result<HashMap<String, PartitionMeta>> {
        let mut meta = HashMap::new();
        for partition in self.all().await? {
            meta.insert(partition.name.clone(), partition.meta);
        }
        Ok(meta)
    }
}

/// Address-keyed newest-wins merge preserving first-seen order.
/// Returns the merged list and the records whose address was new.
fn merge_records(
    existing: Vec<TokenRecord>,
    incoming: &[TokenRecord],
) -> (Vec<TokenRecord>, Vec<TokenRecord>) {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, record)| (record.token_address.clone(), i))
        .collect();

    let mut added = Vec::new();
    for record in incoming {
        match index.get(&record.token_address) {
            Some(&slot) => merged[slot] = record.clone(),
            None => {
                index.insert(record.token_address.clone(), merged.len());
                merged.push(record.clone());
                added.push(record.clone());
            }
        }
    }

    (merged, added)
}

fn recompute_meta(records: &[TokenRecord]) -> PartitionMeta {
    let mut by_coin_type: HashMap<String, usize> = HashMap::new();
    for record in records {
        *by_coin_type.entry(record.coin_type.clone()).or_default() += 1;
    }
    PartitionMeta {
        last_updated_at: Utc::now(),
        total_tokens: records.len(),
        by_coin_type,
    }
}

/// Normalized feed-shaped payload for a scanner-discovered token.
fn discovery_announcement(record: &TokenRecord, network_id: u64) -> LaunchpadToken {
    LaunchpadToken {
        address: record.token_address.clone(),
        name: record.token_name.clone(),
        symbol: record.token_symbol.clone(),
        network: "base".to_string(),
        protocol: "uniswap-v4".to_string(),
        network_id: network_id as i64,
        created_at: record.discovery_timestamp as i64,
        price_usd: None,
        market_cap: None,
        volume24: None,
        holders: None,
        image_url: None,
        graduation_percent: None,
        launchpad_protocol: None,
        timestamp: Utc::now().timestamp_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, coin_type: &str, price: &str) -> TokenRecord {
        TokenRecord {
            pool_id: format!("0x{:0>64}", "1"),
            app_type: AppType::Tba,
            coin_type: coin_type.to_string(),
            token_address: address.to_string(),
            token_name: "Foo".to_string(),
            token_symbol: "FOO".to_string(),
            token_decimals: 18,
            current_tick: 0,
            sqrt_price_x96: "0".to_string(),
            human_price: price.to_string(),
            discovery_block: 1,
            discovery_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn merge_is_newest_wins_by_address() {
        let existing = vec![record("0xa", "creator", "1.000000")];
        let incoming = vec![record("0xa", "creator", "2.000000"), record("0xb", "content", "3.000000")];
        let (merged, added) = merge_records(existing, &incoming);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].token_address, "0xa");
        assert_eq!(merged[0].human_price, "2.000000");
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].token_address, "0xb");
    }

    #[test]
    fn re_storing_same_records_adds_nothing() {
        let incoming = vec![record("0xa", "creator", "1.000000")];
        let (merged, added) = merge_records(vec![], &incoming);
        assert_eq!(added.len(), 1);

        let (merged2, added2) = merge_records(merged, &incoming);
        assert_eq!(merged2.len(), 1);
        assert!(added2.is_empty());
    }

    #[test]
    fn meta_counts_by_coin_type() {
        let records = vec![
            record("0xa", "creator", "1.000000"),
            record("0xb", "creator", "1.000000"),
            record("0xc", "content", "1.000000"),
        ];
        let meta = recompute_meta(&records);
        assert_eq!(meta.total_tokens, 3);
        assert_eq!(meta.by_coin_type.get("creator"), Some(&2));
        assert_eq!(meta.by_coin_type.get("content"), Some(&1));
    }

    #[test]
    fn announcement_is_feed_shaped() {
        let token = discovery_announcement(&record("0xa", "creator", "1.000000"), 8453);
        assert_eq!(token.address, "0xa");
        assert_eq!(token.protocol, "uniswap-v4");
        assert_eq!(token.network_id, 8453);
        assert_eq!(token.created_at, 1_700_000_000);
    }
}
