//! Token discovery data model.

use std::collections::HashMap;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::PoolInitLog;

/// Identity of a v4 pool taken from its Initialize log.
///
/// `currency0 < currency1` as unsigned 160-bit integers, guaranteed by
/// the pool manager's sorting.
#[derive(Debug, Clone)]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
    pub discovery_block: u64,
}

impl From<PoolInitLog> for PoolKey {
    fn from(log: PoolInitLog) -> Self {
        Self {
            currency0: log.currency0,
            currency1: log.currency1,
            fee: log.fee,
            tick_spacing: log.tick_spacing,
            hooks: log.hooks,
            discovery_block: log.block_number,
        }
    }
}

/// Which partition a discovered token belongs to.
///
/// `Tba` pools have a configured base pairing on one side (the token is
/// the other side); `Zora` pools pair two arbitrary currencies and
/// currency0 is treated as the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppType {
    #[serde(rename = "ZORA")]
    Zora,
    #[serde(rename = "TBA")]
    Tba,
}

impl AppType {
    pub const ALL: [AppType; 2] = [AppType::Zora, AppType::Tba];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Zora => "ZORA",
            AppType::Tba => "TBA",
        }
    }

    /// KV key of the partition blob.
    pub fn cache_key(&self) -> &'static str {
        match self {
            AppType::Zora => "zora:tokens",
            AppType::Tba => "tba:tokens",
        }
    }
}

/// A classified, priced token produced by one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub pool_id: String,
    pub app_type: AppType,
    pub coin_type: String,
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub current_tick: i32,
    pub sqrt_price_x96: String,
    pub human_price: String,
    pub discovery_block: u64,
    pub discovery_timestamp: u64,
}

/// Aggregate stats stored alongside a partition's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionMeta {
    pub last_updated_at: DateTime<Utc>,
    pub total_tokens: usize,
    pub by_coin_type: HashMap<String, usize>,
}

/// One named partition of token records (`ZORA` / `TBA`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPartition {
    pub name: String,
    pub records: Vec<TokenRecord>,
    pub meta: PartitionMeta,
}
