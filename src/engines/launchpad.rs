//! Launchpad feed cache and fan-out.
//!
//! Consumes `new-token-created` bus events (from the external feed and
//! the scanner alike), dedupes by address, maintains the capped list and
//! publishes live updates.

use std::sync::Arc;

use anyhow::Context;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::bus::{BusEvent, EventBus};
use crate::errors::ScryError;
use crate::kv::KvClient;

/// Capped newest-first list of launchpad tokens.
pub const LIST_KEY: &str = "new-tokens:list";

/// Dedup hash keyed by token address.
pub const EVENTS_KEY: &str = "new-tokens:events";

/// Pub/sub channel carrying live launchpad updates.
pub const UPDATES_CHANNEL: &str = "new-tokens:updates";

/// Retained list entries.
pub const MAX_LIST_ENTRIES: usize = 200;

const RETENTION_SECS: i64 = 86_400;

/// A normalized launchpad token announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchpadToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub network: String,
    pub protocol: String,
    pub network_id: i64,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume24: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holders: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launchpad_protocol: Option<String>,
    pub timestamp: i64,
}

pub struct LaunchpadEngine {
    kv: Arc<KvClient>,
    bus: Arc<EventBus>,
}

impl LaunchpadEngine {
    pub fn new(kv: Arc<KvClient>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { kv, bus })
    }

    pub fn register(self: &Arc<Self>) -> anyhow::Result<()> {
        let engine = Arc::clone(self);
        self.bus.on("new-token-created", move |event| {
            let engine = Arc::clone(&engine);
            async move {
                if let Err(err) = engine.handle_created(event).await {
                    error!("Launchpad fan-out failed: {err:#}");
                }
            }
        })
    }

    async fn handle_created(&self, event: BusEvent) -> anyhow::Result<()> {
        let token: LaunchpadToken =
            serde_json::from_value(event.payload).context("malformed launchpad token payload")?;
        let address = token.address.to_lowercase();

        let first_seen = self
            .kv
            .dedup_mark(EVENTS_KEY, &address, &token.timestamp.to_string(), RETENTION_SECS)
            .await?;
        if !first_seen {
            debug!("Skipping already-seen launchpad token {address}");
            return Ok(());
        }

        let serialized = serde_json::to_string(&token)?;
        self.kv
            .lpush_trim_expire(
                LIST_KEY,
                &serialized,
                MAX_LIST_ENTRIES as isize - 1,
                RETENTION_SECS,
            )
            .await?;
        self.kv.publish(UPDATES_CHANNEL, &serialized).await?;

        Ok(())
    }

    /// Newest-first slice of the cached list.
    pub async fn latest(&self, limit: i64) -> Result<Vec<LaunchpadToken>, ScryError> {
        let raw = self.kv.lrange(LIST_KEY, 0, limit as isize - 1).await?;
        Ok(raw
            .iter()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .collect())
    }

    /// Offset-paged slice plus the total list length. An explicit
    /// `offset` overrides page-based addressing.
    pub async fn page(
        &self,
        page: i64,
        limit: i64,
        offset: Option<i64>,
    ) -> Result<(Vec<LaunchpadToken>, i64, i64), ScryError> {
        let skip = offset.unwrap_or((page - 1) * limit).max(0);
        let total = self.kv.llen(LIST_KEY).await? as i64;
        let raw = self
            .kv
            .lrange(LIST_KEY, skip as isize, (skip + limit - 1) as isize)
            .await?;
        let tokens = raw
            .iter()
            .filter_map(|entry| serde_json::from_str(entry).ok())
            .collect();
        Ok((tokens, total, skip))
    }
}
