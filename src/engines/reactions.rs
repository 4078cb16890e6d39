//! Reaction counters with transactional updates.
//!
//! Counters live in a per-token hash; the read-increment-read triple runs
//! as one KV transaction so concurrent reactions on the same token
//! linearize.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bus::{BusEvent, EventBus};
use crate::db::models::WriteStatus;
use crate::errors::ScryError;
use crate::kv::KvClient;
use crate::utils::generate_id;

/// Accepted increment values per reaction.
pub const REACTION_INCREMENTS: RangeInclusive<i64> = 1..=3;

/// Hash holding one token's reaction counters.
pub fn reaction_key(token_address: &str) -> String {
    format!("emoji:{}", token_address.to_lowercase())
}

/// Pub/sub channel carrying live counter updates.
pub fn reaction_channel(token_address: &str) -> String {
    format!("emojiUpdates:{}", token_address.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 5] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Wow,
        ReactionKind::Sad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "like" => Some(ReactionKind::Like),
            "love" => Some(ReactionKind::Love),
            "laugh" => Some(ReactionKind::Laugh),
            "wow" => Some(ReactionKind::Wow),
            "sad" => Some(ReactionKind::Sad),
            _ => None,
        }
    }
}

/// All counters for one token, absent fields defaulting to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionCounters {
    pub like: u64,
    pub love: u64,
    pub laugh: u64,
    pub wow: u64,
    pub sad: u64,
}

impl ReactionCounters {
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |kind: ReactionKind| {
            fields
                .get(kind.as_str())
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(0)
        };
        Self {
            like: get(ReactionKind::Like),
            love: get(ReactionKind::Love),
            laugh: get(ReactionKind::Laugh),
            wow: get(ReactionKind::Wow),
            sad: get(ReactionKind::Sad),
        }
    }
}

/// Acknowledgement returned to the caller before the counter lands.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAck {
    pub id: String,
    pub status: WriteStatus,
}

pub struct ReactionEngine {
    kv: Arc<KvClient>,
    bus: Arc<EventBus>,
}

impl ReactionEngine {
    pub fn new(kv: Arc<KvClient>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { kv, bus })
    }

    pub fn register(self: &Arc<Self>) -> anyhow::Result<()> {
        let engine = Arc::clone(self);
        self.bus.on("emoji.reacted", move |event| {
            let engine = Arc::clone(&engine);
            async move {
                if let Err(err) = engine.handle_reacted(event).await {
                    error!("Reaction fan-out failed: {err:#}");
                }
            }
        })
    }

    /// Validate and publish; the counter lands in the handler.
    pub async fn react(
        &self,
        token_address: &str,
        emoji: &str,
        increment: i64,
    ) -> Result<ReactionAck, ScryError> {
        let kind = ReactionKind::parse(emoji).ok_or_else(|| {
            ScryError::Validation("emoji must be one of like, love, laugh, wow, sad".to_string())
        })?;
        if !REACTION_INCREMENTS.contains(&increment) {
            return Err(ScryError::Validation(
                "increment must be 1, 2 or 3".to_string(),
            ));
        }

        let ack = ReactionAck {
            id: generate_id("reaction"),
            status: WriteStatus::Processing,
        };
        let token = token_address.to_lowercase();
        self.bus
            .emit(BusEvent::new(
                "emoji.reacted",
                &token,
                json!({
                    "tokenAddress": token,
                    "emoji": kind.as_str(),
                    "increment": increment,
                    "reactionId": ack.id,
                }),
            ))
            .await;

        Ok(ack)
    }

    async fn handle_reacted(&self, event: BusEvent) -> anyhow::Result<()> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Reacted {
            token_address: String,
            emoji: String,
            increment: i64,
        }

        let reacted: Reacted =
            serde_json::from_value(event.payload).context("malformed reaction payload")?;
        let kind =
            ReactionKind::parse(&reacted.emoji).context("unknown reaction kind in payload")?;
        let key = reaction_key(&reacted.token_address);

        let (previous, updated, fields) = self
            .kv
            .reaction_txn(&key, kind.as_str(), reacted.increment)
            .await?;

        if updated < previous {
            // HINCRBY is monotonic under its own atomicity; a regression
            // means an external writer touched the hash. Restore the last
            // observed value, best effort.
            error!("Reaction counter regression on {key}: {previous} -> {updated}, reverting");
            self.kv
                .hset(&key, kind.as_str(), &previous.to_string())
                .await?;
            return Ok(());
        }

        let counts = ReactionCounters::from_fields(&fields);
        let update = json!({
            "type": "emojiCountUpdate",
            "counts": counts,
            "emoji": kind.as_str(),
            "previousCount": previous,
            "newCount": updated,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.kv
            .publish(&reaction_channel(&reacted.token_address), &update.to_string())
            .await?;

        Ok(())
    }

    /// Current counters, zero-defaulted.
    pub async fn counts(&self, token_address: &str) -> Result<ReactionCounters, ScryError> {
        let fields = self.kv.hget_all(&reaction_key(token_address)).await?;
        Ok(ReactionCounters::from_fields(&fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_case_insensitively() {
        assert_eq!(ReactionKind::parse("like"), Some(ReactionKind::Like));
        assert_eq!(ReactionKind::parse("LOVE"), Some(ReactionKind::Love));
        assert_eq!(ReactionKind::parse("thumbsup"), None);
        assert_eq!(ReactionKind::parse(""), None);
    }

    #[test]
    fn counters_default_missing_fields_to_zero() {
        let fields = HashMap::from([
            ("like".to_string(), "3".to_string()),
            ("sad".to_string(), "not-a-number".to_string()),
        ]);
        let counters = ReactionCounters::from_fields(&fields);
        assert_eq!(counters.like, 3);
        assert_eq!(counters.love, 0);
        assert_eq!(counters.sad, 0);
    }

    #[test]
    fn increment_bounds() {
        assert!(REACTION_INCREMENTS.contains(&1));
        assert!(REACTION_INCREMENTS.contains(&3));
        assert!(!REACTION_INCREMENTS.contains(&0));
        assert!(!REACTION_INCREMENTS.contains(&4));
    }

    #[test]
    fn keys_are_lowercased() {
        assert_eq!(reaction_key("0xAbC"), "emoji:0xabc");
        assert_eq!(reaction_channel("0xAbC"), "emojiUpdates:0xabc");
    }
}
