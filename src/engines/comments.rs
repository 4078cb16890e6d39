//! Commentary write-through engine.
//!
//! `create` validates, publishes and returns a `Processing` stub; the
//! bus handler persists, feeds the capped per-token cache, fans out the
//! live update and prunes old rows.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use log::error;
use serde_json::json;

use crate::bus::{BusEvent, EventBus};
use crate::db::models::{Comment, WriteStatus};
use crate::db::Database;
use crate::engines::resolve_user;
use crate::errors::ScryError;
use crate::kv::KvClient;
use crate::utils::{clamp_limit, generate_id, parse_wallet_address};

/// Cached (and eventually persisted) comments per token.
pub const MAX_CACHED_COMMENTS: usize = 50;

const MAX_CONTENT_CHARS: usize = 500;

/// KV list holding the newest comments, head first.
pub fn comment_list_key(token_address: &str) -> String {
    format!("comments:{}:list", token_address.to_lowercase())
}

/// Pub/sub channel carrying live comment updates.
pub fn comment_channel(token_address: &str) -> String {
    format!("comments:{}", token_address.to_lowercase())
}

fn validate_content(content: &str) -> Result<(), ScryError> {
    let chars = content.chars().count();
    if chars == 0 || chars > MAX_CONTENT_CHARS {
        return Err(ScryError::Validation(format!(
            "content must be between 1 and {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

pub struct CommentEngine {
    db: Database,
    kv: Arc<KvClient>,
    bus: Arc<EventBus>,
}

impl CommentEngine {
    pub fn new(db: Database, kv: Arc<KvClient>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { db, kv, bus })
    }

    /// Wire the asynchronous fan-out handler.
    pub fn register(self: &Arc<Self>) -> anyhow::Result<()> {
        let engine = Arc::clone(self);
        self.bus.on("comment.created", move |event| {
            let engine = Arc::clone(&engine);
            async move {
                if let Err(err) = engine.handle_created(event).await {
                    error!("Comment fan-out failed: {err:#}");
                }
            }
        })
    }

    /// Validate, resolve the author and publish. The returned stub is
    /// `Processing`; persistence happens in the handler.
    pub async fn create(
        &self,
        token_address: &str,
        wallet_address: &str,
        content: &str,
    ) -> Result<Comment, ScryError> {
        let wallet = parse_wallet_address(wallet_address).ok_or_else(|| {
            ScryError::Validation(
                "walletAddress must be a 0x-prefixed 20-byte hex address".to_string(),
            )
        })?;
        validate_content(content)?;

        let user = resolve_user(&self.db, &self.bus, &wallet).await?;

        let comment = Comment {
            id: generate_id("comment"),
            token_address: token_address.to_lowercase(),
            user_id: user.id,
            wallet_address: wallet,
            content: content.to_string(),
            created_at: Utc::now(),
            status: WriteStatus::Processing,
        };

        let payload =
            serde_json::to_value(&comment).map_err(|err| ScryError::Internal(err.into()))?;
        self.bus
            .emit(BusEvent::new(
                "comment.created",
                &comment.token_address,
                payload,
            ))
            .await;

        Ok(comment)
    }

    async fn handle_created(&self, event: BusEvent) -> anyhow::Result<()> {
        let mut comment: Comment =
            serde_json::from_value(event.payload).context("malformed comment payload")?;
        comment.status = WriteStatus::Persisted;

        let list_key = comment_list_key(&comment.token_address);
        let serialized = serde_json::to_string(&comment)?;

        // The insert and the cache push may run in parallel; both must land.
        let (persisted, cached) = tokio::join!(
            self.db.postgres.insert_comment(&comment),
            self.kv
                .lpush_trim(&list_key, &serialized, MAX_CACHED_COMMENTS as isize - 1),
        );
        persisted?;
        cached?;

        let update = json!({
            "type": "newComment",
            "comment": comment,
            "timestamp": Utc::now().timestamp_millis(),
        });
        self.kv
            .publish(&comment_channel(&comment.token_address), &update.to_string())
            .await?;

        self.db
            .postgres
            .prune_comments(&comment.token_address, MAX_CACHED_COMMENTS as i64)
            .await?;

        Ok(())
    }

    /// Newest-first comments: cache first, database fallback with
    /// cache warm-up on a miss.
    pub async fn latest(
        &self,
        token_address: &str,
        limit: Option<u32>,
    ) -> Result<Vec<Comment>, ScryError> {
        let limit = clamp_limit(limit, 50);
        let token = token_address.to_lowercase();
        let list_key = comment_list_key(&token);

        let cached = self.kv.lrange(&list_key, 0, limit as isize - 1).await?;
        if !cached.is_empty() {
            return Ok(cached
                .iter()
                .filter_map(|raw| serde_json::from_str::<Comment>(raw).ok())
                .collect());
        }

        let from_db = self.db.postgres.latest_comments(&token, limit).await?;
        if !from_db.is_empty() {
            // Warm the cache oldest-first so the newest ends at the head.
            for comment in from_db.iter().rev() {
                if let Ok(raw) = serde_json::to_string(comment) {
                    let _ = self.kv.lpush(&list_key, &raw).await;
                }
            }
            let _ = self
                .kv
                .ltrim(&list_key, 0, MAX_CACHED_COMMENTS as isize - 1)
                .await;
        }

        Ok(from_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_boundaries() {
        assert!(validate_content("").is_err());
        assert!(validate_content("a").is_ok());
        assert!(validate_content(&"a".repeat(500)).is_ok());
        assert!(validate_content(&"a".repeat(501)).is_err());
    }

    #[test]
    fn keys_are_lowercased() {
        assert_eq!(comment_list_key("0xAbC"), "comments:0xabc:list");
        assert_eq!(comment_channel("0xAbC"), "comments:0xabc");
    }
}
