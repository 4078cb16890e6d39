//! Per-user token watchlists.
//!
//! The relational store is the source of truth; the wallet-indexed KV set
//! is an advisory cache for fast membership. DB writes precede cache
//! updates so a DB failure never leaves phantom cache entries.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::bus::{BusEvent, EventBus};
use crate::db::models::WatchlistEntry;
use crate::db::Database;
use crate::engines::{resolve_user, Pagination};
use crate::errors::ScryError;
use crate::kv::KvClient;
use crate::utils::{clamp_limit, clamp_page, parse_wallet_address};

/// Upper bound on tokens per add/remove request.
pub const MAX_BATCH_TOKENS: usize = 50;

/// KV set caching a wallet's watched token addresses.
pub fn watchlist_key(wallet_address: &str) -> String {
    format!("watchlist:{}", wallet_address.to_lowercase())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub added_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOutcome {
    pub removed_count: u64,
}

#[derive(Debug, Serialize)]
pub struct WatchlistPage {
    pub data: Vec<WatchlistEntry>,
    pub pagination: Pagination,
}

/// Lower-case, validate and dedupe token addresses preserving order.
fn normalize_tokens(token_addresses: &[String]) -> Result<Vec<String>, ScryError> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::with_capacity(token_addresses.len());
    for raw in token_addresses {
        let token = parse_wallet_address(raw).ok_or_else(|| {
            ScryError::Validation(format!("'{raw}' is not a valid token address"))
        })?;
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    if tokens.is_empty() {
        return Err(ScryError::Validation(
            "tokenAddresses must not be empty".to_string(),
        ));
    }
    if tokens.len() > MAX_BATCH_TOKENS {
        return Err(ScryError::Validation(format!(
            "at most {MAX_BATCH_TOKENS} token addresses per request"
        )));
    }
    Ok(tokens)
}

pub struct WatchlistEngine {
    db: Database,
    kv: Arc<KvClient>,
    bus: Arc<EventBus>,
}

impl WatchlistEngine {
    pub fn new(db: Database, kv: Arc<KvClient>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self { db, kv, bus })
    }

    /// Idempotent set-add: already-watched tokens do not count.
    pub async fn add(
        &self,
        wallet_address: &str,
        token_addresses: &[String],
    ) -> Result<AddOutcome, ScryError> {
        let wallet = parse_wallet_address(wallet_address).ok_or_else(|| {
            ScryError::Validation(
                "walletAddress must be a 0x-prefixed 20-byte hex address".to_string(),
            )
        })?;
        let tokens = normalize_tokens(token_addresses)?;

        let user = resolve_user(&self.db, &self.bus, &wallet).await?;

        let existing: HashSet<String> = self
            .db
            .postgres
            .watchlist_existing(&user.id, &tokens)
            .await?
            .into_iter()
            .collect();
        let new_tokens: Vec<String> = tokens
            .into_iter()
            .filter(|token| !existing.contains(token))
            .collect();

        if new_tokens.is_empty() {
            return Ok(AddOutcome { added_count: 0 });
        }

        self.db
            .postgres
            .watchlist_insert(&user.id, &new_tokens)
            .await?;
        self.kv
            .sadd_all(&watchlist_key(&wallet), &new_tokens)
            .await?;

        self.bus
            .emit(BusEvent::new(
                "user.watchlist.token.added",
                &user.id,
                json!({
                    "walletAddress": wallet,
                    "tokenAddresses": new_tokens,
                }),
            ))
            .await;

        Ok(AddOutcome {
            added_count: new_tokens.len(),
        })
    }

    pub async fn remove(
        &self,
        wallet_address: &str,
        token_addresses: &[String],
    ) -> Result<RemoveOutcome, ScryError> {
        let wallet = parse_wallet_address(wallet_address).ok_or_else(|| {
            ScryError::Validation(
                "walletAddress must be a 0x-prefixed 20-byte hex address".to_string(),
            )
        })?;
        let tokens = normalize_tokens(token_addresses)?;

        let user = self
            .db
            .postgres
            .get_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| ScryError::NotFound(format!("No user for wallet {wallet}")))?;

        let removed_count = self.db.postgres.watchlist_delete(&user.id, &tokens).await?;
        self.kv.srem_all(&watchlist_key(&wallet), &tokens).await?;

        self.bus
            .emit(BusEvent::new(
                "user.watchlist.token.removed",
                &user.id,
                json!({
                    "walletAddress": wallet,
                    "tokenAddresses": tokens,
                }),
            ))
            .await;

        Ok(RemoveOutcome { removed_count })
    }

    /// Newest-first page of the wallet's watchlist.
    pub async fn list(
        &self,
        wallet_address: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<WatchlistPage, ScryError> {
        let wallet = parse_wallet_address(wallet_address).ok_or_else(|| {
            ScryError::Validation(
                "walletAddress must be a 0x-prefixed 20-byte hex address".to_string(),
            )
        })?;
        let page = clamp_page(page);
        let limit = clamp_limit(limit, 20);
        let skip = (page - 1) * limit;

        let user = self
            .db
            .postgres
            .get_user_by_wallet(&wallet)
            .await?
            .ok_or_else(|| ScryError::NotFound(format!("No user for wallet {wallet}")))?;

        let total = self.db.postgres.watchlist_total(&user.id).await?;
        let data = self.db.postgres.watchlist_page(&user.id, limit, skip).await?;
        let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

        Ok(WatchlistPage {
            data,
            pagination: Pagination {
                total,
                page,
                limit,
                total_pages,
                skip,
            },
        })
    }

    /// Membership check; an absent user is simply `false`.
    pub async fn contains(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<bool, ScryError> {
        let wallet = wallet_address.to_lowercase();
        let token = token_address.to_lowercase();
        match self.db.postgres.get_user_by_wallet(&wallet).await? {
            Some(user) => Ok(self
                .db
                .postgres
                .watchlist_contains(&user.id, &token)
                .await?),
            None => Ok(false),
        }
    }

    /// Entry count; an absent user is simply zero.
    pub async fn count(&self, wallet_address: &str) -> Result<i64, ScryError> {
        let wallet = wallet_address.to_lowercase();
        match self.db.postgres.get_user_by_wallet(&wallet).await? {
            Some(user) => Ok(self.db.postgres.watchlist_total(&user.id).await?),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn tokens_normalize_lowercase_and_dedupe() {
        let input = vec![A.to_uppercase().replace("0X", "0x"), A.to_string(), B.to_string()];
        let tokens = normalize_tokens(&input).expect("valid");
        assert_eq!(tokens, vec![A.to_string(), B.to_string()]);
    }

    #[test]
    fn empty_and_oversized_batches_are_rejected() {
        assert!(normalize_tokens(&[]).is_err());
        let too_many: Vec<String> = (0..51)
            .map(|i| format!("0x{:040x}", i + 1))
            .collect();
        assert!(normalize_tokens(&too_many).is_err());
    }

    #[test]
    fn malformed_token_addresses_are_rejected() {
        assert!(normalize_tokens(&["0x123".to_string()]).is_err());
    }

    #[test]
    fn cache_key_is_wallet_scoped() {
        assert_eq!(watchlist_key("0xAbC"), "watchlist:0xabc");
    }
}
