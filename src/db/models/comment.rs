use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WriteStatus;

/// A token comment (PostgreSQL + per-token cached list)
///
/// Query Pattern: "Latest comments for token X, newest first"
/// Per-token retention is bounded: the cached list holds at most 50
/// entries and the table is pruned to the same bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub token_address: String,
    pub user_id: String,
    pub wallet_address: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: WriteStatus,
}
