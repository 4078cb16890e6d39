use chrono::{DateTime, Utc};

/// A watchlist entry (PostgreSQL)
///
/// Unique: (user_id, token_address); token_address stored lowercase.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    pub id: i64,
    pub user_id: String,
    pub token_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
