use chrono::{DateTime, Utc};

/// Wallet-derived identity (PostgreSQL)
///
/// Primary Key: id
/// Unique: wallet_address (always stored lowercase)
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
