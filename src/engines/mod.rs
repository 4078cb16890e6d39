pub mod comments;
pub mod launchpad;
pub mod reactions;
pub mod watchlist;

pub use comments::CommentEngine;
pub use launchpad::{LaunchpadEngine, LaunchpadToken};
pub use reactions::{ReactionCounters, ReactionEngine, ReactionKind};
pub use watchlist::WatchlistEngine;

use serde::Serialize;
use serde_json::json;

use crate::bus::{BusEvent, EventBus};
use crate::db::models::User;
use crate::db::Database;

/// Offset-based pagination envelope shared by list endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub skip: i64,
}

/// Get-or-upsert a user by wallet; announces freshly created users.
pub(crate) async fn resolve_user(
    db: &Database,
    bus: &EventBus,
    wallet_address: &str,
) -> anyhow::Result<User> {
    let (user, created) = db.postgres.get_or_create_user(wallet_address).await?;
    if created {
        bus.emit(BusEvent::new(
            "user.created",
            &user.id,
            json!({
                "userId": user.id,
                "walletAddress": user.wallet_address,
            }),
        ))
        .await;
    }
    Ok(user)
}
