use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use crate::http::envelope::ApiResponse;
use crate::http::server::AppContext;

pub async fn basic() -> impl IntoResponse {
    ApiResponse::ok(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Probes the storage layers and reports per-component status.
pub async fn detailed(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let postgres_ok = ctx.db.postgres.health_check().await.is_ok();
    let kv_ok = ctx.kv.ping().await.is_ok();
    let healthy = postgres_ok && kv_ok;

    ApiResponse::ok(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "components": {
            "postgres": if postgres_ok { "up" } else { "down" },
            "kv": if kv_ok { "up" } else { "down" },
            "scanner": { "scanning": ctx.scanner.is_scanning() },
            "sse": { "activeChannels": ctx.hub.active_channels() },
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
