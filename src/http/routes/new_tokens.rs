use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::engines::launchpad::UPDATES_CHANNEL;
use crate::engines::Pagination;
use crate::errors::ScryError;
use crate::http::envelope::ApiResponse;
use crate::http::routes::into_stream_response;
use crate::http::server::AppContext;
use crate::sse::stream_events;
use crate::utils::{clamp_limit, clamp_page};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub initial: Option<u32>,
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ScryError> {
    let page = clamp_page(query.page);
    let limit = clamp_limit(query.limit, 50);

    let (tokens, total, skip) = ctx.launchpad.page(page, limit, query.offset).await?;
    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };

    Ok(ApiResponse::ok(json!({
        "data": tokens,
        "pagination": Pagination {
            total,
            page,
            limit,
            total_pages,
            skip,
        },
    })))
}

pub async fn stream(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ScryError> {
    let initial = clamp_limit(query.initial, 100);
    let snapshot = ctx.launchpad.latest(initial).await?;
    let snapshot_payload =
        serde_json::to_value(&snapshot).map_err(|err| ScryError::Internal(err.into()))?;

    let connection = json!({
        "type": "connection",
        "channel": UPDATES_CHANNEL,
        "timestamp": Utc::now().timestamp_millis(),
    });

    // Launchpad deltas are forwarded as anonymous events, one per item.
    let sse = stream_events(
        ctx.hub.clone(),
        UPDATES_CHANNEL.to_string(),
        connection,
        "snapshot",
        snapshot_payload,
        None,
    );
    Ok(into_stream_response(sse))
}
