use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::engines::reactions::reaction_channel;
use crate::errors::ScryError;
use crate::http::envelope::ApiResponse;
use crate::http::routes::into_stream_response;
use crate::http::server::AppContext;
use crate::sse::stream_events;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactRequest {
    pub token_address: String,
    pub emoji: String,
    pub increment: i64,
}

pub async fn react(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ReactRequest>,
) -> Result<impl IntoResponse, ScryError> {
    let ack = ctx
        .reactions
        .react(&request.token_address, &request.emoji, request.increment)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Reaction queued", ack),
    ))
}

pub async fn counts(
    State(ctx): State<Arc<AppContext>>,
    Path(token_address): Path<String>,
) -> Result<impl IntoResponse, ScryError> {
    let counters = ctx.reactions.counts(&token_address).await?;
    Ok(ApiResponse::ok(counters))
}

pub async fn stream(
    State(ctx): State<Arc<AppContext>>,
    Path(token_address): Path<String>,
) -> Result<Response, ScryError> {
    let token = token_address.to_lowercase();
    let counters = ctx.reactions.counts(&token).await?;
    let snapshot_payload =
        serde_json::to_value(&counters).map_err(|err| ScryError::Internal(err.into()))?;

    let connection = json!({
        "type": "connection",
        "tokenAddress": token,
        "timestamp": Utc::now().timestamp_millis(),
    });

    let sse = stream_events(
        ctx.hub.clone(),
        reaction_channel(&token),
        connection,
        "initialEmojiCounts",
        snapshot_payload,
        Some("emojiCountUpdate"),
    );
    Ok(into_stream_response(sse))
}
