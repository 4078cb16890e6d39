use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::engines::comments::comment_channel;
use crate::errors::ScryError;
use crate::http::envelope::ApiResponse;
use crate::http::routes::into_stream_response;
use crate::http::server::AppContext;
use crate::sse::stream_events;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub token_address: String,
    pub wallet_address: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub initial: Option<u32>,
}

pub async fn create(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<CreateRequest>,
) -> Result<impl IntoResponse, ScryError> {
    let stub = ctx
        .comments
        .create(
            &request.token_address,
            &request.wallet_address,
            &request.content,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Comment submitted", stub),
    ))
}

pub async fn latest(
    State(ctx): State<Arc<AppContext>>,
    Path(token_address): Path<String>,
    Query(query): Query<LatestQuery>,
) -> Result<impl IntoResponse, ScryError> {
    let comments = ctx.comments.latest(&token_address, query.limit).await?;
    Ok(ApiResponse::ok(comments))
}

pub async fn stream(
    State(ctx): State<Arc<AppContext>>,
    Path(token_address): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Response, ScryError> {
    let token = token_address.to_lowercase();
    let snapshot = ctx.comments.latest(&token, query.initial).await?;
    let snapshot_payload =
        serde_json::to_value(&snapshot).map_err(|err| ScryError::Internal(err.into()))?;

    let connection = json!({
        "type": "connection",
        "tokenAddress": token,
        "timestamp": Utc::now().timestamp_millis(),
    });

    let sse = stream_events(
        ctx.hub.clone(),
        comment_channel(&token),
        connection,
        "initialComments",
        snapshot_payload,
        Some("newComment"),
    );
    Ok(into_stream_response(sse))
}
