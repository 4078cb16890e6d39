use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ScryError;
use crate::http::envelope::ApiResponse;
use crate::http::server::AppContext;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateRequest {
    pub wallet_address: String,
    pub token_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub wallet_address: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn add(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<MutateRequest>,
) -> Result<impl IntoResponse, ScryError> {
    let outcome = ctx
        .watchlist
        .add(&request.wallet_address, &request.token_addresses)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Tokens added to watchlist", outcome),
    ))
}

pub async fn remove(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<MutateRequest>,
) -> Result<impl IntoResponse, ScryError> {
    let outcome = ctx
        .watchlist
        .remove(&request.wallet_address, &request.token_addresses)
        .await?;
    Ok(ApiResponse::with_message(
        "Tokens removed from watchlist",
        outcome,
    ))
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ScryError> {
    let page = ctx
        .watchlist
        .list(&query.wallet_address, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn check(
    State(ctx): State<Arc<AppContext>>,
    Path((wallet_address, token_address)): Path<(String, String)>,
) -> Result<impl IntoResponse, ScryError> {
    let is_in_watchlist = ctx.watchlist.contains(&wallet_address, &token_address).await?;
    Ok(ApiResponse::ok(json!({ "isInWatchlist": is_in_watchlist })))
}

pub async fn count(
    State(ctx): State<Arc<AppContext>>,
    Path(wallet_address): Path<String>,
) -> Result<impl IntoResponse, ScryError> {
    let count = ctx.watchlist.count(&wallet_address).await?;
    Ok(ApiResponse::ok(json!({ "count": count })))
}
