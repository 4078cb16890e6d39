use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use serde_json::Value;

use crate::errors::ScryError;
use crate::http::envelope::ApiResponse;
use crate::http::server::AppContext;
use crate::scanner::AppType;

pub async fn all(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ScryError> {
    let partitions = ctx.repository.all().await?;
    if partitions.is_empty() {
        return Err(ScryError::NotFound("No tokens discovered yet".to_string()));
    }
    Ok(ApiResponse::ok(partitions))
}

pub async fn zora(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ScryError> {
    partition(&ctx, AppType::Zora).await
}

pub async fn tba(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ScryError> {
    partition(&ctx, AppType::Tba).await
}

async fn partition(
    ctx: &AppContext,
    app_type: AppType,
) -> Result<impl IntoResponse, ScryError> {
    let partition = ctx.repository.partition(app_type).await?.ok_or_else(|| {
        ScryError::NotFound(format!("No {} tokens discovered yet", app_type.as_str()))
    })?;
    Ok(ApiResponse::ok(partition))
}

pub async fn metadata(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ScryError> {
    let metadata = ctx.repository.metadata().await?;
    if metadata.is_empty() {
        return Err(ScryError::NotFound("No tokens discovered yet".to_string()));
    }
    Ok(ApiResponse::ok(metadata))
}

/// Trigger one scan cycle synchronously.
pub async fn scan(State(ctx): State<Arc<AppContext>>) -> Result<impl IntoResponse, ScryError> {
    match ctx.scanner.scan().await? {
        Some(result) => Ok(ApiResponse::with_message("Scan completed", serde_json::to_value(result).map_err(|err| ScryError::Internal(err.into()))?)),
        None => Ok(ApiResponse::with_message(
            "Scan already in progress",
            Value::Null,
        )),
    }
}
