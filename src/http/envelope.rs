//! Response envelopes shared by every endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use log::error;
use serde::Serialize;

use crate::errors::ScryError;

/// Success envelope: `{success, message?, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.into()),
            data,
        })
    }
}

/// Error envelope: `{success:false, message, data:null, statusCode, timestamp}`.
pub fn error_body(status: StatusCode, message: String) -> Response {
    let body = serde_json::json!({
        "success": false,
        "message": message,
        "data": null,
        "statusCode": status.as_u16(),
        "timestamp": Utc::now().to_rfc3339(),
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for ScryError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScryError::Validation(_) => StatusCode::BAD_REQUEST,
            ScryError::NotFound(_) => StatusCode::NOT_FOUND,
            ScryError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ScryError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScryError::Conflict(_) => StatusCode::CONFLICT,
            ScryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal chains are logged, never exposed to clients.
        let message = match &self {
            ScryError::Internal(err) => {
                error!("Internal error: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        error_body(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(ApiResponse {
            success: true,
            message: None,
            data: serde_json::json!({"n": 1}),
        })
        .expect("serializes");
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["n"], 1);
        assert!(body.get("message").is_none());
    }

    #[test]
    fn message_is_included_when_set() {
        let body = serde_json::to_value(ApiResponse {
            success: true,
            message: Some("done".to_string()),
            data: 3,
        })
        .expect("serializes");
        assert_eq!(body["message"], "done");
    }
}
