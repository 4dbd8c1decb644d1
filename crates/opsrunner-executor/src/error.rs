//! Runner API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Runner API error type.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<opsrunner_core::Error> for ApiError {
    fn from(err: opsrunner_core::Error) -> Self {
        match err {
            opsrunner_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            opsrunner_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            opsrunner_core::Error::Forbidden(msg) => ApiError::Forbidden(msg),
            opsrunner_core::Error::Store(msg) => {
                ApiError::Internal(format!("Failed to update job status: {}", msg))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
