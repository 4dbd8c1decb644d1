//! API error handling.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use opsrunner_core::bounds::{MAX_ERROR_DETAIL_CHARS, truncate_chars};
use serde_json::json;

/// API error type.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    ServiceUnavailable(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
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
        use opsrunner_core::Error;
        match err {
            Error::NotFound(_) => ApiError::NotFound("Job not found".to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::UnknownJobType(job_type) => {
                ApiError::BadRequest(format!("Unknown job type: {}", job_type))
            }
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::ServiceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            Error::Upstream(detail) => ApiError::BadGateway(format!(
                "Runner call failed: {}",
                truncate_chars(&detail, MAX_ERROR_DETAIL_CHARS)
            )),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<opsrunner_db::DbError> for ApiError {
    fn from(err: opsrunner_db::DbError) -> Self {
        match err {
            opsrunner_db::DbError::NotFound(_) => ApiError::NotFound("Job not found".to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
