//! `X-Ops-Key` guard for the ops endpoints.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use opsrunner_config::ControlPlaneConfig;
use opsrunner_core::auth::secret_matches;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;

pub const OPS_KEY_HEADER: &str = "X-Ops-Key";

/// Reject ops requests that do not carry the configured key.
pub async fn require_ops_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = request
        .headers()
        .get(OPS_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    check_ops_key(&state.config, provided)?;
    Ok(next.run(request).await)
}

/// In production the key must be configured and must match. Elsewhere it is
/// enforced only when configured.
pub fn check_ops_key(config: &ControlPlaneConfig, provided: Option<&str>) -> Result<(), ApiError> {
    match &config.ops_api_key {
        Some(key) if secret_matches(key.expose(), provided) => Ok(()),
        Some(_) => {
            warn!(key_present = provided.is_some(), "Rejected ops request");
            Err(ApiError::Unauthorized(
                "Invalid or missing X-Ops-Key".to_string(),
            ))
        }
        None if config.is_production() => Err(ApiError::Internal(
            "OPS_API_KEY not configured (required in production)".to_string(),
        )),
        None => Ok(()),
    }
}
