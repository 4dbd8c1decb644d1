//! Runner HTTP routes.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use opsrunner_core::auth::secret_matches;
use opsrunner_core::wire::{EXECUTE_PATH, ExecuteAccepted, HEALTH_PATH, RUNNER_TOKEN_HEADER, RunnerHealth};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::RunnerState;
use crate::error::ApiError;

/// Build the runner router.
pub fn router(state: RunnerState) -> Router {
    Router::new()
        .route(EXECUTE_PATH, post(execute))
        .route(HEALTH_PATH, get(health))
        .route("/jobs/run", post(legacy_run))
        .with_state(state)
}

fn require_token(state: &RunnerState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(RUNNER_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if secret_matches(state.token.expose(), provided) {
        Ok(())
    } else {
        warn!(token_present = provided.is_some(), "Rejected runner request");
        Err(ApiError::Unauthorized("invalid_runner_token".to_string()))
    }
}

/// Accept a job from the control plane.
async fn execute(
    State(state): State<RunnerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ExecuteAccepted>, ApiError> {
    require_token(&state, &headers)?;

    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let command = state.executor.validate(&body)?;

    info!(job_id = %command.job_id, job_type = %command.kind, "Execute request");

    // The completion handle is dropped; the task runs on detached.
    let (accepted, _completion) = state.executor.accept(command).await?;
    Ok(Json(accepted))
}

async fn health(
    State(state): State<RunnerState>,
    headers: HeaderMap,
) -> Result<Json<RunnerHealth>, ApiError> {
    require_token(&state, &headers)?;
    Ok(Json(RunnerHealth {
        status: "ok".to_string(),
        runner_instance: state.executor.instance().to_string(),
    }))
}

async fn legacy_run(
    State(state): State<RunnerState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_token(&state, &headers)?;
    Ok(Json(json!({
        "status": "error",
        "message": "Use /runner/execute endpoint instead"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunnerExecutor;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use opsrunner_config::{Allowlist, Secret};
    use opsrunner_core::{HandlerRegistry, JobId, JobKind, JobStatus};
    use opsrunner_db::{JobRepo, MemoryJobRepo, NewJob};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const TOKEN: &str = "runner-secret";

    fn app_with(allowlist: Allowlist) -> (Router, Arc<MemoryJobRepo>) {
        let repo = Arc::new(MemoryJobRepo::new());
        let executor = RunnerExecutor::new(
            repo.clone(),
            repo.clone(),
            Arc::new(HandlerRegistry::with_defaults()),
            allowlist,
            "runner-a",
        );
        let state = RunnerState::new(Arc::new(executor), Secret::new(TOKEN));
        (router(state), repo)
    }

    fn app() -> (Router, Arc<MemoryJobRepo>) {
        app_with(Allowlist::all())
    }

    fn execute_request(token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(EXECUTE_PATH)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header(RUNNER_TOKEN_HEADER, token);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn queued(repo: &MemoryJobRepo, job_type: &str) -> JobId {
        repo.create(NewJob {
            job_type: job_type.to_string(),
            payload: Some(json!({})),
            requested_by: Some("api".to_string()),
        })
        .await
        .unwrap()
        .job_id()
    }

    async fn wait_for_terminal(repo: &MemoryJobRepo, id: JobId) -> JobStatus {
        for _ in 0..100 {
            let status = repo.get(id).await.unwrap().status;
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        repo.get(id).await.unwrap().status
    }

    #[tokio::test]
    async fn test_execute_requires_token() {
        let (app, repo) = app();
        let id = queued(&repo, "metrics_refresh").await;
        let body = json!({ "job_id": id.to_string(), "job_type": "metrics_refresh" });

        for token in [None, Some("wrong")] {
            let response = app
                .clone()
                .oneshot(execute_request(token, body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(json_body(response).await["error"], "invalid_runner_token");
        }
        assert_eq!(repo.get(id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_execute_rejects_missing_fields() {
        let (app, _) = app();
        let response = app
            .oneshot(execute_request(Some(TOKEN), json!({ "job_type": "metrics_refresh" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["error"],
            "Missing required fields: job_id, job_type"
        );
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_json() {
        let (app, _) = app();
        let request = Request::builder()
            .method("POST")
            .uri(EXECUTE_PATH)
            .header(RUNNER_TOKEN_HEADER, TOKEN)
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execute_forbids_job_type_outside_allowlist() {
        let (app, repo) = app_with(Allowlist::new([JobKind::MetricsRefresh]));
        let id = queued(&repo, "unknown_type").await;

        let response = app
            .oneshot(execute_request(
                Some(TOKEN),
                json!({ "job_id": id.to_string(), "job_type": "unknown_type", "payload": {} }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json_body(response).await["error"],
            "Job type 'unknown_type' not in allowlist"
        );
        let job = repo.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.runner_instance.is_none());
    }

    #[tokio::test]
    async fn test_execute_accepts_and_completes() {
        let (app, repo) = app();
        let id = queued(&repo, "metrics_refresh").await;

        let response = app
            .oneshot(execute_request(
                Some(TOKEN),
                json!({ "job_id": id.to_string(), "job_type": "metrics_refresh", "payload": {} }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "accepted");
        assert_eq!(body["job_id"], id.to_string());
        assert_eq!(body["job_type"], "metrics_refresh");
        assert_eq!(body["runner_instance"], "runner-a");

        assert_eq!(wait_for_terminal(&repo, id).await, JobStatus::Succeeded);
        let job = repo.get(id).await.unwrap();
        assert_eq!(job.result.unwrap()["not_implemented"], json!(true));
        assert_eq!(job.runner_instance.as_deref(), Some("runner-a"));
    }

    #[tokio::test]
    async fn test_execute_store_failure_is_500() {
        let (app, repo) = app();
        let id = queued(&repo, "metrics_refresh").await;
        repo.set_fail_writes(true);

        let response = app
            .oneshot(execute_request(
                Some(TOKEN),
                json!({ "job_id": id.to_string(), "job_type": "metrics_refresh" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Failed to update job status"));

        repo.set_fail_writes(false);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(repo.get(id).await.unwrap().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_healthz() {
        let (app, _) = app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(HEALTH_PATH)
                    .header(RUNNER_TOKEN_HEADER, TOKEN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "ok", "runner_instance": "runner-a" })
        );

        let response = app
            .oneshot(Request::builder().uri(HEALTH_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_legacy_run_points_to_execute() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/jobs/run")
                    .header(RUNNER_TOKEN_HEADER, TOKEN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Use /runner/execute endpoint instead");
    }
}
