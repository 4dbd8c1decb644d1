//! Ops job endpoints.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use opsrunner_core::{JobId, JobStatus};
use opsrunner_db::{Job, JobEvent, JobFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/{job_id}", get(get_job))
        .route("/{job_id}/cancel", post(cancel_job))
        .route("/{job_id}/events", get(list_events))
}

/// `/trigger_runner` sits beside the jobs collection, not under it.
pub fn trigger_router() -> Router<AppState> {
    Router::new().route("/trigger_runner", post(trigger_runner))
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid job_id format".to_string()))
}

fn object_payload(payload: Option<Value>) -> Result<Option<Value>, ApiError> {
    match payload {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => Ok(Some(value)),
        Some(_) => Err(ApiError::BadRequest(
            "payload must be a JSON object".to_string(),
        )),
    }
}

#[derive(Debug, Serialize)]
struct JobSummary {
    id: String,
    job_type: String,
    status: JobStatus,
    requested_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            job_type: job.job_type.clone(),
            status: job.status,
            requested_by: job.requested_by.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobDetail {
    #[serde(flatten)]
    summary: JobSummary,
    payload: Option<Value>,
    result: Option<Value>,
    error: Option<String>,
    runner_instance: Option<String>,
}

impl From<Job> for JobDetail {
    fn from(job: Job) -> Self {
        Self {
            summary: JobSummary::from(&job),
            payload: job.payload,
            result: job.result,
            error: job.error,
            runner_instance: job.runner_instance,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobList {
    jobs: Vec<JobSummary>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct JobStatusResponse {
    job_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    job_type: String,
    payload: Option<Value>,
    requested_by: Option<String>,
}

/// Record a `queued` job without contacting the runner.
async fn create_job(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateJobRequest>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let payload = object_payload(req.payload)?;
    let job = state
        .orchestrator
        .create_job(&req.job_type, payload, req.requested_by)
        .await?;
    Ok(Json(JobStatusResponse {
        job_id: job.id.to_string(),
        status: job.status.to_string(),
        message: None,
    }))
}

#[derive(Debug, Deserialize)]
struct ListJobsQuery {
    status: Option<JobStatus>,
    job_type: Option<String>,
    since: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListJobsQuery>,
) -> Result<Json<JobList>, ApiError> {
    let filter = JobFilter {
        status: query.status,
        job_type: query.job_type.filter(|t| !t.trim().is_empty()),
        since: query.since,
        limit: query.limit,
    };
    let jobs = state.orchestrator.list(&filter).await?;
    let jobs: Vec<JobSummary> = jobs.iter().map(JobSummary::from).collect();
    Ok(Json(JobList {
        count: jobs.len(),
        jobs,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobDetail>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state.orchestrator.get(job_id).await?;
    Ok(Json(JobDetail::from(job)))
}

/// Record cancellation intent. The job's status does not change.
async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let outcome = state.orchestrator.cancel(job_id).await?;
    Ok(Json(JobStatusResponse {
        job_id: outcome.job_id.to_string(),
        status: "cancel_requested".to_string(),
        message: Some("Cancellation intent recorded"),
    }))
}

#[derive(Debug, Serialize)]
struct EventList {
    events: Vec<JobEvent>,
    count: usize,
}

async fn list_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<EventList>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let events = state.orchestrator.events(job_id).await?;
    Ok(Json(EventList {
        count: events.len(),
        events,
    }))
}

#[derive(Debug, Deserialize)]
struct TriggerRunnerRequest {
    job_type: String,
    payload: Option<Value>,
}

/// Create a job and hand it to the runner.
async fn trigger_runner(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TriggerRunnerRequest>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let payload = object_payload(req.payload)?;
    let outcome = state
        .orchestrator
        .trigger_runner(&req.job_type, payload)
        .await?;
    Ok(Json(JobStatusResponse {
        job_id: outcome.job_id.to_string(),
        status: outcome.status.to_string(),
        message: Some("Job accepted by runner"),
    }))
}
