//! Control-plane orchestrator: creates job rows and hands them to the runner.
//!
//! The handoff is two-phase and non-atomic. The `queued` row commits before
//! the runner is called; the row is then moved to `running` or `failed`
//! depending on how the call went. A trigger is never retried.

use opsrunner_core::bounds::bound_error;
pub use opsrunner_core::job::CANCEL_MESSAGE;
use opsrunner_core::wire::ExecuteRequest;
use opsrunner_core::{Error, JobId, JobStatus, Result};
use opsrunner_db::{
    Job, JobEvent, JobEventRepo, JobFilter, JobRepo, NewJob, StatusChange, event_type,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::client::RunnerClient;

/// Provenance recorded on rows created through the trigger endpoint.
pub const REQUESTED_BY_API: &str = "api";

/// Outcome of a trigger the runner accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    pub runner_instance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOutcome {
    pub job_id: JobId,
}

enum RunnerAccess {
    Available(Arc<dyn RunnerClient>),
    Unavailable(String),
}

/// Coordinates the control plane's side of the job lifecycle.
pub struct JobOrchestrator {
    jobs: Arc<dyn JobRepo>,
    events: Arc<dyn JobEventRepo>,
    runner: RunnerAccess,
}

impl JobOrchestrator {
    /// Orchestrator that forwards triggers to `runner`.
    pub fn new(
        jobs: Arc<dyn JobRepo>,
        events: Arc<dyn JobEventRepo>,
        runner: Arc<dyn RunnerClient>,
    ) -> Self {
        Self {
            jobs,
            events,
            runner: RunnerAccess::Available(runner),
        }
    }

    /// Orchestrator whose triggers are refused with `reason`, before any
    /// store write. Every other operation still works.
    pub fn without_runner(
        jobs: Arc<dyn JobRepo>,
        events: Arc<dyn JobEventRepo>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            events,
            runner: RunnerAccess::Unavailable(reason.into()),
        }
    }

    /// Record a `queued` job without contacting the runner.
    pub async fn create_job(
        &self,
        job_type: &str,
        payload: Option<Value>,
        requested_by: Option<String>,
    ) -> Result<Job> {
        let job_type = validate_job_type(job_type)?;
        let job = self
            .jobs
            .create(NewJob {
                job_type: job_type.to_string(),
                payload,
                requested_by,
            })
            .await?;
        info!(job_id = %job.id, job_type = %job.job_type, "Created job");
        self.record_event(job.job_id(), event_type::CREATED, None, None)
            .await;
        Ok(job)
    }

    /// Create a job and forward it to the runner.
    pub async fn trigger_runner(
        &self,
        job_type: &str,
        payload: Option<Value>,
    ) -> Result<TriggerOutcome> {
        let runner = match &self.runner {
            RunnerAccess::Available(runner) => runner.clone(),
            RunnerAccess::Unavailable(reason) => {
                return Err(Error::ServiceUnavailable(reason.clone()));
            }
        };
        let job_type = validate_job_type(job_type)?;

        // Must commit before the runner is called; the runner writes to this row.
        let job = self
            .jobs
            .create(NewJob {
                job_type: job_type.to_string(),
                payload: payload.clone(),
                requested_by: Some(REQUESTED_BY_API.to_string()),
            })
            .await?;
        let job_id = job.job_id();
        self.record_event(job_id, event_type::CREATED, None, None)
            .await;

        let request = ExecuteRequest {
            job_id: job_id.to_string(),
            job_type: job_type.to_string(),
            payload: payload.unwrap_or_else(|| json!({})),
        };

        info!(job_id = %job_id, job_type = %job_type, "Dispatching job to runner");
        self.record_event(job_id, event_type::DISPATCHED, None, None)
            .await;

        match runner.execute(&request).await {
            Ok(accepted) => {
                // The runner has already written `running` itself; this write
                // must not regress a row it has since finished.
                let affected = self
                    .jobs
                    .update_status(
                        job_id,
                        &JobStatus::NON_TERMINAL,
                        StatusChange::running(accepted.runner_instance.clone()),
                    )
                    .await?;
                if affected == 0 {
                    warn!(job_id = %job_id, "Job already terminal when runner acceptance was recorded");
                }
                info!(
                    job_id = %job_id,
                    runner_instance = ?accepted.runner_instance,
                    "Job accepted by runner"
                );
                self.record_event(
                    job_id,
                    event_type::ACCEPTED,
                    None,
                    Some(json!({ "runner_instance": accepted.runner_instance })),
                )
                .await;

                Ok(TriggerOutcome {
                    job_id,
                    status: JobStatus::Running,
                    runner_instance: accepted.runner_instance,
                })
            }
            Err(call_err) => {
                let summary = call_err.to_string();
                error!(job_id = %job_id, error = %summary, "Runner call failed");

                match self
                    .jobs
                    .update_status(
                        job_id,
                        &JobStatus::NON_TERMINAL,
                        StatusChange::failed(&summary),
                    )
                    .await
                {
                    Ok(0) => {
                        warn!(job_id = %job_id, "Job already terminal when runner failure was recorded")
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Failed to mark job failed after runner call failure")
                    }
                }
                self.record_event(
                    job_id,
                    event_type::DISPATCH_FAILED,
                    Some(&bound_error(&summary)),
                    None,
                )
                .await;

                Err(Error::Upstream(summary))
            }
        }
    }

    /// Record cancellation intent on a non-terminal job. Advisory only: the
    /// status is unchanged and nothing stops a running handler.
    pub async fn cancel(&self, job_id: JobId) -> Result<CancelOutcome> {
        let job = self.jobs.get(job_id).await?;
        if job.status.is_terminal() {
            return Err(Error::Conflict("Cannot cancel completed job".to_string()));
        }

        let affected = self.jobs.annotate_cancel(job_id, CANCEL_MESSAGE).await?;
        if affected == 0 {
            // Finished between the read and the write.
            return Err(Error::Conflict("Cannot cancel completed job".to_string()));
        }

        info!(job_id = %job_id, "Cancellation intent recorded");
        self.record_event(job_id, event_type::CANCEL_REQUESTED, Some(CANCEL_MESSAGE), None)
            .await;
        Ok(CancelOutcome { job_id })
    }

    pub async fn get(&self, job_id: JobId) -> Result<Job> {
        Ok(self.jobs.get(job_id).await?)
    }

    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        Ok(self.jobs.list(filter).await?)
    }

    pub async fn events(&self, job_id: JobId) -> Result<Vec<JobEvent>> {
        // 404 for unknown jobs rather than an empty timeline.
        self.jobs.get(job_id).await?;
        Ok(self.events.list_for_job(job_id).await?)
    }

    async fn record_event(
        &self,
        job_id: JobId,
        kind: &str,
        message: Option<&str>,
        data: Option<Value>,
    ) {
        if let Err(e) = self.events.append(job_id, kind, message, data).await {
            warn!(job_id = %job_id, event = kind, error = %e, "Failed to record job event");
        }
    }
}

fn validate_job_type(job_type: &str) -> Result<&str> {
    let job_type = job_type.trim();
    if job_type.is_empty() {
        return Err(Error::InvalidInput("job_type is required".to_string()));
    }
    Ok(job_type)
}
