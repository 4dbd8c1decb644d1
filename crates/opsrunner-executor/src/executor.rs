//! Runner-side job execution.
//!
//! `accept` performs the synchronous `running` write and schedules
//! `execute_async` on a detached task. The detached task never propagates an
//! error: it always ends in a terminal write attempt, and a failure of that
//! write is logged and swallowed, leaving the job `running`.

use opsrunner_config::Allowlist;
use opsrunner_core::job::CANCEL_MESSAGE;
use opsrunner_core::wire::ExecuteAccepted;
use opsrunner_core::{Error, HandlerRegistry, JobId, JobKind, JobStatus, Result};
use opsrunner_db::{JobEventRepo, JobRepo, StatusChange, event_type};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A validated execute request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteCommand {
    pub job_id: JobId,
    pub kind: JobKind,
    pub payload: Value,
}

/// How a background execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Succeeded,
    Failed { error: String },
    /// The row was missing or already terminal; nothing was written.
    NotApplied,
    /// The terminal write itself failed. The job stays `running`.
    WriteFailed { error: String },
}

/// Executes jobs handed over by the control plane.
pub struct RunnerExecutor {
    jobs: Arc<dyn JobRepo>,
    events: Arc<dyn JobEventRepo>,
    registry: Arc<HandlerRegistry>,
    allowlist: Allowlist,
    instance: String,
}

impl RunnerExecutor {
    pub fn new(
        jobs: Arc<dyn JobRepo>,
        events: Arc<dyn JobEventRepo>,
        registry: Arc<HandlerRegistry>,
        allowlist: Allowlist,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            events,
            registry,
            allowlist,
            instance: instance.into(),
        }
    }

    /// Identity written to `runner_instance`.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Validate a raw execute body. Nothing is written.
    pub fn validate(&self, body: &Value) -> Result<ExecuteCommand> {
        let job_id = non_empty_str(body, "job_id");
        let job_type = non_empty_str(body, "job_type");
        let (Some(job_id), Some(job_type)) = (job_id, job_type) else {
            return Err(Error::InvalidInput(
                "Missing required fields: job_id, job_type".to_string(),
            ));
        };

        let job_id: JobId = job_id
            .parse()
            .map_err(|_| Error::InvalidInput("Invalid job_id format".to_string()))?;

        let kind = self.allowlist.check(job_type).ok_or_else(|| {
            Error::Forbidden(format!("Job type '{}' not in allowlist", job_type))
        })?;

        let payload = body.get("payload").cloned().unwrap_or_else(|| json!({}));

        Ok(ExecuteCommand {
            job_id,
            kind,
            payload,
        })
    }

    /// Mark the job `running` and schedule its handler.
    ///
    /// If the `running` write fails nothing is scheduled and the error is
    /// returned. The returned handle may be dropped; the task keeps running.
    pub async fn accept(
        self: &Arc<Self>,
        command: ExecuteCommand,
    ) -> Result<(ExecuteAccepted, JoinHandle<Completion>)> {
        let ExecuteCommand {
            job_id,
            kind,
            payload,
        } = command;

        let affected = self
            .jobs
            .update_status(
                job_id,
                &JobStatus::NON_TERMINAL,
                StatusChange::running(Some(self.instance.clone())),
            )
            .await
            .map_err(|e| {
                error!(job_id = %job_id, error = %e, "Failed to mark job running");
                Error::Store(e.to_string())
            })?;

        if affected == 0 {
            warn!(
                job_id = %job_id,
                job_type = %kind,
                "No queued or running row for accepted job; executing anyway"
            );
        }
        info!(job_id = %job_id, job_type = %kind, runner_instance = %self.instance, "Accepted job");
        self.record_event(
            job_id,
            event_type::ACCEPTED,
            None,
            Some(json!({ "runner_instance": self.instance })),
        )
        .await;

        let executor = Arc::clone(self);
        let handle = tokio::spawn(async move { executor.execute_async(job_id, kind, payload).await });

        Ok((
            ExecuteAccepted::new(job_id.to_string(), kind.to_string(), self.instance.clone()),
            handle,
        ))
    }

    /// Run the handler for `kind` and write the terminal status.
    pub async fn execute_async(&self, job_id: JobId, kind: JobKind, payload: Value) -> Completion {
        let registry = Arc::clone(&self.registry);
        // A panicking handler surfaces as a JoinError instead of unwinding
        // through this task.
        let outcome = match tokio::spawn(async move { registry.dispatch(kind, payload).await }).await
        {
            Ok(outcome) => outcome,
            Err(join_err) => Err(Error::Handler(format!("handler panicked: {}", join_err))),
        };

        self.observe_cancellation(job_id).await;

        let change = match outcome {
            Ok(result) => StatusChange::succeeded(result),
            Err(e) => {
                warn!(job_id = %job_id, job_type = %kind, error = %e, "Job handler failed");
                StatusChange::failed(&e.to_string())
            }
        };
        let target = change.target();
        let stored_error = change.error().map(str::to_string);

        match self
            .jobs
            .update_status(job_id, &JobStatus::NON_TERMINAL, change)
            .await
        {
            Ok(0) => {
                warn!(job_id = %job_id, status = %target, "Job missing or already terminal; result dropped");
                Completion::NotApplied
            }
            Ok(_) => {
                info!(job_id = %job_id, job_type = %kind, status = %target, "Job finished");
                match stored_error {
                    None => {
                        self.record_event(job_id, event_type::SUCCEEDED, None, None)
                            .await;
                        Completion::Succeeded
                    }
                    Some(error) => {
                        self.record_event(job_id, event_type::FAILED, Some(&error), None)
                            .await;
                        Completion::Failed { error }
                    }
                }
            }
            Err(e) => {
                // Nothing retries this write; the row stays `running` until an
                // operator intervenes.
                error!(
                    job_id = %job_id,
                    status = %target,
                    error = %e,
                    "Failed to write terminal job status; job left running"
                );
                Completion::WriteFailed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Cancellation is advisory: it is logged, never enforced.
    async fn observe_cancellation(&self, job_id: JobId) {
        match self.jobs.get(job_id).await {
            Ok(job) if job.error.as_deref() == Some(CANCEL_MESSAGE) => {
                info!(job_id = %job_id, "Cancellation was requested; completing anyway");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not re-read job before completion");
            }
        }
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

fn non_empty_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
