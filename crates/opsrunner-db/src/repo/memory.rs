//! In-memory job store.
//!
//! Mirrors the conditional-update semantics of the Postgres repositories so
//! the orchestrator and runner can be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use opsrunner_core::{JobId, JobStatus};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::event::{JobEvent, JobEventRepo};
use super::job::{Job, JobFilter, JobRepo, NewJob, StatusChange};
use crate::{DbError, DbResult};

#[derive(Default)]
pub struct MemoryJobRepo {
    jobs: RwLock<HashMap<uuid::Uuid, Job>>,
    events: RwLock<Vec<JobEvent>>,
    fail_writes: AtomicBool,
}

impl MemoryJobRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail as if the store were unreachable.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert a row as-is, bypassing `create`.
    pub async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    fn check_writable(&self) -> DbResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl JobRepo for MemoryJobRepo {
    async fn create(&self, new_job: NewJob) -> DbResult<Job> {
        self.check_writable()?;
        let now = Utc::now();
        let job = Job {
            id: uuid::Uuid::now_v7(),
            job_type: new_job.job_type,
            status: JobStatus::Queued,
            requested_by: new_job.requested_by,
            payload: new_job.payload,
            result: None,
            error: None,
            runner_instance: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        self.jobs
            .read()
            .await
            .get(id.as_uuid())
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))
    }

    async fn update_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        change: StatusChange,
    ) -> DbResult<u64> {
        self.check_writable()?;
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id.as_uuid()) {
            Some(job) if change.permitted_sources(from).contains(&job.status) => {
                change.apply(job, Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn annotate_cancel(&self, id: JobId, message: &str) -> DbResult<u64> {
        self.check_writable()?;
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id.as_uuid()) {
            Some(job) if !job.status.is_terminal() => {
                job.error = Some(opsrunner_core::bounds::bound_error(message));
                job.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn list(&self, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| filter.status.is_none_or(|s| job.status == s))
            .filter(|job| {
                filter
                    .job_type
                    .as_deref()
                    .is_none_or(|t| job.job_type == t)
            })
            .filter(|job| filter.since.is_none_or(|since| job.created_at >= since))
            .cloned()
            .collect();
        // UUIDv7 ids break ties between rows created in the same instant.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(filter.effective_limit() as usize);
        Ok(matching)
    }
}

#[async_trait]
impl JobEventRepo for MemoryJobRepo {
    async fn append(
        &self,
        job_id: JobId,
        event_type: &str,
        message: Option<&str>,
        data: Option<Value>,
    ) -> DbResult<()> {
        self.check_writable()?;
        self.events.write().await.push(JobEvent {
            id: uuid::Uuid::now_v7(),
            job_id: *job_id.as_uuid(),
            event_type: event_type.to_string(),
            message: message.map(str::to_string),
            data,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_for_job(&self, job_id: JobId) -> DbResult<Vec<JobEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.job_id == *job_id.as_uuid())
            .cloned()
            .collect())
    }
}
