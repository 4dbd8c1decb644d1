//! Job repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsrunner_core::bounds::{bound_error, bound_result};
use opsrunner_core::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{DbError, DbResult};

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Effective page size for a list query: missing or below 1 means the
/// default, anything above the cap is cut to the cap.
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    match requested {
        Some(limit) if limit > MAX_LIST_LIMIT => MAX_LIST_LIMIT,
        Some(limit) if limit >= 1 => limit,
        _ => DEFAULT_LIST_LIMIT,
    }
}

/// A job record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: uuid::Uuid,
    pub job_type: String,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub requested_by: Option<String>,
    pub payload: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub runner_instance: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn job_id(&self) -> JobId {
        JobId::from_uuid(self.id)
    }
}

/// Fields supplied when a job row is created. Status always starts `queued`.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub job_type: String,
    pub payload: Option<Value>,
    pub requested_by: Option<String>,
}

/// Filters for listing jobs, newest first.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl JobFilter {
    pub fn effective_limit(&self) -> i64 {
        clamp_limit(self.limit)
    }
}

/// A status write. Constructors apply the size bounds, so an unbounded
/// result or error cannot reach the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    target: JobStatus,
    runner_instance: Option<String>,
    result: Option<Value>,
    error: Option<String>,
}

impl StatusChange {
    /// Mark the job accepted by a runner.
    pub fn running(runner_instance: Option<String>) -> Self {
        Self {
            target: JobStatus::Running,
            runner_instance,
            result: None,
            error: None,
        }
    }

    /// Record a handler result; clears any earlier `error` annotation.
    pub fn succeeded(result: Value) -> Self {
        Self {
            target: JobStatus::Succeeded,
            runner_instance: None,
            result: Some(bound_result(result)),
            error: None,
        }
    }

    /// Record a failure description.
    pub fn failed(error: &str) -> Self {
        Self {
            target: JobStatus::Failed,
            runner_instance: None,
            result: None,
            error: Some(bound_error(error)),
        }
    }

    pub fn target(&self) -> JobStatus {
        self.target
    }

    pub fn runner_instance(&self) -> Option<&str> {
        self.runner_instance.as_deref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The members of `from` this change may move a row out of without
    /// breaking monotonicity.
    pub fn permitted_sources(&self, from: &[JobStatus]) -> Vec<JobStatus> {
        from.iter()
            .copied()
            .filter(|status| status.can_transition_to(self.target))
            .collect()
    }

    /// Apply this change to an in-memory record.
    pub(crate) fn apply(&self, job: &mut Job, now: DateTime<Utc>) {
        job.status = self.target;
        job.updated_at = now;
        if let Some(instance) = &self.runner_instance {
            job.runner_instance = Some(instance.clone());
        }
        match self.target {
            JobStatus::Succeeded => {
                job.result = self.result.clone();
                job.error = None;
            }
            JobStatus::Failed => {
                job.result = None;
                job.error = self.error.clone();
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
    }
}

#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Insert a new `queued` job.
    async fn create(&self, new_job: NewJob) -> DbResult<Job>;

    async fn get(&self, id: JobId) -> DbResult<Job>;

    /// Conditionally move a job to `change.target()` if its current status is
    /// one of `from`. Returns the number of rows affected; zero means the row
    /// is missing or was not in an allowed state, which is not an error.
    async fn update_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        change: StatusChange,
    ) -> DbResult<u64>;

    /// Record cancellation intent in `error` on a non-terminal job without
    /// touching its status. Returns the number of rows affected.
    async fn annotate_cancel(&self, id: JobId, message: &str) -> DbResult<u64>;

    async fn list(&self, filter: &JobFilter) -> DbResult<Vec<Job>>;
}

/// PostgreSQL implementation of JobRepo.
pub struct PgJobRepo {
    pool: PgPool,
}

impl PgJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_names(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn create(&self, new_job: NewJob) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO ops_jobs (id, job_type, status, requested_by, payload, created_at, updated_at)
            VALUES ($1, $2, 'queued', $3, $4, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(&new_job.job_type)
        .bind(&new_job.requested_by)
        .bind(&new_job.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM ops_jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {}", id)))?;
        Ok(job)
    }

    async fn update_status(
        &self,
        id: JobId,
        from: &[JobStatus],
        change: StatusChange,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ops_jobs
            SET status = $2,
                updated_at = NOW(),
                runner_instance = COALESCE($3, runner_instance),
                result = CASE
                    WHEN $2 = 'succeeded' THEN $4
                    WHEN $2 = 'failed' THEN NULL
                    ELSE result
                END,
                error = CASE
                    WHEN $2 = 'failed' THEN $5
                    WHEN $2 = 'succeeded' THEN NULL
                    ELSE error
                END
            WHERE id = $1 AND status = ANY($6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(change.target().as_str())
        .bind(change.runner_instance())
        .bind(change.result())
        .bind(change.error())
        .bind(status_names(&change.permitted_sources(from)))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn annotate_cancel(&self, id: JobId, message: &str) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ops_jobs SET error = $2, updated_at = NOW()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id.as_uuid())
        .bind(bound_error(message))
        .bind(status_names(&JobStatus::NON_TERMINAL))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list(&self, filter: &JobFilter) -> DbResult<Vec<Job>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM ops_jobs WHERE TRUE");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(job_type) = &filter.job_type {
            query.push(" AND job_type = ").push_bind(job_type.clone());
        }
        if let Some(since) = filter.since {
            query.push(" AND created_at >= ").push_bind(since);
        }
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.effective_limit());

        let jobs = query.build_query_as::<Job>().fetch_all(&self.pool).await?;
        Ok(jobs)
    }
}
