//! Job event timeline.
//!
//! Events are diagnostic only; nothing in the lifecycle reads them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsrunner_core::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbResult;

/// Event type names written by the control plane and runner.
pub mod event_type {
    pub const CREATED: &str = "created";
    pub const DISPATCHED: &str = "dispatched";
    pub const ACCEPTED: &str = "accepted";
    pub const DISPATCH_FAILED: &str = "dispatch_failed";
    pub const CANCEL_REQUESTED: &str = "cancel_requested";
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED: &str = "failed";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobEvent {
    pub id: uuid::Uuid,
    pub job_id: uuid::Uuid,
    pub event_type: String,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobEventRepo: Send + Sync {
    async fn append(
        &self,
        job_id: JobId,
        event_type: &str,
        message: Option<&str>,
        data: Option<Value>,
    ) -> DbResult<()>;

    /// Events for a job, oldest first.
    async fn list_for_job(&self, job_id: JobId) -> DbResult<Vec<JobEvent>>;
}

/// PostgreSQL implementation of JobEventRepo.
pub struct PgJobEventRepo {
    pool: PgPool,
}

impl PgJobEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobEventRepo for PgJobEventRepo {
    async fn append(
        &self,
        job_id: JobId,
        event_type: &str,
        message: Option<&str>,
        data: Option<Value>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ops_job_events (id, job_id, event_type, message, data, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(uuid::Uuid::now_v7())
        .bind(job_id.as_uuid())
        .bind(event_type)
        .bind(message)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_job(&self, job_id: JobId) -> DbResult<Vec<JobEvent>> {
        let events = sqlx::query_as::<_, JobEvent>(
            "SELECT * FROM ops_job_events WHERE job_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(job_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}
