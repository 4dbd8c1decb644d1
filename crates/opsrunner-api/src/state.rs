//! Application state.

use opsrunner_config::ControlPlaneConfig;
use opsrunner_db::{JobEventRepo, JobRepo, PgJobEventRepo, PgJobRepo};
use opsrunner_scheduler::{HttpRunnerClient, JobOrchestrator, RunnerCallError};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ControlPlaneConfig>,
    pub orchestrator: Arc<JobOrchestrator>,
    /// `None` when the store is not backed by Postgres; `debug/db` then
    /// reports the store as unreachable.
    pub pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: ControlPlaneConfig,
        orchestrator: JobOrchestrator,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            pool,
        }
    }

    /// State backed by Postgres, with the HTTP runner client when the runner
    /// link is enabled and configured.
    pub fn from_pool(pool: PgPool, config: ControlPlaneConfig) -> Result<Self, RunnerCallError> {
        let jobs: Arc<dyn JobRepo> = Arc::new(PgJobRepo::new(pool.clone()));
        let events: Arc<dyn JobEventRepo> = Arc::new(PgJobEventRepo::new(pool.clone()));

        let client = match config.runner.unavailable_reason() {
            None => HttpRunnerClient::from_link(&config.runner)?,
            Some(_) => None,
        };
        let orchestrator = match (client, config.runner.unavailable_reason()) {
            (Some(client), _) => JobOrchestrator::new(jobs, events, Arc::new(client)),
            (None, reason) => {
                let reason = reason.unwrap_or("Runner integration not enabled");
                warn!(reason = %reason, "Runner triggers disabled");
                JobOrchestrator::without_runner(jobs, events, reason)
            }
        };

        Ok(Self::new(config, orchestrator, Some(pool)))
    }
}
