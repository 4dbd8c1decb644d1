//! Runner application state.

use opsrunner_config::{RunnerConfig, Secret};
use opsrunner_core::HandlerRegistry;
use opsrunner_db::{PgJobEventRepo, PgJobRepo};
use sqlx::PgPool;
use std::sync::Arc;

use crate::RunnerExecutor;

/// Shared runner state.
#[derive(Clone)]
pub struct RunnerState {
    pub executor: Arc<RunnerExecutor>,
    pub token: Secret,
}

impl RunnerState {
    pub fn new(executor: Arc<RunnerExecutor>, token: Secret) -> Self {
        Self { executor, token }
    }

    /// State backed by Postgres with the default handlers.
    pub fn from_pool(pool: PgPool, config: &RunnerConfig) -> Self {
        let executor = RunnerExecutor::new(
            Arc::new(PgJobRepo::new(pool.clone())),
            Arc::new(PgJobEventRepo::new(pool)),
            Arc::new(HandlerRegistry::with_defaults()),
            config.allowlist.clone(),
            config.instance.clone(),
        );
        Self::new(Arc::new(executor), config.runner_token.clone())
    }
}
