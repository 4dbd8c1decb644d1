//! HTTP+JSON contract between the control plane and the runner.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shared-secret header carried on every runner call.
pub const RUNNER_TOKEN_HEADER: &str = "X-Runner-Token";

pub const EXECUTE_PATH: &str = "/runner/execute";
pub const HEALTH_PATH: &str = "/healthz";

/// Body of `POST /runner/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub job_id: String,
    pub job_type: String,
    pub payload: Value,
}

/// Body of a `200` reply to `POST /runner/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAccepted {
    pub status: String,
    pub job_id: String,
    pub job_type: String,
    #[serde(default)]
    pub runner_instance: Option<String>,
}

impl ExecuteAccepted {
    pub const STATUS: &'static str = "accepted";

    pub fn new(job_id: String, job_type: String, runner_instance: String) -> Self {
        Self {
            status: Self::STATUS.to_string(),
            job_id,
            job_type,
            runner_instance: Some(runner_instance),
        }
    }
}

/// Body of a `200` reply to `GET /healthz` on the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerHealth {
    pub status: String,
    pub runner_instance: String,
}
