//! HTTP client for the runner service.

use async_trait::async_trait;
use opsrunner_config::{RunnerLink, Secret};
use opsrunner_core::bounds::truncate_chars;
use opsrunner_core::wire::{
    EXECUTE_PATH, ExecuteAccepted, ExecuteRequest, HEALTH_PATH, RUNNER_TOKEN_HEADER, RunnerHealth,
};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest slice of a non-2xx body kept in the error.
const MAX_BODY_EXCERPT: usize = 300;

/// Why a call to the runner did not produce an accepted response.
#[derive(Debug, Error)]
pub enum RunnerCallError {
    #[error("runner call timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not connect to runner: {0}")]
    Connect(String),

    #[error("runner returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed runner response: {0}")]
    Malformed(String),

    #[error("runner request failed: {0}")]
    Request(String),
}

/// Transport to the runner's execute and health endpoints.
#[async_trait]
pub trait RunnerClient: Send + Sync {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteAccepted, RunnerCallError>;

    async fn health(&self) -> Result<RunnerHealth, RunnerCallError>;
}

/// `reqwest` implementation of RunnerClient.
pub struct HttpRunnerClient {
    client: reqwest::Client,
    base_url: String,
    token: Secret,
    timeout: Duration,
}

impl HttpRunnerClient {
    pub fn new(base_url: &Url, token: Secret, timeout: Duration) -> Result<Self, RunnerCallError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("opsrunner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RunnerCallError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            token,
            timeout,
        })
    }

    /// Build a client from the control-plane runner settings. `None` when the
    /// URL or token is missing.
    pub fn from_link(link: &RunnerLink) -> Result<Option<Self>, RunnerCallError> {
        match (&link.url, &link.token) {
            (Some(url), Some(token)) => Self::new(url, token.clone(), link.timeout).map(Some),
            _ => Ok(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify(&self, err: reqwest::Error) -> RunnerCallError {
        if err.is_timeout() {
            RunnerCallError::Timeout(self.timeout)
        } else if err.is_connect() {
            RunnerCallError::Connect(err.to_string())
        } else if err.is_decode() {
            RunnerCallError::Malformed(err.to_string())
        } else {
            RunnerCallError::Request(err.to_string())
        }
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RunnerCallError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RunnerCallError::Status {
            status: status.as_u16(),
            body: truncate_chars(&body, MAX_BODY_EXCERPT),
        })
    }
}

#[async_trait]
impl RunnerClient for HttpRunnerClient {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecuteAccepted, RunnerCallError> {
        let response = self
            .client
            .post(self.url(EXECUTE_PATH))
            .header(RUNNER_TOKEN_HEADER, self.token.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let response = self.check_status(response).await?;
        let accepted: ExecuteAccepted = response.json().await.map_err(|e| self.classify(e))?;

        if accepted.status != ExecuteAccepted::STATUS {
            return Err(RunnerCallError::Malformed(format!(
                "expected status '{}', got '{}'",
                ExecuteAccepted::STATUS,
                accepted.status
            )));
        }
        Ok(accepted)
    }

    async fn health(&self) -> Result<RunnerHealth, RunnerCallError> {
        let response = self
            .client
            .get(self.url(HEALTH_PATH))
            .header(RUNNER_TOKEN_HEADER, self.token.expose())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let response = self.check_status(response).await?;
        response.json().await.map_err(|e| self.classify(e))
    }
}
