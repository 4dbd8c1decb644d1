//! Job kinds and the handler registry.
//!
//! The set of job kinds is closed; a configured allowlist narrows it further
//! at the runner. Handlers are opaque `payload -> result` functions that may
//! fail.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{Error, Result};

/// Every job kind the runner knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    NearsightCollectRefresh,
    CaptoratorCompose,
    MetricsRefresh,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::NearsightCollectRefresh,
        JobKind::CaptoratorCompose,
        JobKind::MetricsRefresh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::NearsightCollectRefresh => "nearsight_collect_refresh",
            JobKind::CaptoratorCompose => "captorator_compose",
            JobKind::MetricsRefresh => "metrics_refresh",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownJobType(s.to_string()))
    }
}

/// A job handler.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run the job. `payload` is the document stored on the job row, passed
    /// through verbatim.
    async fn run(&self, kind: JobKind, payload: Value) -> Result<Value>;
}

/// Placeholder handler: validates its payload and reports that the job has
/// no implementation yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotImplementedHandler;

#[async_trait]
impl JobHandler for NotImplementedHandler {
    async fn run(&self, kind: JobKind, payload: Value) -> Result<Value> {
        let payload = match payload {
            Value::Null => Value::Object(Map::new()),
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(Error::InvalidInput(format!(
                    "payload for {} must be an object, got {}",
                    kind, other
                )));
            }
        };

        Ok(json!({
            "not_implemented": true,
            "job_type": kind.as_str(),
            "message": "Job handler not yet implemented",
            "payload": payload,
        }))
    }
}

/// Maps each job kind to its handler.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// An empty registry. Dispatch fails for every kind until handlers are
    /// registered.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A registry with the placeholder handler bound to every kind.
    pub fn with_defaults() -> Self {
        let handler: Arc<dyn JobHandler> = Arc::new(NotImplementedHandler);
        let mut registry = Self::empty();
        for kind in JobKind::ALL {
            registry.register(kind, handler.clone());
        }
        registry
    }

    pub fn register(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Run the handler registered for `kind`.
    pub async fn dispatch(&self, kind: JobKind, payload: Value) -> Result<Value> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| Error::UnknownJobType(kind.to_string()))?;
        handler.run(kind, payload).await
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
