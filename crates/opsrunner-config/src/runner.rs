//! Runner service configuration.

use opsrunner_core::JobKind;
use std::net::SocketAddr;
use tracing::warn;

use crate::control_plane::parse_bind_addr;
use crate::{ConfigResult, Secret, Settings, normalize_database_url};

/// Job kinds the runner is permitted to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allowlist {
    kinds: Vec<JobKind>,
}

impl Allowlist {
    /// Every known job kind.
    pub fn all() -> Self {
        Self {
            kinds: JobKind::ALL.to_vec(),
        }
    }

    pub fn new(kinds: impl IntoIterator<Item = JobKind>) -> Self {
        let mut list = Vec::new();
        for kind in kinds {
            if !list.contains(&kind) {
                list.push(kind);
            }
        }
        Self { kinds: list }
    }

    /// Parse configured names. Names that match no known job kind are dropped
    /// with a warning; they could never be dispatched anyway.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let kinds = names.iter().filter_map(|name| {
            let name = name.as_ref();
            match name.parse::<JobKind>() {
                Ok(kind) => Some(kind),
                Err(_) => {
                    warn!(job_type = %name, "Ignoring unknown job type in RUNNER_ALLOWLIST");
                    None
                }
            }
        });
        Self::new(kinds)
    }

    /// The kind named by `job_type`, if it is permitted.
    pub fn check(&self, job_type: &str) -> Option<JobKind> {
        job_type
            .parse::<JobKind>()
            .ok()
            .filter(|kind| self.kinds.contains(kind))
    }

    pub fn kinds(&self) -> &[JobKind] {
        &self.kinds
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::all()
    }
}

/// Runner service configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub runner_token: Secret,
    pub database_url: Secret,
    pub allowlist: Allowlist,
    pub db_schema: String,
    pub allowed_origins: Vec<String>,
    /// Identity written to `runner_instance` on every job this process accepts.
    pub instance: String,
    pub log_level: String,
    /// Emit JSON log lines (`LOG_FORMAT=json`).
    pub log_json: bool,
    pub bind_addr: SocketAddr,
}

impl RunnerConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:8081";
    pub const DEFAULT_INSTANCE: &'static str = "default";

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let runner_token = Secret::new(settings.require("RUNNER_TOKEN")?);
        let database_url = normalize_database_url(settings.require("DATABASE_URL")?)?;

        // An unset or blank allowlist permits every known kind.
        let names = settings.list("RUNNER_ALLOWLIST");
        let allowlist = if names.is_empty() {
            Allowlist::all()
        } else {
            Allowlist::from_names(&names)
        };

        Ok(Self {
            runner_token,
            database_url: Secret::new(database_url),
            allowlist,
            db_schema: settings.get("RUNNER_DB_SCHEMA").unwrap_or("public").to_string(),
            allowed_origins: settings.list("RUNNER_ALLOWED_ORIGINS"),
            instance: settings
                .get("RUNNER_INSTANCE")
                .unwrap_or(Self::DEFAULT_INSTANCE)
                .to_string(),
            log_level: settings.get("LOG_LEVEL").unwrap_or("info").to_string(),
            log_json: settings
                .get("LOG_FORMAT")
                .is_some_and(|f| f.eq_ignore_ascii_case("json")),
            bind_addr: parse_bind_addr(settings, Self::DEFAULT_BIND_ADDR)?,
        })
    }
}
