//! Control-plane configuration.

use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::{ConfigError, ConfigResult, Secret, Settings, normalize_database_url};

/// Bounds on the outbound runner call deadline, in seconds.
pub const RUNNER_TIMEOUT_MIN_SECS: u64 = 5;
pub const RUNNER_TIMEOUT_MAX_SECS: u64 = 10;

/// Feature flags exposed on the debug endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub nearsight: bool,
    pub captorator: bool,
    pub jobs: bool,
    pub notion: bool,
    pub runner: bool,
    pub metrics: bool,
}

impl FeatureFlags {
    /// `(env key, enabled)` pairs in a stable order.
    pub fn entries(&self) -> [(&'static str, bool); 6] {
        [
            ("NEARSIGHT_ENABLED", self.nearsight),
            ("CAPTORATOR_ENABLED", self.captorator),
            ("JOBS_ENABLED", self.jobs),
            ("NOTION_ENABLED", self.notion),
            ("RUNNER_ENABLED", self.runner),
            ("FEATURE_METRICS", self.metrics),
        ]
    }
}

/// How the control plane reaches the runner.
#[derive(Debug, Clone)]
pub struct RunnerLink {
    pub enabled: bool,
    pub url: Option<Url>,
    pub token: Option<Secret>,
    pub timeout: Duration,
}

impl RunnerLink {
    /// Why a trigger cannot be forwarded, if it cannot.
    pub fn unavailable_reason(&self) -> Option<&'static str> {
        if !self.enabled {
            return Some("Runner integration not enabled");
        }
        if self.url.is_none() || self.token.is_none() {
            return Some("Runner not configured (RUNNER_URL/RUNNER_TOKEN_OUTBOUND)");
        }
        None
    }
}

/// Control-plane configuration.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub app_env: String,
    pub database_url: Secret,
    pub secret_key: Secret,
    pub log_level: String,
    /// Emit JSON log lines (`LOG_FORMAT=json`).
    pub log_json: bool,
    pub db_schema: String,
    pub features: FeatureFlags,
    pub ops_api_key: Option<Secret>,
    pub runner: RunnerLink,
    pub control_plane_base_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub bind_addr: SocketAddr,
}

impl ControlPlaneConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:3000";

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        let app_env = settings.require("APP_ENV")?.to_string();
        let database_url = normalize_database_url(settings.require("DATABASE_URL")?)?;
        let secret_key = Secret::new(settings.require("SECRET_KEY")?);

        let features = FeatureFlags {
            nearsight: settings.bool_or("NEARSIGHT_ENABLED", false)?,
            captorator: settings.bool_or("CAPTORATOR_ENABLED", false)?,
            jobs: settings.bool_or("JOBS_ENABLED", false)?,
            notion: settings.bool_or("NOTION_ENABLED", false)?,
            runner: settings.bool_or("RUNNER_ENABLED", false)?,
            metrics: settings.bool_or("FEATURE_METRICS", false)?,
        };

        let runner_url = settings
            .get("RUNNER_URL")
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
                    field: "RUNNER_URL".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()?;

        let timeout_secs = settings
            .u64_or("RUNNER_TIMEOUT_SECS", RUNNER_TIMEOUT_MAX_SECS)?
            .clamp(RUNNER_TIMEOUT_MIN_SECS, RUNNER_TIMEOUT_MAX_SECS);

        let runner = RunnerLink {
            enabled: features.runner,
            url: runner_url,
            token: settings.get("RUNNER_TOKEN_OUTBOUND").map(Secret::new),
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            app_env,
            database_url: Secret::new(database_url),
            secret_key,
            log_level: settings.get("LOG_LEVEL").unwrap_or("info").to_string(),
            log_json: settings
                .get("LOG_FORMAT")
                .is_some_and(|f| f.eq_ignore_ascii_case("json")),
            db_schema: settings.get("DB_SCHEMA").unwrap_or("public").to_string(),
            features,
            ops_api_key: settings.get("OPS_API_KEY").map(Secret::new),
            runner,
            control_plane_base_url: settings.get_string("CONTROL_PLANE_BASE_URL"),
            cors_origins: settings.list("CORS_ORIGINS"),
            bind_addr: parse_bind_addr(settings, Self::DEFAULT_BIND_ADDR)?,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.app_env.as_str(), "prod" | "production")
    }
}

pub(crate) fn parse_bind_addr(settings: &Settings, default: &str) -> ConfigResult<SocketAddr> {
    let raw = settings.get("BIND_ADDR").unwrap_or(default);
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        field: "BIND_ADDR".to_string(),
        message: format!("expected host:port, got '{}'", raw),
    })
}
