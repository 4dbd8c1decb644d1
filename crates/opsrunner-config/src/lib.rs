//! Configuration for the OpsRunner control plane and runner.
//!
//! This crate is the only place that reads the process environment. Each
//! binary builds its config struct once at startup and passes it down.
//!
//! Values are looked up in the environment first, then in an optional KDL
//! file whose top-level nodes name settings in kebab case
//! (`database-url "postgresql://..."` for `DATABASE_URL`).

pub mod audit;
pub mod control_plane;
pub mod error;
pub mod runner;
pub mod source;

pub use audit::{AuditReport, Target, audit};
pub use control_plane::{ControlPlaneConfig, FeatureFlags, RunnerLink};
pub use error::{ConfigError, ConfigResult};
pub use runner::{Allowlist, RunnerConfig};
pub use source::{Secret, Settings};

/// Accept `postgres://` and `postgresql://` URLs, normalizing to the latter.
/// Anything else (including SQLite) is rejected.
pub fn normalize_database_url(raw: &str) -> ConfigResult<String> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(ConfigError::MissingField("DATABASE_URL".to_string()));
    }
    if url.starts_with("sqlite") {
        return Err(ConfigError::InvalidValue {
            field: "DATABASE_URL".to_string(),
            message: "PostgreSQL is required; SQLite is not allowed".to_string(),
        });
    }
    if let Some(rest) = url.strip_prefix("postgres://") {
        return Ok(format!("postgresql://{}", rest));
    }
    if url.starts_with("postgresql://") {
        return Ok(url.to_string());
    }
    Err(ConfigError::InvalidValue {
        field: "DATABASE_URL".to_string(),
        message: "must be a PostgreSQL connection string (postgresql:// or postgres://)"
            .to_string(),
    })
}
