//! Audit of configuration keys against the deployment contract.

use crate::Settings;

pub const REQUIRED_CONTROL_PLANE_KEYS: [&str; 3] = ["APP_ENV", "DATABASE_URL", "SECRET_KEY"];

pub const REQUIRED_RUNNER_KEYS: [&str; 2] = ["RUNNER_TOKEN", "DATABASE_URL"];

pub const FEATURE_FLAGS: [&str; 6] = [
    "NEARSIGHT_ENABLED",
    "CAPTORATOR_ENABLED",
    "JOBS_ENABLED",
    "NOTION_ENABLED",
    "RUNNER_ENABLED",
    "FEATURE_METRICS",
];

/// Keys that must no longer be set.
pub const DEPRECATED_KEYS: [&str; 3] = ["SECONDARY_DATABASE_URL", "DATABASE_URL_SECONDARY", "VERCEL"];

/// Which process a configuration is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    ControlPlane,
    Runner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub missing_required: Vec<&'static str>,
    pub deprecated_present: Vec<&'static str>,
    /// `(flag, raw value)`; unset flags report `None`.
    pub feature_flags: Vec<(&'static str, Option<String>)>,
}

impl AuditReport {
    pub fn is_ok(&self) -> bool {
        self.missing_required.is_empty() && self.deprecated_present.is_empty()
    }
}

pub fn audit(settings: &Settings, target: Target) -> AuditReport {
    let required: &[&'static str] = match target {
        Target::ControlPlane => &REQUIRED_CONTROL_PLANE_KEYS,
        Target::Runner => &REQUIRED_RUNNER_KEYS,
    };

    AuditReport {
        missing_required: required
            .iter()
            .copied()
            .filter(|key| !settings.contains(key))
            .collect(),
        deprecated_present: DEPRECATED_KEYS
            .iter()
            .copied()
            .filter(|key| settings.contains(key))
            .collect(),
        feature_flags: FEATURE_FLAGS
            .iter()
            .map(|flag| (*flag, settings.get_string(flag)))
            .collect(),
    }
}
