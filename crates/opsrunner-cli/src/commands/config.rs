//! Configuration audit.

use anyhow::{Context, Result};
use clap::ValueEnum;
use opsrunner_config::{AuditReport, Settings, Target, audit as run_audit};
use std::path::Path;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AuditTarget {
    ControlPlane,
    Runner,
}

impl From<AuditTarget> for Target {
    fn from(target: AuditTarget) -> Self {
        match target {
            AuditTarget::ControlPlane => Target::ControlPlane,
            AuditTarget::Runner => Target::Runner,
        }
    }
}

/// Print the audit. Returns `false` when required keys are missing or
/// deprecated keys are set.
pub fn audit(target: AuditTarget, config: Option<&Path>) -> Result<bool> {
    let mut settings = Settings::from_env();
    if let Some(path) = config {
        settings = settings
            .merge_kdl_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    let report = run_audit(&settings, target.into());
    print!("{}", render(&report));
    Ok(report.is_ok())
}

fn render(report: &AuditReport) -> String {
    let mut out = String::new();

    if report.missing_required.is_empty() {
        out.push_str("Required keys: all present\n");
    } else {
        out.push_str("Missing required keys:\n");
        for key in &report.missing_required {
            out.push_str(&format!("  {}\n", key));
        }
    }

    if !report.deprecated_present.is_empty() {
        out.push_str("Deprecated keys set (remove them):\n");
        for key in &report.deprecated_present {
            out.push_str(&format!("  {}\n", key));
        }
    }

    out.push_str("Feature flags:\n");
    for (flag, value) in &report.feature_flags {
        out.push_str(&format!("  {} = {}\n", flag, value.as_deref().unwrap_or("(unset)")));
    }
    out
}
