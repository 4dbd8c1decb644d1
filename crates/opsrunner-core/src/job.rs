//! Job lifecycle status.
//!
//! A job moves forward only: `queued -> running -> {succeeded | failed}`,
//! with `queued -> failed` allowed when the runner could not be reached.
//! `succeeded` and `failed` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Annotation written to `error` when cancellation of a live job is requested.
pub const CANCEL_MESSAGE: &str = "Cancellation requested by user";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// States a job row may still be written from.
    pub const NON_TERMINAL: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether a write moving a row from `self` to `next` keeps the status
    /// monotonic. Re-writing `running` over `running` is allowed: the
    /// orchestrator's provisional write may land after the runner's own.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, _) => next != JobStatus::Queued,
            (JobStatus::Running, JobStatus::Queued) => false,
            (JobStatus::Running, _) => true,
            (JobStatus::Succeeded | JobStatus::Failed, _) => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::InvalidInput(format!("unknown job status: {}", other))),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ];

    #[test]
    fn test_terminal_states_never_transition() {
        for from in [JobStatus::Succeeded, JobStatus::Failed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_no_transition_regresses_to_queued() {
        for from in ALL {
            assert!(!from.can_transition_to(JobStatus::Queued));
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn test_status_string_form() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<JobStatus>().is_err());
        assert_eq!(
            serde_json::to_value(JobStatus::Succeeded).unwrap(),
            serde_json::json!("succeeded")
        );
    }
}
