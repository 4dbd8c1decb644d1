//! Control-plane job orchestration for OpsRunner.
//!
//! Creates job rows, hands them to the runner over HTTP and reconciles the
//! row with the outcome of that call.

pub mod client;
pub mod orchestrator;

pub use client::{HttpRunnerClient, RunnerCallError, RunnerClient};
pub use orchestrator::{
    CANCEL_MESSAGE, CancelOutcome, JobOrchestrator, REQUESTED_BY_API, TriggerOutcome,
};
