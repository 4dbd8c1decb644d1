//! Runner service for OpsRunner.
//!
//! Accepts execute requests from the control plane, marks the job `running`
//! before replying, then runs the handler on a detached task that always
//! ends with an attempt to write a terminal status.

pub mod error;
pub mod executor;
pub mod routes;
pub mod state;

pub use executor::{Completion, ExecuteCommand, RunnerExecutor};
pub use state::RunnerState;
