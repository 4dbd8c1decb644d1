//! Control-plane API server for OpsRunner.
//!
//! Exposes the ops job endpoints under `/api/v1`, guarded by `X-Ops-Key`, and
//! unauthenticated health checks.

pub mod auth;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use state::AppState;
