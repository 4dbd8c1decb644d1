//! Core domain types and traits for OpsRunner.
//!
//! This crate contains:
//! - Job identifiers and lifecycle status
//! - Result/error size bounding shared by every writer of a job row
//! - The closed set of job kinds and the handler registry
//! - The error taxonomy used across the control plane and runner
//! - The HTTP wire contract between the two processes

pub mod auth;
pub mod bounds;
pub mod error;
pub mod handler;
pub mod id;
pub mod job;
pub mod wire;

pub use error::{Error, Result};
pub use handler::{HandlerRegistry, JobHandler, JobKind};
pub use id::JobId;
pub use job::JobStatus;
