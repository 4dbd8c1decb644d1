//! Repository traits and implementations.

pub mod event;
pub mod job;
pub mod memory;

pub use event::{JobEvent, JobEventRepo, PgJobEventRepo, event_type};
pub use job::{
    DEFAULT_LIST_LIMIT, Job, JobFilter, JobRepo, MAX_LIST_LIMIT, NewJob, PgJobRepo, StatusChange,
    clamp_limit,
};
pub use memory::MemoryJobRepo;
