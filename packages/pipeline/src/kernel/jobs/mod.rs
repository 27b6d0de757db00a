//! Job infrastructure for background command execution.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`PostgresJobQueue`] - Database-backed job queue
//! - [`JobRegistry`] - Maps job type strings to typed handlers
//! - [`JobRunner`] - Long-running service that polls and executes jobs
//! - [`Job`] - Job model with CRUD operations
//!
//! # Architecture
//!
//! ```text
//! Domain code calls deps.job_queue.enqueue(cmd)
//!     │
//!     └─► Insert to jobs table (idempotency-key dedup)
//!
//! JobRunner
//!     │
//!     ├─► Poll DB (claim jobs via FOR UPDATE SKIP LOCKED)
//!     ├─► Deserialize command from JSON (JobRegistry)
//!     ├─► handler(command, deps)
//!     └─► Mark succeeded/failed (queue handles retries + dead letter)
//! ```
//!
//! # Domain-Specific Background Commands
//!
//! Background commands and handlers live in their respective domains.
//! This module only provides the infrastructure - business logic stays
//! in domains.

mod job;
mod queue;
mod registry;
mod runner;

pub use job::{ErrorKind, Job, JobPriority, JobStatus};
pub use queue::{ClaimedJob, CommandMeta, EnqueueResult, PostgresJobQueue};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use runner::{JobRunner, JobRunnerConfig};
