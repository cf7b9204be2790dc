//! # Inventio Scheduler
//!
//! An in-process, ephemeral job registry for long-running LLM work.
//!
//! ## Features
//!
//! - **At most one entry per job key**: duplicate schedules return a conflict, never a second run
//! - **Triggers**: immediate, delayed, and fixed-interval with misfire grace
//! - **Two pools**: cooperative tokio tasks and a bounded blocking thread pool
//! - **Pause/resume and graceful shutdown**
//! - **Reliability helpers**: retry policy with backoff and jitter, token-bucket rate limiter
//!
//! Nothing here survives a restart. Recovering work lost with the process is
//! the job of the caller's reconciliation loop.
//!
//! ## Example
//!
//! ```ignore
//! use inventio_scheduler::prelude::*;
//!
//! let registry = JobRegistry::new(RegistryConfig::default());
//!
//! match registry.schedule("Generation_42", Trigger::Immediate, task)? {
//!     ScheduleOutcome::Scheduled { next_run } => info!(%next_run, "scheduled"),
//!     ScheduleOutcome::Conflict => debug!("already running"),
//! }
//! ```

pub mod registry;
pub mod reliability;

/// Prelude for common imports
pub mod prelude {
    pub use crate::registry::{
        CancelOutcome, ExecutorKind, JobRegistry, RegistryConfig, ScheduleEntry, ScheduleOutcome,
        SchedulerError, Task, Trigger,
    };
    pub use crate::reliability::{RateLimiter, RetryPolicy};
}

// Re-export key types at crate root
pub use registry::{
    CancelOutcome, ExecutorKind, JobRegistry, RegistryConfig, ScheduleEntry, ScheduleOutcome,
    SchedulerError, Task, Trigger, MAX_TRIGGER_DELAY,
};
pub use reliability::{RateLimiter, RetryPolicy, TokenBucket};
