//! The in-memory Job Registry
//!
//! This module provides:
//! - [`JobRegistry`] - keyed scheduler with at-most-one live entry per key
//! - [`Trigger`] - immediate, delayed and interval firing rules
//! - [`Task`] - the callback bound to an entry and the pool that runs it
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        JobRegistry                            │
//! │   entries: job_key -> { trigger, next_run, running, tokens }  │
//! │                                                               │
//! │   one driver task per entry                                   │
//! │     sleep until due ─▶ wait while paused ─▶ misfire check     │
//! │                          │                                    │
//! │              ┌───────────┴────────────┐                       │
//! │              ▼                        ▼                       │
//! │     tokio task (cooperative)   spawn_blocking (semaphore)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod scheduler;
mod task;
mod trigger;

pub use scheduler::{
    CancelOutcome, JobRegistry, RegistryConfig, ScheduleEntry, ScheduleOutcome, SchedulerError,
    MAX_TRIGGER_DELAY,
};
pub use task::{ExecutorKind, Task};
pub use trigger::Trigger;
