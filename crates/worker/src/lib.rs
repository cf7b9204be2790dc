// Inventio Worker
//
// Job orchestration and crash recovery for LLM generation and translation
// jobs. The Job Store is the source of truth; the in-process registry only
// tracks what is running right now and is rebuilt by the reconciler after a
// restart.

pub mod api;
pub mod client;
pub mod config;
pub mod content;
pub mod executor;
pub mod models;
pub mod openapi;
pub mod orchestrator;
pub mod providers;
pub mod reconciler;

pub use client::{DryRunJobStore, HttpJobStore};
pub use config::{ConfigError, OrchestratorConfig, RateLimitConfig, SweepConfig};
pub use content::{ContentCodec, JsonContentCodec};
pub use executor::{Assignment, ExecutorConfig, JobExecutor};
pub use models::{fallback_models, ModelHandle, ModelRegistry};
pub use orchestrator::{Accepted, Orchestrator, SchedulerStatus, StatusSummary, SubmitError};
pub use providers::OpenAiCompatibleProvider;
pub use reconciler::{Reconciler, SweepReport, BLOCKED_MESSAGE};
