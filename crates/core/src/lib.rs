// Inventio Core
//
// Transport-agnostic building blocks for the job orchestrator.
//
// Key design decisions:
// - Jobs and work units are owned by an external Job Store; this crate only
//   defines their shape and the JobStore trait used to read and write them
// - Model vendors hide behind ModelProvider/ModelClient trait objects
// - Staleness checks take time from a Clock so tests can control it
// - Error enums distinguish store, model and execution failures

pub mod clock;
pub mod error;
pub mod job;
pub mod model;
pub mod store;
pub mod telemetry;

// In-memory implementations for testing
pub mod memory;

// LLM Simulator provider for testing
pub mod llmsim;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{ExecutionError, ModelError, StoreError};
pub use job::{
    Job, JobId, JobKey, JobKind, JobState, KeyVariant, Language, ParseJobKeyError, WorkUnit,
};
pub use model::{
    BoxedModelClient, LlmCallConfig, ModelClient, ModelEntry, ModelProvider, ModelRef,
    ModelStatusReport, Prompt, ProviderInfo,
};
pub use store::JobStore;
