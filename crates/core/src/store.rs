//! Job Store contract
//!
//! The persistent task store is owned by the content backend and reachable
//! only over HTTP. This trait is the orchestrator's whole view of it; the
//! worker crate provides the HTTP implementation, [`crate::memory`] an
//! in-memory one for tests.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::job::{Job, JobKind, JobState};
use crate::model::{ModelEntry, ModelStatusReport};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// All jobs of `kind` currently in `state` (`GET jobs?kind=&state=`).
    async fn list_jobs(&self, kind: JobKind, state: JobState) -> Result<Vec<Job>, StoreError>;

    /// Persist the job's state, message, result and units (`PUT job`).
    async fn update_job(&self, job: &Job) -> Result<(), StoreError>;

    /// Models the backend considers active.
    async fn list_active_models(&self) -> Result<Vec<ModelEntry>, StoreError>;

    /// Report an activation or deactivation outcome.
    async fn report_model_status(&self, report: &ModelStatusReport) -> Result<(), StoreError>;
}
