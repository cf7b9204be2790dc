//! In-memory implementation of JobStore for testing

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::job::{Job, JobId, JobKind, JobState};
use crate::model::{ModelEntry, ModelStatusReport};
use crate::store::JobStore;

/// In-memory implementation of [`JobStore`]
///
/// Keeps the latest copy of every job plus the full history of writes, so
/// tests can assert both the final state and the sequence of transitions.
/// Failures can be injected for the next N writes or for the whole store.
///
/// # Example
///
/// ```
/// use inventio_core::memory::InMemoryJobStore;
///
/// let store = InMemoryJobStore::new();
/// assert_eq!(store.job_count(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<BTreeMap<(JobKind, JobId), Job>>,
    history: RwLock<Vec<Job>>,
    models: RwLock<Vec<ModelEntry>>,
    reports: RwLock<Vec<ModelStatusReport>>,
    failing_writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryJobStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job, as the content backend would
    pub fn insert(&self, job: Job) {
        self.jobs.write().insert((job.kind, job.id), job);
    }

    pub fn get(&self, kind: JobKind, id: JobId) -> Option<Job> {
        self.jobs.read().get(&(kind, id)).cloned()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    /// Every job written through [`JobStore::update_job`], in order
    pub fn history(&self) -> Vec<Job> {
        self.history.read().clone()
    }

    /// States written for one job, in order
    pub fn transitions(&self, kind: JobKind, id: JobId) -> Vec<JobState> {
        self.history
            .read()
            .iter()
            .filter(|job| job.kind == kind && job.id == id)
            .map(|job| job.state)
            .collect()
    }

    pub fn set_active_models(&self, models: Vec<ModelEntry>) {
        *self.models.write() = models;
    }

    pub fn model_reports(&self) -> Vec<ModelStatusReport> {
        self.reports.read().clone()
    }

    /// Make the next `count` writes fail with `StoreError::Unavailable`
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Make every call fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn take_write_failure(&self) -> bool {
        self.failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn list_jobs(&self, kind: JobKind, state: JobState) -> Result<Vec<Job>, StoreError> {
        self.check_available()?;
        Ok(self
            .jobs
            .read()
            .values()
            .filter(|job| job.kind == kind && job.effective_state() == state)
            .cloned()
            .collect())
    }

    async fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        self.check_available()?;
        if self.take_write_failure() {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        self.jobs.write().insert((job.kind, job.id), job.clone());
        self.history.write().push(job.clone());
        Ok(())
    }

    async fn list_active_models(&self) -> Result<Vec<ModelEntry>, StoreError> {
        self.check_available()?;
        Ok(self.models.read().clone())
    }

    async fn report_model_status(&self, report: &ModelStatusReport) -> Result<(), StoreError> {
        self.check_available()?;
        self.reports.write().push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelRef;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_filters_by_kind_and_state() {
        let store = InMemoryJobStore::new();
        store.insert(Job::generation(1, ModelRef::default_model(), json!({})));
        store.insert(
            Job::generation(2, ModelRef::default_model(), json!({})).with_state(JobState::Pending),
        );
        store.insert(Job::translation(1, ModelRef::default_model(), json!({}), vec![]));

        let sent = store
            .list_jobs(JobKind::Generation, JobState::Sent)
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, 1);

        let pending = store
            .list_jobs(JobKind::Generation, JobState::Pending)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 2);
    }

    #[tokio::test]
    async fn test_injected_write_failures() {
        let store = InMemoryJobStore::new();
        let job = Job::generation(1, ModelRef::default_model(), json!({}));
        store.fail_next_writes(1);

        assert!(store.update_job(&job).await.is_err());
        assert!(store.update_job(&job).await.is_ok());
        assert_eq!(store.history().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = InMemoryJobStore::new();
        store.set_unavailable(true);
        let err = store
            .list_jobs(JobKind::Generation, JobState::Sent)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
