// Orchestrator service
//
// One owned object holding the registry, the model registry, the executor
// and the reconciler. Constructed once at startup and shared by handle with
// the HTTP layer and the sweeps; there is no module-level state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use inventio_core::{
    Job, JobKey, JobKind, JobStore, KeyVariant, ModelProvider, ModelRef, SharedClock,
};
use inventio_scheduler::{
    CancelOutcome, JobRegistry, RegistryConfig, ScheduleEntry, ScheduleOutcome, SchedulerError,
    Task, Trigger,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use crate::config::OrchestratorConfig;
use crate::content::ContentCodec;
use crate::executor::{Assignment, ExecutorConfig, JobExecutor};
use crate::models::ModelRegistry;
use crate::reconciler::Reconciler;

/// Submission rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("expected a {expected} job, got {actual}")]
    KindMismatch { expected: JobKind, actual: JobKind },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Live entry counts by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusSummary {
    pub generation: usize,
    pub translation: usize,
    /// Sweeps and model activations.
    pub system: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub paused: bool,
    pub summary: StatusSummary,
    pub entries: Vec<ScheduleEntry>,
}

/// Where an accepted submission landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub job_key: String,
    pub outcome: ScheduleOutcome,
}

impl Accepted {
    pub fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        match self.outcome {
            ScheduleOutcome::Scheduled { next_run } => Some(next_run),
            ScheduleOutcome::Conflict => None,
        }
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: JobRegistry,
    models: Arc<ModelRegistry>,
    executor: Arc<JobExecutor>,
    reconciler: Arc<Reconciler>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn JobStore>,
        provider: Arc<dyn ModelProvider>,
        codec: Arc<dyn ContentCodec>,
        clock: SharedClock,
    ) -> Self {
        let registry = JobRegistry::new(
            RegistryConfig::default()
                .with_blocking_workers(config.blocking_workers)
                .with_misfire_grace(config.misfire_grace),
        );
        let models = Arc::new(ModelRegistry::new(
            provider,
            store.clone(),
            config.max_concurrent_model_inits,
            config.rate_limit.clone(),
        ));
        let executor = Arc::new(JobExecutor::new(
            store.clone(),
            models.clone(),
            codec,
            clock.clone(),
            ExecutorConfig {
                self_heal_retries: config.self_heal_retries,
                fixer_model: config.fixer_model.clone(),
                ..ExecutorConfig::default()
            },
        ));
        let reconciler = Arc::new(Reconciler::new(
            store,
            registry.clone(),
            executor.clone(),
            clock,
            config.clone(),
        ));

        Self {
            config,
            registry,
            models,
            executor,
            reconciler,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Bootstrap models, run one round of every sweep, then install the
    /// recurring sweeps.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.models.bootstrap().await;

        for kind in JobKind::ALL {
            if let Err(e) = self.reconciler.sweep_new(kind).await {
                error!(kind = %kind, error = %e, "Startup new jobs check failed");
            }
        }
        for kind in JobKind::ALL {
            if let Err(e) = self.reconciler.sweep_pending(kind).await {
                error!(kind = %kind, error = %e, "Startup pending jobs check failed");
            }
        }

        self.reconciler.install()?;
        info!(entries = self.registry.len(), "Orchestrator started");
        Ok(())
    }

    pub fn submit_generation(&self, job: Job) -> Result<Accepted, SubmitError> {
        self.submit(job, JobKind::Generation, None, Trigger::Immediate, Assignment::Generate)
    }

    pub fn submit_generation_delayed(
        &self,
        job: Job,
        delay: Duration,
    ) -> Result<Accepted, SubmitError> {
        self.submit(
            job,
            JobKind::Generation,
            Some(KeyVariant::Delayed),
            Trigger::Delayed(delay),
            Assignment::Generate,
        )
    }

    pub fn submit_translation(&self, job: Job) -> Result<Accepted, SubmitError> {
        self.submit(job, JobKind::Translation, None, Trigger::Immediate, Assignment::Translate)
    }

    pub fn submit_translation_retry(
        &self,
        job: Job,
        instructions: String,
    ) -> Result<Accepted, SubmitError> {
        self.submit(
            job,
            JobKind::Translation,
            Some(KeyVariant::Retry),
            Trigger::Immediate,
            Assignment::Revise { instructions },
        )
    }

    fn submit(
        &self,
        job: Job,
        expected: JobKind,
        variant: Option<KeyVariant>,
        trigger: Trigger,
        assignment: Assignment,
    ) -> Result<Accepted, SubmitError> {
        if job.kind != expected {
            return Err(SubmitError::KindMismatch {
                expected,
                actual: job.kind,
            });
        }

        let mut key = job.key();
        if let Some(variant) = variant {
            key = key.with_variant(variant);
        }
        let job_key = key.to_string();

        let task = self.executor.task_for(job, assignment);
        let outcome = self.registry.schedule(job_key.clone(), trigger, task)?;
        match outcome {
            ScheduleOutcome::Scheduled { next_run } => {
                info!(job_key = %job_key, trigger = %trigger, next_run = %next_run, "Job received")
            }
            ScheduleOutcome::Conflict => info!(job_key = %job_key, "Job already scheduled"),
        }
        Ok(Accepted { job_key, outcome })
    }

    pub fn status(&self) -> SchedulerStatus {
        let entries = self.registry.list();
        let mut summary = StatusSummary {
            total: entries.len(),
            ..StatusSummary::default()
        };
        for entry in &entries {
            match entry.job_key.parse::<JobKey>().map(|k| k.kind) {
                Ok(JobKind::Generation) => summary.generation += 1,
                Ok(JobKind::Translation) => summary.translation += 1,
                Err(_) => summary.system += 1,
            }
        }
        SchedulerStatus {
            paused: self.registry.is_paused(),
            summary,
            entries,
        }
    }

    pub fn cancel(&self, job_key: &str) -> CancelOutcome {
        let outcome = self.registry.cancel(job_key);
        if outcome == CancelOutcome::Removed {
            info!(job_key = %job_key, "Entry cancelled");
        }
        outcome
    }

    pub fn pause(&self) {
        self.registry.pause();
    }

    pub fn resume(&self) {
        self.registry.resume();
    }

    /// Schedule a one-shot activation of `model`.
    pub fn activate_model(&self, model: ModelRef) -> Result<Accepted, SchedulerError> {
        let models = self.models.clone();
        self.schedule_model_change(format!("activate_model_{model}"), "activate_model", move || {
            let models = models.clone();
            let model = model.clone();
            async move {
                models.activate(&model).await;
            }
        })
    }

    /// Schedule a one-shot deactivation of `model`.
    pub fn deactivate_model(&self, model: ModelRef) -> Result<Accepted, SchedulerError> {
        let models = self.models.clone();
        self.schedule_model_change(format!("deactivate_model_{model}"), "deactivate_model", move || {
            let models = models.clone();
            let model = model.clone();
            async move {
                models.deactivate(&model).await;
            }
        })
    }

    fn schedule_model_change<F, Fut>(
        &self,
        job_key: String,
        name: &str,
        f: F,
    ) -> Result<Accepted, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let outcome = self
            .registry
            .schedule(job_key.clone(), Trigger::Immediate, Task::cooperative(name, f))?;
        Ok(Accepted { job_key, outcome })
    }

    /// Stop the registry, waiting for in-flight executions.
    pub async fn shutdown(&self) -> bool {
        info!(timeout_secs = self.config.shutdown_timeout.as_secs(), "Shutting down orchestrator");
        self.registry.shutdown(self.config.shutdown_timeout).await
    }
}
