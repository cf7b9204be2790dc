// Reconciler
//
// Two periodic sweeps per job kind bring the ephemeral registry back in line
// with the Job Store:
//
// - new jobs: every `Sent` job is scheduled for immediate execution
// - pending jobs: a stale `Pending` job with a live registry entry is stuck
//   and gets failed; one without an entry was lost in a restart and gets
//   rescheduled
//
// Live registry entries are the only evidence that a job is running, so the
// registry doubles as the liveness oracle.

use std::sync::Arc;

use inventio_core::{
    Job, JobKey, JobKind, JobState, JobStore, KeyVariant, SharedClock, StoreError,
};
use inventio_scheduler::{CancelOutcome, JobRegistry, ScheduleOutcome, SchedulerError, Task, Trigger};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::OrchestratorConfig;
use crate::executor::{Assignment, JobExecutor};

/// State message written for jobs failed as stuck.
pub const BLOCKED_MESSAGE: &str = "pending too long: blocked";

/// Key of the recurring new-jobs sweep for `kind`.
pub fn new_sweep_key(kind: JobKind) -> String {
    format!("check_new_{}", kind.as_str())
}

/// Key of the recurring pending-jobs sweep for `kind`.
pub fn pending_sweep_key(kind: JobKind) -> String {
    format!("check_pending_{}", kind.as_str())
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records returned by the store.
    pub examined: usize,
    /// New jobs handed to the registry.
    pub scheduled: usize,
    /// Jobs that already had a live entry.
    pub conflicts: usize,
    /// Pending jobs younger than the threshold.
    pub fresh: usize,
    /// Stale jobs with a live entry, failed as stuck.
    pub blocked: usize,
    /// Stale jobs without an entry, scheduled again.
    pub rescheduled: usize,
    /// Jobs whose handling failed (registry or store write).
    pub errors: usize,
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
    registry: JobRegistry,
    executor: Arc<JobExecutor>,
    clock: SharedClock,
    config: OrchestratorConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: JobRegistry,
        executor: Arc<JobExecutor>,
        clock: SharedClock,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            registry,
            executor,
            clock,
            config,
        }
    }

    /// Schedule every `Sent` job of `kind` that has no live entry.
    pub async fn sweep_new(&self, kind: JobKind) -> Result<SweepReport, StoreError> {
        info!(kind = %kind, "Checking for new jobs");
        let jobs = self.store.list_jobs(kind, JobState::Sent).await?;
        let mut report = SweepReport {
            examined: jobs.len(),
            ..SweepReport::default()
        };

        for job in jobs {
            let key = job.key();
            if let Some(live) = self.live_variant(key) {
                debug!(job_key = %key, live = %live, "Job already scheduled");
                report.conflicts += 1;
                continue;
            }
            match self.schedule_now(job) {
                Ok(ScheduleOutcome::Scheduled { .. }) => {
                    info!(job_key = %key, "New job scheduled");
                    report.scheduled += 1;
                }
                Ok(ScheduleOutcome::Conflict) => {
                    debug!(job_key = %key, "Job already scheduled");
                    report.conflicts += 1;
                }
                Err(e) => {
                    error!(job_key = %key, error = %e, "Cannot schedule new job");
                    report.errors += 1;
                }
            }
        }

        info!(
            kind = %kind,
            examined = report.examined,
            scheduled = report.scheduled,
            "New jobs check finished"
        );
        Ok(report)
    }

    /// Fail stuck `Pending` jobs of `kind` and reschedule lost ones.
    pub async fn sweep_pending(&self, kind: JobKind) -> Result<SweepReport, StoreError> {
        info!(kind = %kind, "Checking pending jobs");
        let jobs = self.store.list_jobs(kind, JobState::Pending).await?;
        let threshold = self.config.sweeps(kind).blocked_threshold;
        let now = self.clock.now();
        let mut report = SweepReport {
            examined: jobs.len(),
            ..SweepReport::default()
        };

        for job in jobs {
            let key = job.key();
            let stale = match job.last_transition_at() {
                Some(at) => (now - at).to_std().is_ok_and(|age| age > threshold),
                None => true,
            };
            if !stale {
                debug!(job_key = %key, "Pending job within threshold");
                report.fresh += 1;
                continue;
            }
            self.recover(job, &mut report).await;
        }

        info!(
            kind = %kind,
            examined = report.examined,
            blocked = report.blocked,
            rescheduled = report.rescheduled,
            "Pending jobs check finished"
        );
        Ok(report)
    }

    async fn recover(&self, mut job: Job, report: &mut SweepReport) {
        let key = job.key();

        if self.cancel_all_variants(key) == CancelOutcome::Removed {
            error!(job_key = %key, "Job pending too long, marking failed");
            job.transition(JobState::Failed, BLOCKED_MESSAGE, self.clock.now());
            match self.store.update_job(&job).await {
                Ok(()) => report.blocked += 1,
                Err(e) => {
                    error!(job_key = %key, error = %e, "Cannot mark blocked job failed");
                    report.errors += 1;
                }
            }
            return;
        }

        match self.schedule_now(job.clone()) {
            Ok(ScheduleOutcome::Scheduled { .. }) => {
                info!(job_key = %key, "Lost job rescheduled");
                report.rescheduled += 1;
            }
            Ok(ScheduleOutcome::Conflict) => {
                debug!(job_key = %key, "Job scheduled concurrently");
                report.conflicts += 1;
            }
            Err(e) => {
                error!(job_key = %key, error = %e, "Cannot reschedule lost job");
                report.errors += 1;
                let message = format!("failed to reschedule {} job: {e}", job.kind);
                job.transition(JobState::Failed, message, self.clock.now());
                if let Err(e) = self.store.update_job(&job).await {
                    error!(job_key = %key, error = %e, "Cannot mark job failed");
                }
            }
        }
    }

    fn schedule_now(&self, job: Job) -> Result<ScheduleOutcome, SchedulerError> {
        let key = job.key().to_string();
        let assignment = Assignment::for_kind(job.kind);
        self.registry
            .schedule(key, Trigger::Immediate, self.executor.task_for(job, assignment))
    }

    /// The job's own key or a delayed/retry variant that is currently live.
    fn live_variant(&self, key: JobKey) -> Option<JobKey> {
        variants(key)
            .into_iter()
            .find(|k| self.registry.contains(&k.to_string()))
    }

    /// Cancel the job's entry and its variants. `Removed` if any was live.
    fn cancel_all_variants(&self, key: JobKey) -> CancelOutcome {
        let mut outcome = CancelOutcome::NotFound;
        for variant in variants(key) {
            if self.registry.cancel(&variant.to_string()) == CancelOutcome::Removed {
                outcome = CancelOutcome::Removed;
            }
        }
        outcome
    }

    /// Register the four recurring sweeps.
    pub fn install(self: &Arc<Self>) -> Result<(), SchedulerError> {
        for kind in JobKind::ALL {
            let sweeps = self.config.sweeps(kind);

            let reconciler = Arc::clone(self);
            let task = Task::cooperative(format!("New{}JobsCheck", kind.key_prefix()), move || {
                let reconciler = reconciler.clone();
                async move {
                    if let Err(e) = reconciler.sweep_new(kind).await {
                        error!(kind = %kind, error = %e, "New jobs check failed");
                    }
                }
            });
            self.registry
                .schedule(new_sweep_key(kind), Trigger::Interval(sweeps.new_interval), task)?;

            let reconciler = Arc::clone(self);
            let task = Task::cooperative(format!("Pending{}JobsCheck", kind.key_prefix()), move || {
                let reconciler = reconciler.clone();
                async move {
                    if let Err(e) = reconciler.sweep_pending(kind).await {
                        error!(kind = %kind, error = %e, "Pending jobs check failed");
                    }
                }
            });
            self.registry.schedule(
                pending_sweep_key(kind),
                Trigger::Interval(sweeps.pending_interval),
                task,
            )?;
        }
        Ok(())
    }
}

fn variants(key: JobKey) -> [JobKey; 3] {
    let base = JobKey { variant: None, ..key };
    [
        base,
        base.with_variant(KeyVariant::Delayed),
        base.with_variant(KeyVariant::Retry),
    ]
}
