//! Keyed, ephemeral job scheduler
//!
//! Every entry is owned by a driver task that sleeps until the entry is due,
//! honours the global pause switch, and hands the work to one of the two
//! pools. The registry map is only locked for bookkeeping, never across an
//! await.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::task::{ExecutorKind, Task, Work};
use super::trigger::Trigger;

/// Longest delay or interval a trigger may carry
pub const MAX_TRIGGER_DELAY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Threads available to `ExecutorKind::Blocking` work
    pub blocking_workers: usize,

    /// How late a firing may start before it is dropped
    pub misfire_grace: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            blocking_workers: 5,
            misfire_grace: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    pub fn with_blocking_workers(mut self, workers: usize) -> Self {
        self.blocking_workers = workers.max(1);
        self
    }

    pub fn with_misfire_grace(mut self, grace: Duration) -> Self {
        self.misfire_grace = grace;
        self
    }
}

/// Result of [`JobRegistry::schedule`]. A conflict is an expected outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { next_run: DateTime<Utc> },
    /// An entry with this key already exists and was left untouched.
    Conflict,
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled { .. })
    }
}

/// Result of [`JobRegistry::cancel`]. Both cases are expected outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A live entry existed and has been removed.
    Removed,
    /// No entry with this key.
    NotFound,
}

/// Registry failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("job registry is shut down")]
    ShutDown,

    #[error("invalid job key: {0:?}")]
    InvalidKey(String),

    #[error("invalid trigger for {key}: {reason}")]
    InvalidTrigger { key: String, reason: String },
}

/// Point-in-time view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub job_key: String,
    pub name: String,
    pub trigger: Trigger,
    pub executor: ExecutorKind,
    /// Next planned firing; `None` while a one-shot entry is running.
    pub next_run: Option<DateTime<Utc>>,
    /// A run of this entry is in flight.
    pub running: bool,
    pub last_started_at: Option<DateTime<Utc>>,
}

struct Slot {
    id: u64,
    entry: ScheduleEntry,
    /// Stops future firings.
    stop: CancellationToken,
    /// Stops future firings and aborts the in-flight run. Parent of `stop`.
    abort: CancellationToken,
}

enum StartOutcome {
    Started,
    Busy,
    Gone,
}

struct Inner {
    config: RegistryConfig,
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
    paused: watch::Sender<bool>,
    closed: AtomicBool,
    blocking: Arc<Semaphore>,
    tracker: TaskTracker,
}

/// In-memory job registry
///
/// At most one entry exists per job key. Scheduling an existing key returns
/// [`ScheduleOutcome::Conflict`]; a recurring entry whose previous run is
/// still in flight skips the firing instead of queueing it.
///
/// # Example
///
/// ```ignore
/// use inventio_scheduler::{JobRegistry, RegistryConfig, Task, Trigger};
///
/// let registry = JobRegistry::new(RegistryConfig::default());
///
/// registry.schedule("Generation_7", Trigger::Immediate, Task::cooperative("generate", || async {
///     // ...
/// }))?;
///
/// // Later, graceful shutdown
/// registry.shutdown(Duration::from_secs(30)).await;
/// ```
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl JobRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let (paused, _) = watch::channel(false);
        let blocking = Arc::new(Semaphore::new(config.blocking_workers.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                slots: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                paused,
                closed: AtomicBool::new(false),
                blocking,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Register `task` under `job_key`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(
        &self,
        job_key: impl Into<String>,
        trigger: Trigger,
        task: Task,
    ) -> Result<ScheduleOutcome, SchedulerError> {
        let job_key = job_key.into();
        if job_key.trim().is_empty() {
            return Err(SchedulerError::InvalidKey(job_key));
        }
        if trigger.period() == Some(Duration::ZERO) {
            return Err(SchedulerError::InvalidTrigger {
                key: job_key,
                reason: "interval must be positive".to_string(),
            });
        }
        let delay = trigger.initial_delay();
        let Some(due) = Instant::now()
            .checked_add(delay)
            .filter(|_| delay <= MAX_TRIGGER_DELAY)
        else {
            return Err(SchedulerError::InvalidTrigger {
                key: job_key,
                reason: format!("delay of {}s is too large", delay.as_secs()),
            });
        };
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }

        let next_run = wall_clock(due);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let abort = CancellationToken::new();
        let stop = abort.child_token();

        {
            let mut slots = self.inner.slots.lock();
            if slots.contains_key(&job_key) {
                debug!(job_key = %job_key, "already scheduled");
                return Ok(ScheduleOutcome::Conflict);
            }
            slots.insert(
                job_key.clone(),
                Slot {
                    id,
                    entry: ScheduleEntry {
                        job_key: job_key.clone(),
                        name: task.name().to_string(),
                        trigger,
                        executor: task.executor(),
                        next_run: Some(next_run),
                        running: false,
                        last_started_at: None,
                    },
                    stop: stop.clone(),
                    abort: abort.clone(),
                },
            );
        }

        debug!(
            job_key = %job_key,
            trigger = %trigger,
            executor = %task.executor(),
            next_run = %next_run,
            "scheduled"
        );

        let driver = Driver {
            inner: self.inner.clone(),
            id,
            key: job_key,
            trigger,
            work: task.work,
            stop,
            abort,
        };
        self.inner.tracker.spawn(driver.run(due));

        Ok(ScheduleOutcome::Scheduled { next_run })
    }

    /// Remove the entry for `job_key` and abort its in-flight run, if any.
    ///
    /// Blocking work that already started cannot be interrupted and runs to
    /// completion; cooperative work is aborted at its next await point.
    pub fn cancel(&self, job_key: &str) -> CancelOutcome {
        let removed = self.inner.slots.lock().remove(job_key);
        match removed {
            Some(slot) => {
                slot.abort.cancel();
                debug!(job_key = %job_key, "cancelled");
                CancelOutcome::Removed
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Hold all firings until [`resume`](Self::resume). Entries are kept and
    /// runs already in flight continue.
    pub fn pause(&self) {
        self.inner.paused.send_replace(true);
        info!("job registry paused");
    }

    pub fn resume(&self) {
        self.inner.paused.send_replace(false);
        info!("job registry resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn contains(&self, job_key: &str) -> bool {
        self.inner.slots.lock().contains_key(job_key)
    }

    pub fn get(&self, job_key: &str) -> Option<ScheduleEntry> {
        self.inner
            .slots
            .lock()
            .get(job_key)
            .map(|slot| slot.entry.clone())
    }

    /// Snapshot of every live entry, ordered by key.
    pub fn list(&self) -> Vec<ScheduleEntry> {
        let mut entries: Vec<ScheduleEntry> = self
            .inner
            .slots
            .lock()
            .values()
            .map(|slot| slot.entry.clone())
            .collect();
        entries.sort_by(|a, b| a.job_key.cmp(&b.job_key));
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop accepting entries, drop everything not yet running and wait up
    /// to `timeout` for in-flight runs. Returns `false` if the timeout was
    /// hit, in which case the remaining cooperative runs are aborted.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.closed.store(true, Ordering::SeqCst);

        let aborts: Vec<CancellationToken> = self
            .inner
            .slots
            .lock()
            .values()
            .map(|slot| {
                slot.stop.cancel();
                slot.abort.clone()
            })
            .collect();

        info!(entries = aborts.len(), "shutting down job registry");

        self.inner.tracker.close();
        let drained = tokio::time::timeout(timeout, self.inner.tracker.wait())
            .await
            .is_ok();

        if !drained {
            warn!(
                timeout_secs = timeout.as_secs_f64(),
                "shutdown timeout reached, aborting remaining runs"
            );
            for abort in aborts {
                abort.cancel();
            }
        }
        drained
    }
}

impl Inner {
    async fn wait_until_resumed(&self, stop: &CancellationToken) -> bool {
        let mut paused = self.paused.subscribe();
        loop {
            if !*paused.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = stop.cancelled() => return false,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn try_start(&self, id: u64, key: &str) -> StartOutcome {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(slot) if slot.id == id => {
                if slot.entry.running {
                    return StartOutcome::Busy;
                }
                slot.entry.running = true;
                slot.entry.last_started_at = Some(Utc::now());
                if !slot.entry.trigger.is_recurring() {
                    slot.entry.next_run = None;
                }
                StartOutcome::Started
            }
            _ => StartOutcome::Gone,
        }
    }

    fn finish(&self, id: u64, key: &str) {
        if let Some(slot) = self.slots.lock().get_mut(key) {
            if slot.id == id {
                slot.entry.running = false;
            }
        }
    }

    fn set_next_run(&self, id: u64, key: &str, next_run: DateTime<Utc>) {
        if let Some(slot) = self.slots.lock().get_mut(key) {
            if slot.id == id {
                slot.entry.next_run = Some(next_run);
            }
        }
    }

    /// Remove the entry unless it has been replaced by a newer one.
    fn deregister(&self, id: u64, key: &str) {
        let mut slots = self.slots.lock();
        if slots.get(key).map(|slot| slot.id) == Some(id) {
            slots.remove(key);
            debug!(job_key = %key, "deregistered");
        }
    }

    async fn execute(&self, key: &str, work: &Work, abort: &CancellationToken) {
        let handle = match work {
            Work::Cooperative(f) => self.tracker.spawn(f()),
            Work::Blocking(f) => {
                let permit = tokio::select! {
                    _ = abort.cancelled() => return,
                    permit = self.blocking.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                let f = f.clone();
                self.tracker.spawn_blocking(move || {
                    let _permit = permit;
                    f()
                })
            }
        };

        let abort_handle = handle.abort_handle();
        tokio::select! {
            _ = abort.cancelled() => {
                abort_handle.abort();
                info!(job_key = %key, "in-flight run aborted");
            }
            joined = handle => match joined {
                Ok(()) => debug!(job_key = %key, "run finished"),
                Err(e) if e.is_panic() => error!(job_key = %key, "run panicked"),
                Err(e) => debug!(job_key = %key, error = %e, "run did not complete"),
            }
        }
    }
}

struct Driver {
    inner: Arc<Inner>,
    id: u64,
    key: String,
    trigger: Trigger,
    work: Work,
    stop: CancellationToken,
    abort: CancellationToken,
}

impl Driver {
    async fn run(self, mut due: Instant) {
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep_until(due) => {}
            }
            if !self.inner.wait_until_resumed(&self.stop).await || self.stop.is_cancelled() {
                break;
            }

            let lateness = Instant::now().saturating_duration_since(due);
            let misfired = lateness > self.inner.config.misfire_grace;
            if misfired {
                warn!(
                    job_key = %self.key,
                    late_by_secs = lateness.as_secs_f64(),
                    "run time was missed, skipping"
                );
            }

            let Some(period) = self.trigger.period() else {
                if !misfired {
                    if let StartOutcome::Started = self.inner.try_start(self.id, &self.key) {
                        self.inner.execute(&self.key, &self.work, &self.abort).await;
                    }
                }
                break;
            };

            if !misfired {
                match self.inner.try_start(self.id, &self.key) {
                    StartOutcome::Started => {
                        let inner = self.inner.clone();
                        let (id, key) = (self.id, self.key.clone());
                        let (work, abort) = (self.work.clone(), self.abort.clone());
                        self.inner.tracker.spawn(async move {
                            inner.execute(&key, &work, &abort).await;
                            inner.finish(id, &key);
                        });
                    }
                    StartOutcome::Busy => {
                        debug!(job_key = %self.key, "previous run still in flight, skipping");
                    }
                    StartOutcome::Gone => break,
                }
            }

            due = next_due(due, period, Instant::now());
            self.inner.set_next_run(self.id, &self.key, wall_clock(due));
        }

        self.inner.deregister(self.id, &self.key);
    }
}

/// First firing of a `period` grid anchored at `previous` that lies after `now`.
fn next_due(previous: Instant, period: Duration, now: Instant) -> Instant {
    let due = previous + period;
    if due > now {
        return due;
    }
    let behind = now.duration_since(due).as_nanos();
    let skipped = behind / period.as_nanos() + 1;
    due + period * u32::try_from(skipped).unwrap_or(u32::MAX)
}

fn wall_clock(at: Instant) -> DateTime<Utc> {
    let ahead = at.saturating_duration_since(Instant::now());
    chrono::Duration::from_std(ahead)
        .ok()
        .and_then(|ahead| Utc::now().checked_add_signed(ahead))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> Task {
        let counter = counter.clone();
        Task::cooperative("count", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    fn sleeping(counter: &Arc<AtomicUsize>, duration: Duration) -> Task {
        let counter = counter.clone();
        Task::cooperative("sleep", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(duration).await;
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_runs_once_and_deregisters() {
        let registry = JobRegistry::default();
        let runs = Arc::new(AtomicUsize::new(0));

        let outcome = registry
            .schedule("Generation_1", Trigger::Immediate, counting(&runs))
            .unwrap();
        assert!(outcome.is_scheduled());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!registry.contains("Generation_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_key_conflicts_and_keeps_first_entry() {
        let registry = JobRegistry::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry
            .schedule("Translation_9", Trigger::delayed_secs(60), counting(&first))
            .unwrap();
        let before = registry.get("Translation_9").unwrap();

        let outcome = registry
            .schedule("Translation_9", Trigger::Immediate, counting(&second))
            .unwrap();
        assert_eq!(outcome, ScheduleOutcome::Conflict);
        assert_eq!(registry.get("Translation_9").unwrap(), before);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_removes_entry_before_it_fires() {
        let registry = JobRegistry::default();
        let runs = Arc::new(AtomicUsize::new(0));

        registry
            .schedule("Generation_3_delayed", Trigger::delayed_secs(10), counting(&runs))
            .unwrap();
        assert_eq!(registry.cancel("Generation_3_delayed"), CancelOutcome::Removed);
        assert_eq!(registry.cancel("Generation_3_delayed"), CancelOutcome::NotFound);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_running_cooperative_work() {
        let registry = JobRegistry::default();
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();
        let task = Task::cooperative("hang", move || {
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        });

        registry.schedule("Generation_7", Trigger::Immediate, task).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let entry = registry.get("Generation_7").unwrap();
        assert!(entry.running);
        assert!(entry.last_started_at.is_some());
        assert!(entry.next_run.is_none());

        assert_eq!(registry.cancel("Generation_7"), CancelOutcome::Removed);
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_skips_while_previous_run_in_flight() {
        let registry = JobRegistry::default();
        let starts = Arc::new(AtomicUsize::new(0));

        registry
            .schedule(
                "check_pending_generation",
                Trigger::every_secs(10),
                sleeping(&starts, Duration::from_secs(25)),
            )
            .unwrap();

        // Fires at 10s (runs until 35s), skips 20s and 30s, fires again at 40s.
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 2);
        assert!(registry.contains("check_pending_generation"));
        assert!(registry.get("check_pending_generation").unwrap().running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_holds_firings_until_resume() {
        let registry = JobRegistry::default();
        let runs = Arc::new(AtomicUsize::new(0));

        registry.pause();
        assert!(registry.is_paused());
        registry
            .schedule("Generation_5", Trigger::Immediate, counting(&runs))
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(registry.contains("Generation_5"));

        registry.resume();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_misfire_beyond_grace_is_dropped() {
        let registry =
            JobRegistry::new(RegistryConfig::default().with_misfire_grace(Duration::from_secs(1)));
        let runs = Arc::new(AtomicUsize::new(0));

        registry.pause();
        registry
            .schedule("Generation_5", Trigger::Immediate, counting(&runs))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        registry.resume();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!registry.contains("Generation_5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_still_deregisters() {
        let registry = JobRegistry::default();
        let task = Task::cooperative("boom", || async {
            panic!("callback crashed");
        });

        registry.schedule("Generation_11", Trigger::Immediate, task).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!registry.contains("Generation_11"));
        assert_eq!(
            registry
                .schedule("Generation_11", Trigger::Immediate, Task::cooperative("noop", || async {}))
                .map(|o| o.is_scheduled()),
            Ok(true)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_pool_is_bounded() {
        let registry =
            JobRegistry::new(RegistryConfig::default().with_blocking_workers(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for id in 0..6 {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            let task = Task::blocking("convert", move || {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(30));
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
            registry
                .schedule(format!("Blocking_{id}"), Trigger::Immediate, task)
                .unwrap();
        }

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_and_rejects_new_entries() {
        let registry = JobRegistry::default();
        let starts = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let done = finished.clone();

        registry
            .schedule(
                "Generation_1",
                Trigger::Immediate,
                Task::cooperative("slow", move || {
                    let done = done.clone();
                    async move {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            )
            .unwrap();
        registry
            .schedule("check_new_generation", Trigger::every_secs(60), counting(&starts))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(registry.shutdown(Duration::from_secs(30)).await);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(starts.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
        assert_eq!(
            registry.schedule("Generation_2", Trigger::Immediate, counting(&starts)),
            Err(SchedulerError::ShutDown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_timeout_aborts_hung_runs() {
        let registry = JobRegistry::default();
        registry
            .schedule(
                "Generation_1",
                Trigger::Immediate,
                Task::cooperative("hang", || std::future::pending::<()>()),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!registry.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let registry = JobRegistry::default();
        let noop = Task::cooperative("noop", || async {});

        assert!(matches!(
            registry.schedule("  ", Trigger::Immediate, noop.clone()),
            Err(SchedulerError::InvalidKey(_))
        ));
        assert!(matches!(
            registry.schedule("tick", Trigger::Interval(Duration::ZERO), noop),
            Err(SchedulerError::InvalidTrigger { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_delay_beyond_limit() {
        let registry = JobRegistry::default();
        let runs = Arc::new(AtomicUsize::new(0));

        for trigger in [
            Trigger::delayed_secs(u64::MAX),
            Trigger::every_secs(u64::MAX),
            Trigger::Delayed(MAX_TRIGGER_DELAY + Duration::from_secs(1)),
        ] {
            let err = registry
                .schedule("Generation_1_delayed", trigger, counting(&runs))
                .unwrap_err();
            assert!(matches!(err, SchedulerError::InvalidTrigger { .. }));
        }
        assert!(registry.is_empty());

        let outcome = registry
            .schedule(
                "Generation_1_delayed",
                Trigger::Delayed(MAX_TRIGGER_DELAY),
                counting(&runs),
            )
            .unwrap();
        assert!(outcome.is_scheduled());
        assert_eq!(
            registry.cancel("Generation_1_delayed"),
            CancelOutcome::Removed
        );
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_next_due_skips_missed_periods() {
        let start = Instant::now();
        let period = Duration::from_secs(10);

        assert_eq!(next_due(start, period, start), start + period);
        assert_eq!(
            next_due(start, period, start + Duration::from_secs(35)),
            start + Duration::from_secs(40)
        );
        assert_eq!(
            next_due(start, period, start + Duration::from_secs(10)),
            start + Duration::from_secs(20)
        );
    }
}
