// Job executor
//
// Runs one job end to end: write Pending, call the model for the job (or for
// each translation unit), validate the output with a bounded number of
// self-healing attempts, and write the terminal state. A failure anywhere is
// converted into a Failed write; nothing propagates into the registry.
//
// Store writes that fail are logged and dropped. The next pending sweep sees
// the stale record and repairs it.

use std::sync::Arc;

use futures::future::join_all;
use inventio_core::{
    ExecutionError, Job, JobId, JobKind, JobState, JobStore, ModelError, ModelRef, Prompt, SharedClock,
    WorkUnit,
};
use inventio_scheduler::{RetryPolicy, Task};
use serde_json::Value;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::content::ContentCodec;
use crate::models::{ModelHandle, ModelRegistry};

/// What to do with a job once its registry entry fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Generate,
    Translate,
    /// Revise existing translations following free-text instructions.
    Revise { instructions: String },
}

impl Assignment {
    /// Default assignment for a job picked up by a sweep.
    pub fn for_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::Generation => Self::Generate,
            JobKind::Translation => Self::Translate,
        }
    }

    /// Task name shown in scheduler listings.
    pub fn task_name(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Translate => "translate",
            Self::Revise { .. } => "retry_translate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Extra attempts at repairing malformed output.
    pub self_heal_retries: u32,
    /// Model used for repairs; the job's own model when unset or inactive.
    pub fixer_model: Option<ModelRef>,
    /// Backoff for transient provider failures. Attempts come from the job.
    pub backoff: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            self_heal_retries: 2,
            fixer_model: None,
            backoff: RetryPolicy::exponential(),
        }
    }
}

pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    models: Arc<ModelRegistry>,
    codec: Arc<dyn ContentCodec>,
    clock: SharedClock,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        models: Arc<ModelRegistry>,
        codec: Arc<dyn ContentCodec>,
        clock: SharedClock,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            models,
            codec,
            clock,
            config,
        }
    }

    /// Registry task that runs `job` every time it fires.
    pub fn task_for(self: &Arc<Self>, job: Job, assignment: Assignment) -> Task {
        let executor = Arc::clone(self);
        Task::cooperative(assignment.task_name(), move || {
            let executor = executor.clone();
            let job = job.clone();
            let assignment = assignment.clone();
            async move { executor.run(job, assignment).await }
        })
    }

    /// Execute `job` and persist its terminal state.
    pub async fn run(&self, mut job: Job, assignment: Assignment) {
        let key = job.key();
        job.normalize();

        job.transition(JobState::Pending, "", self.clock.now());
        if let Err(e) = self.store.update_job(&job).await {
            // Still Sent in the store, the next new-jobs sweep picks it up.
            error!(job_key = %key, error = %e, "Cannot mark job pending, skipping run");
            return;
        }
        info!(job_key = %key, model = %job.model_ref, task = assignment.task_name(), "Job started");

        let outcome = match &assignment {
            Assignment::Generate => self.generate(&mut job).await,
            Assignment::Translate => self.translate(&mut job, None).await,
            Assignment::Revise { instructions } => {
                self.translate(&mut job, Some(instructions.as_str())).await
            }
        };

        match outcome {
            Ok(()) => match job.state {
                JobState::Success => info!(job_key = %key, "Job succeeded"),
                _ => warn!(job_key = %key, message = %job.state_message, "Job finished with failures"),
            },
            Err(e) => {
                error!(job_key = %key, error = %e, "Job failed");
                job.transition(JobState::Failed, e.to_string(), self.clock.now());
            }
        }

        if let Err(e) = self.store.update_job(&job).await {
            error!(
                job_key = %key,
                state = job.state.as_str(),
                error = %e,
                "Cannot persist job outcome"
            );
        }
    }

    async fn generate(&self, job: &mut Job) -> Result<(), ExecutionError> {
        let prompt = self.codec.generation_prompt(job)?;
        let value = self.complete(job, &prompt).await?;
        job.result = Some(value);
        job.transition(JobState::Success, "", self.clock.now());
        Ok(())
    }

    /// Every unit is attempted independently; the job state is derived from
    /// the units afterwards.
    async fn translate(&self, job: &mut Job, instructions: Option<&str>) -> Result<(), ExecutionError> {
        if job.units.is_empty() {
            return Err(ExecutionError::Prompt(
                "translation job has no target languages".to_string(),
            ));
        }

        let snapshot: &Job = job;
        let outcomes = join_all(
            snapshot
                .units
                .iter()
                .map(|unit| self.translate_unit(snapshot, unit, instructions)),
        )
        .await;

        let now = self.clock.now();
        let total = outcomes.len();
        let mut failed = 0;
        for (unit_id, outcome) in outcomes {
            if outcome.is_err() {
                failed += 1;
            }
            job.settle_unit(unit_id, outcome.map_err(|e| e.to_string()), now);
        }

        job.state_message = if failed == 0 {
            String::new()
        } else {
            format!("{failed} of {total} translation(s) failed")
        };
        Ok(())
    }

    async fn translate_unit(
        &self,
        job: &Job,
        unit: &WorkUnit,
        instructions: Option<&str>,
    ) -> (JobId, Result<Value, ExecutionError>) {
        let prompt = match instructions {
            Some(instructions) => self.codec.revision_prompt(job, unit, instructions),
            None => self.codec.translation_prompt(job, unit),
        };
        let outcome = match prompt {
            Ok(prompt) => self.complete(job, &prompt).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            warn!(
                job_key = %job.key(),
                unit_id = unit.id,
                language = %unit.target_language.complete_name(),
                error = %e,
                "Translation unit failed"
            );
        }
        (unit.id, outcome)
    }

    /// Call the job's model and parse the reply, asking for repairs while
    /// self-healing attempts remain.
    async fn complete(&self, job: &Job, prompt: &Prompt) -> Result<Value, ExecutionError> {
        let model = self.models.get(&job.model_ref)?;
        let mut output = self.invoke(&model, prompt, job).await?;

        let mut attempts = 1;
        loop {
            match self.codec.parse(job, &output) {
                Ok(value) => return Ok(value),
                Err(message) if attempts <= self.config.self_heal_retries => {
                    warn!(job_key = %job.key(), attempt = attempts, error = %message, "Output rejected, asking for a fix");
                    let fixer = self.fixer(&model);
                    let fix = self.codec.fix_prompt(job, &output, &message);
                    output = self.invoke(&fixer, &fix, job).await?;
                    attempts += 1;
                }
                Err(message) => return Err(ExecutionError::Validation { attempts, message }),
            }
        }
    }

    /// Invoke with backoff on transient failures, up to the job's
    /// `max_retries` attempts.
    async fn invoke(
        &self,
        model: &ModelHandle,
        prompt: &Prompt,
        job: &Job,
    ) -> Result<String, ModelError> {
        let span = info_span!("model_call", job_key = %job.key(), model = %model.model());
        self.config
            .backoff
            .clone()
            .with_max_attempts(job.llm_config.max_retries)
            .retry(ModelError::is_transient, || model.invoke(prompt, &job.llm_config))
            .instrument(span)
            .await
    }

    fn fixer(&self, model: &Arc<ModelHandle>) -> Arc<ModelHandle> {
        let Some(fixer) = &self.config.fixer_model else {
            return model.clone();
        };
        match self.models.get(fixer) {
            Ok(handle) => handle,
            Err(_) => {
                debug!(fixer = %fixer, "Fixer model inactive, using the job's model");
                model.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::JsonContentCodec;
    use crate::models::unlimited;
    use inventio_core::llmsim::{SimResponse, SimulatedModelProvider};
    use inventio_core::memory::InMemoryJobStore;
    use inventio_core::{Language, ManualClock};
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        store: Arc<InMemoryJobStore>,
        provider: SimulatedModelProvider,
        models: Arc<ModelRegistry>,
        executor: JobExecutor,
    }

    async fn harness(codec: JsonContentCodec, config: ExecutorConfig) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let provider = SimulatedModelProvider::new();
        let models = Arc::new(ModelRegistry::new(
            Arc::new(provider.clone()),
            store.clone(),
            5,
            unlimited(),
        ));
        models.activate(&ModelRef::default_model()).await;
        let executor = JobExecutor::new(
            store.clone(),
            models.clone(),
            Arc::new(codec),
            Arc::new(ManualClock::default()),
            config,
        );
        Harness {
            store,
            provider,
            models,
            executor,
        }
    }

    fn fast_backoff() -> ExecutorConfig {
        ExecutorConfig {
            backoff: RetryPolicy::fixed(Duration::from_millis(10), 3),
            ..ExecutorConfig::default()
        }
    }

    fn generation(id: i64) -> Job {
        Job::generation(id, ModelRef::default_model(), json!({"brief": "spring sale"}))
    }

    #[tokio::test]
    async fn test_generation_success_writes_pending_then_success() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        h.provider
            .script("openai:gpt-4o", [SimResponse::text(r#"{"title": "Spring"}"#)]);

        h.executor.run(generation(1), Assignment::Generate).await;

        assert_eq!(
            h.store.transitions(JobKind::Generation, 1),
            vec![JobState::Pending, JobState::Success]
        );
        let job = h.store.get(JobKind::Generation, 1).unwrap();
        assert_eq!(job.result, Some(json!({"title": "Spring"})));
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_inactive_model_fails_job() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        let job = Job::generation(2, ModelRef::new("groq", "llama"), json!({"brief": "x"}));

        h.executor.run(job, Assignment::Generate).await;

        let job = h.store.get(JobKind::Generation, 2).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.state_message, "model groq:llama is not active");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        h.provider.script(
            "openai:gpt-4o",
            [
                SimResponse::Error(ModelError::RateLimited),
                SimResponse::Error(ModelError::Transport("reset".into())),
                SimResponse::text(r#"{"title": "ok"}"#),
            ],
        );

        h.executor.run(generation(3), Assignment::Generate).await;

        assert_eq!(
            h.store.get(JobKind::Generation, 3).unwrap().state,
            JobState::Success
        );
        assert_eq!(h.provider.invocation_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_bounded_by_job_config() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        h.provider.script(
            "openai:gpt-4o",
            std::iter::repeat(SimResponse::Error(ModelError::RateLimited)).take(5),
        );
        let mut job = generation(4);
        job.llm_config.max_retries = 2;

        h.executor.run(job, Assignment::Generate).await;

        let job = h.store.get(JobKind::Generation, 4).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.state_message, "rate limited by provider");
        assert_eq!(h.provider.invocation_count(), 2);
    }

    #[tokio::test]
    async fn test_self_healing_repairs_output() {
        let codec = JsonContentCodec::new().with_required_fields("newsletter", &["title"]);
        let h = harness(codec, fast_backoff()).await;
        h.provider.script(
            "openai:gpt-4o",
            [
                SimResponse::text("Here you go: title=Spring"),
                SimResponse::text(r#"{"title": "Spring"}"#),
            ],
        );

        let job = generation(5).with_content_type("newsletter");
        h.executor.run(job, Assignment::Generate).await;

        let job = h.store.get(JobKind::Generation, 5).unwrap();
        assert_eq!(job.state, JobState::Success);
        let fix = &h.provider.invocations()[1].prompt;
        assert!(fix.user.contains("Here you go: title=Spring"));
    }

    #[tokio::test]
    async fn test_validation_failure_after_self_heal_budget() {
        let codec = JsonContentCodec::new().with_required_fields("newsletter", &["title"]);
        let h = harness(codec, fast_backoff()).await;
        h.provider.script(
            "openai:gpt-4o",
            std::iter::repeat(SimResponse::text(r#"{"body": "no title"}"#)).take(3),
        );

        let job = generation(6).with_content_type("newsletter");
        h.executor.run(job, Assignment::Generate).await;

        let job = h.store.get(JobKind::Generation, 6).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(
            job.state_message,
            "output validation failed after 3 attempt(s): missing field `title`"
        );
        assert_eq!(h.provider.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_fixer_model_used_when_active() {
        let config = ExecutorConfig {
            fixer_model: Some(ModelRef::new("openai", "gpt-4o-mini")),
            ..fast_backoff()
        };
        let h = harness(JsonContentCodec::new(), config).await;
        h.models
            .activate(&ModelRef::new("openai", "gpt-4o-mini"))
            .await;
        h.provider
            .script("openai:gpt-4o", [SimResponse::text("not json")]);
        h.provider
            .script("openai:gpt-4o-mini", [SimResponse::text(r#"{"title": "fixed"}"#)]);

        h.executor.run(generation(8), Assignment::Generate).await;

        let invocations = h.provider.invocations();
        assert_eq!(invocations.len(), 2);
        assert_eq!(invocations[1].model, ModelRef::new("openai", "gpt-4o-mini"));
        assert_eq!(
            h.store.get(JobKind::Generation, 8).unwrap().result,
            Some(json!({"title": "fixed"}))
        );
    }

    #[tokio::test]
    async fn test_translation_units_settle_independently() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        h.provider.script(
            "openai:gpt-4o",
            [
                SimResponse::text(r#"{"title": "Saldi"}"#),
                SimResponse::Error(ModelError::Provider {
                    status: 400,
                    message: "content filter".into(),
                }),
            ],
        );
        let job = Job::translation(
            9,
            ModelRef::default_model(),
            json!({"title": "Sale"}),
            vec![
                WorkUnit::new(1, Language::new("Italian", "it", "IT")),
                WorkUnit::new(2, Language::new("German", "de", "DE")),
            ],
        );

        h.executor.run(job, Assignment::Translate).await;

        let job = h.store.get(JobKind::Translation, 9).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.state_message, "1 of 2 translation(s) failed");
        let states: Vec<JobState> = job.units.iter().map(|u| u.state).collect();
        assert!(states.contains(&JobState::Success));
        assert!(states.contains(&JobState::Failed));
    }

    #[tokio::test]
    async fn test_revision_uses_existing_translation() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        h.provider
            .script("openai:gpt-4o", [SimResponse::text(r#"{"title": "Saldi!"}"#)]);
        let mut unit = WorkUnit::new(1, Language::new("Italian", "it", "IT"));
        unit.result = json!({"title": "Saldi"});
        let job = Job::translation(10, ModelRef::default_model(), json!({"title": "Sale"}), vec![unit]);

        h.executor
            .run(
                job,
                Assignment::Revise {
                    instructions: "add an exclamation mark".into(),
                },
            )
            .await;

        let job = h.store.get(JobKind::Translation, 10).unwrap();
        assert_eq!(job.state, JobState::Success);
        assert_eq!(job.units[0].result, json!({"title": "Saldi!"}));
        assert!(h.provider.invocations()[0]
            .prompt
            .user
            .contains("add an exclamation mark"));
    }

    #[tokio::test]
    async fn test_reasoning_models_forced_to_default_temperature() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;
        let o3 = ModelRef::new("openai", "o3");
        h.models.activate(&o3).await;

        h.executor
            .run(Job::generation(11, o3, json!({"brief": "x"})), Assignment::Generate)
            .await;

        assert_eq!(h.provider.invocations()[0].temperature, 1.0);
    }

    #[tokio::test]
    async fn test_failed_pending_write_skips_run() {
        let h = harness(JsonContentCodec::new(), fast_backoff()).await;

        h.store.fail_next_writes(1);
        h.executor.run(generation(12), Assignment::Generate).await;

        assert!(h.store.get(JobKind::Generation, 12).is_none());
        assert_eq!(h.provider.invocation_count(), 0);
    }
}
