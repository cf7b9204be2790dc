// Model Registry
//
// Process-wide map from `provider:model` to an initialized client. Each slot
// is a OnceCell, so concurrent activations of one model run a single
// initialization and every caller observes the same outcome. Initializations
// across models are bounded by a semaphore.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use inventio_core::{
    BoxedModelClient, JobStore, LlmCallConfig, ModelEntry, ModelError, ModelProvider, ModelRef,
    ModelStatusReport, Prompt,
};
use inventio_scheduler::RateLimiter;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{error, info, warn};

use crate::config::RateLimitConfig;

/// Models initialized when the Job Store cannot list the active ones.
pub fn fallback_models() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("openai", "gpt-4o"),
        ModelEntry::new("google_genai", "gemini-2.5-flash"),
        ModelEntry::new("anthropic", "claude-sonnet-4-20250514"),
    ]
}

/// An initialized model with its own rate limiter.
pub struct ModelHandle {
    model: ModelRef,
    client: BoxedModelClient,
    limiter: RateLimiter,
}

impl ModelHandle {
    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Rate-limited call bounded by the job's per-call deadline.
    pub async fn invoke(&self, prompt: &Prompt, config: &LlmCallConfig) -> Result<String, ModelError> {
        self.limiter.acquire().await;
        let deadline = config.timeout();
        match tokio::time::timeout(deadline, self.client.invoke(prompt, config)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(deadline)),
        }
    }
}

type Slot = Arc<OnceCell<Arc<ModelHandle>>>;

pub struct ModelRegistry {
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn JobStore>,
    slots: DashMap<String, Slot>,
    init_permits: Semaphore,
    rate_limit: RateLimitConfig,
    fallback: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn JobStore>,
        max_concurrent_inits: usize,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            provider,
            store,
            slots: DashMap::new(),
            init_permits: Semaphore::new(max_concurrent_inits.max(1)),
            rate_limit,
            fallback: fallback_models(),
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<ModelEntry>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Initialize every model the Job Store lists as active, or the fallback
    /// list when the store cannot be reached.
    pub async fn bootstrap(&self) -> Vec<ModelStatusReport> {
        let entries = match self.store.list_active_models().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Cannot list active models, using fallback list");
                self.fallback.clone()
            }
        };
        self.initialize_all(&entries).await
    }

    /// Initialize `entries` concurrently. One model failing never affects
    /// the others; every outcome is reported individually.
    pub async fn initialize_all(&self, entries: &[ModelEntry]) -> Vec<ModelStatusReport> {
        info!(count = entries.len(), "Initializing models");
        let reports = join_all(entries.iter().map(|entry| {
            let model = entry.model_ref();
            async move { self.activate(&model).await }
        }))
        .await;

        let active = reports.iter().filter(|r| r.active).count();
        info!(active, failed = reports.len() - active, "Model initialization finished");
        reports
    }

    /// Make `model` available. Already-active models are left untouched and
    /// nothing is reported for them.
    pub async fn activate(&self, model: &ModelRef) -> ModelStatusReport {
        let key = model.to_string();
        let slot = self.slots.entry(key).or_default().value().clone();

        if slot.initialized() {
            return ModelStatusReport::new(model, true, "");
        }

        let mut initialized_here = false;
        let result = slot
            .get_or_try_init(|| {
                initialized_here = true;
                self.initialize(model)
            })
            .await;

        let report = match result {
            Ok(_) if !initialized_here => return ModelStatusReport::new(model, true, ""),
            Ok(_) => {
                info!(model = %model, "Model active");
                ModelStatusReport::new(model, true, "")
            }
            Err(e) => {
                error!(model = %model, error = %e, "Model initialization failed");
                ModelStatusReport::new(model, false, e.to_string())
            }
        };
        self.report(&report).await;
        report
    }

    /// Drop `model`. The outcome is always reported, even when the model was
    /// not active.
    pub async fn deactivate(&self, model: &ModelRef) -> ModelStatusReport {
        let removed = self.slots.remove(&model.to_string());
        let report = match removed {
            Some((_, slot)) if slot.initialized() => {
                info!(model = %model, "Model deactivated");
                ModelStatusReport::new(model, false, "")
            }
            _ => {
                let message = ModelError::NotActive(model.to_string()).to_string();
                warn!(model = %model, "Deactivation requested for inactive model");
                ModelStatusReport::new(model, self.is_active(model), message)
            }
        };
        self.report(&report).await;
        report
    }

    pub fn get(&self, model: &ModelRef) -> Result<Arc<ModelHandle>, ModelError> {
        self.slots
            .get(&model.to_string())
            .and_then(|slot| slot.value().get().cloned())
            .ok_or_else(|| ModelError::NotActive(model.to_string()))
    }

    pub fn is_active(&self, model: &ModelRef) -> bool {
        self.get(model).is_ok()
    }

    /// Names of every active model, sorted.
    pub fn active_models(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .iter()
            .filter(|slot| slot.value().initialized())
            .map(|slot| slot.key().clone())
            .collect();
        names.sort();
        names
    }

    async fn initialize(&self, model: &ModelRef) -> Result<Arc<ModelHandle>, ModelError> {
        let _permit = self
            .init_permits
            .acquire()
            .await
            .map_err(|e| ModelError::Initialization {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        let client = self.provider.init(model).await?;
        Ok(Arc::new(ModelHandle {
            model: model.clone(),
            client,
            limiter: RateLimiter::new(
                self.rate_limit.requests_per_second,
                self.rate_limit.max_bucket_size,
                self.rate_limit.check_every,
            ),
        }))
    }

    async fn report(&self, report: &ModelStatusReport) {
        if let Err(e) = self.store.report_model_status(report).await {
            error!(
                model = %format!("{}:{}", report.provider_name, report.model_name),
                error = %e,
                "Failed to report model status"
            );
        }
    }
}

/// Rate limit that never makes a test wait.
#[cfg(test)]
pub(crate) fn unlimited() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_second: 1000.0,
        max_bucket_size: 1000,
        check_every: std::time::Duration::from_millis(1),
    }
}
