// LLM Simulator provider
//
// A fake ModelProvider for unit and integration tests. It supports:
// - Scripted responses per model (text, error, or a call that never returns)
// - Persistent or one-off initialization failures and simulated initialization latency
// - Counters for initialization concurrency and a log of every invocation

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::ModelError;
use crate::model::{BoxedModelClient, LlmCallConfig, ModelClient, ModelProvider, ModelRef, Prompt};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum SimResponse {
    /// Return this text.
    Text(String),
    /// Fail with this error.
    Error(ModelError),
    /// Never return. Useful for timeout and blocked-job tests.
    Hang,
}

impl SimResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A recorded call to a simulated client.
#[derive(Debug, Clone)]
pub struct SimInvocation {
    pub model: ModelRef,
    pub prompt: Prompt,
    pub temperature: f32,
}

#[derive(Default)]
struct SimState {
    scripts: HashMap<String, VecDeque<SimResponse>>,
    init_failures: HashMap<String, ModelError>,
    queued_init_failures: HashMap<String, VecDeque<ModelError>>,
    invocations: Vec<SimInvocation>,
}

/// Simulated model provider for testing
///
/// # Example
///
/// ```ignore
/// use inventio_core::llmsim::{SimulatedModelProvider, SimResponse};
///
/// let provider = SimulatedModelProvider::new()
///     .with_default_response(SimResponse::text(r#"{"title": "Hello"}"#))
///     .with_init_failure("openai:gpt-3", ModelError::RateLimited);
/// ```
#[derive(Clone)]
pub struct SimulatedModelProvider {
    state: Arc<Mutex<SimState>>,
    default_response: SimResponse,
    init_delay: Duration,
    init_calls: Arc<AtomicUsize>,
    inits_in_flight: Arc<AtomicUsize>,
    peak_inits: Arc<AtomicUsize>,
}

impl Default for SimulatedModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedModelProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::default())),
            default_response: SimResponse::text(r#"{"title": "Simulated", "body": "Simulated copy."}"#),
            init_delay: Duration::ZERO,
            init_calls: Arc::new(AtomicUsize::new(0)),
            inits_in_flight: Arc::new(AtomicUsize::new(0)),
            peak_inits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply used once a model's script is exhausted.
    pub fn with_default_response(mut self, response: SimResponse) -> Self {
        self.default_response = response;
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn with_init_failure(self, model: &str, error: ModelError) -> Self {
        self.state
            .lock()
            .init_failures
            .insert(model.to_string(), error);
        self
    }

    /// Fail the next initializations of one model, one error each. Later
    /// initializations succeed unless `with_init_failure` also applies.
    pub fn fail_next_inits(&self, model: &str, errors: impl IntoIterator<Item = ModelError>) {
        self.state
            .lock()
            .queued_init_failures
            .entry(model.to_string())
            .or_default()
            .extend(errors);
    }

    /// Queue replies for one model, consumed in order.
    pub fn script(&self, model: &str, responses: impl IntoIterator<Item = SimResponse>) {
        self.state
            .lock()
            .scripts
            .entry(model.to_string())
            .or_default()
            .extend(responses);
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Highest number of initializations observed running at once.
    pub fn peak_concurrent_inits(&self) -> usize {
        self.peak_inits.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<SimInvocation> {
        self.state.lock().invocations.clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.state.lock().invocations.len()
    }

    fn next_response(&self, model: &ModelRef, prompt: &Prompt, config: &LlmCallConfig) -> SimResponse {
        let mut state = self.state.lock();
        state.invocations.push(SimInvocation {
            model: model.clone(),
            prompt: prompt.clone(),
            temperature: config.temperature,
        });
        state
            .scripts
            .get_mut(&model.to_string())
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.default_response.clone())
    }
}

#[async_trait]
impl ModelProvider for SimulatedModelProvider {
    async fn init(&self, model: &ModelRef) -> Result<BoxedModelClient, ModelError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.inits_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_inits.fetch_max(in_flight, Ordering::SeqCst);

        if !self.init_delay.is_zero() {
            tokio::time::sleep(self.init_delay).await;
        }
        self.inits_in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut state = self.state.lock();
            let key = model.to_string();
            if let Some(error) = state
                .queued_init_failures
                .get_mut(&key)
                .and_then(|queue| queue.pop_front())
            {
                return Err(error);
            }
            if let Some(error) = state.init_failures.get(&key) {
                return Err(error.clone());
            }
        }

        Ok(Arc::new(SimulatedClient {
            model: model.clone(),
            provider: self.clone(),
        }))
    }
}

struct SimulatedClient {
    model: ModelRef,
    provider: SimulatedModelProvider,
}

#[async_trait]
impl ModelClient for SimulatedClient {
    async fn invoke(&self, prompt: &Prompt, config: &LlmCallConfig) -> Result<String, ModelError> {
        match self.provider.next_response(&self.model, prompt, config) {
            SimResponse::Text(text) => Ok(text),
            SimResponse::Error(error) => Err(error),
            SimResponse::Hang => {
                std::future::pending::<()>().await;
                Err(ModelError::Timeout(config.timeout()))
            }
        }
    }
}
