// Model client abstractions
//
// The orchestrator only needs two things from a model vendor: build a client
// for a `provider:model` name, and send it a prompt. Everything vendor-specific
// lives behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::ModelError;

/// Fully-qualified model name, `provider:model`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelRef {
    pub provider: String,
    pub name: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
        }
    }

    /// Model used when a job does not name one.
    pub fn default_model() -> Self {
        Self::new("openai", "gpt-4o")
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.name)
    }
}

impl FromStr for ModelRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((provider, name)) if !provider.is_empty() && !name.is_empty() => {
                Ok(Self::new(provider, name))
            }
            _ => Err(ModelError::InvalidName(s.to_string())),
        }
    }
}

impl Serialize for ModelRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-job model call parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LlmCallConfig {
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Deadline for a single model call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Attempts allowed for transient provider failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_temperature() -> f32 {
    0.5
}

const DEFAULT_TIMEOUT_SECS: u64 = 180;

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS as f64
}

fn default_max_retries() -> u32 {
    3
}

impl Default for LlmCallConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl LlmCallConfig {
    /// Per-call deadline. Values that are not a positive, representable
    /// number of seconds fall back to the default.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

/// A rendered prompt ready to be sent to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// An initialized, ready-to-call model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, prompt: &Prompt, config: &LlmCallConfig) -> Result<String, ModelError>;
}

pub type BoxedModelClient = Arc<dyn ModelClient>;

/// Builds model clients by name. Initialization may perform network I/O
/// (auth checks, a liveness probe) and is therefore async.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn init(&self, model: &ModelRef) -> Result<BoxedModelClient, ModelError>;
}

/// Provider part of a model record, as listed by the Job Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
}

/// Model record as listed by the Job Store (`GET llm_models/?active=true`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub provider: ProviderInfo,
    pub name: String,
}

impl ModelEntry {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: ProviderInfo {
                name: provider.into(),
            },
            name: name.into(),
        }
    }

    pub fn model_ref(&self) -> ModelRef {
        ModelRef::new(self.provider.name.clone(), self.name.clone())
    }
}

impl From<&ModelRef> for ModelEntry {
    fn from(model: &ModelRef) -> Self {
        Self::new(model.provider.clone(), model.name.clone())
    }
}

/// Activation outcome reported back to the Job Store (`PUT llm_models/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatusReport {
    pub provider_name: String,
    pub model_name: String,
    pub active: bool,
    #[serde(default)]
    pub state_message: String,
}

impl ModelStatusReport {
    pub fn new(model: &ModelRef, active: bool, state_message: impl Into<String>) -> Self {
        Self {
            provider_name: model.provider.clone(),
            model_name: model.name.clone(),
            active,
            state_message: state_message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_parse() {
        let model: ModelRef = "google_genai:gemini-2.5-flash".parse().unwrap();
        assert_eq!(model.provider, "google_genai");
        assert_eq!(model.name, "gemini-2.5-flash");
        assert_eq!(model.to_string(), "google_genai:gemini-2.5-flash");

        // Only the first colon separates provider from model
        let model: ModelRef = "groq:qwen/qwen3-32b:free".parse().unwrap();
        assert_eq!(model.name, "qwen/qwen3-32b:free");

        assert!("gpt-4o".parse::<ModelRef>().is_err());
        assert!(":gpt-4o".parse::<ModelRef>().is_err());
        assert!("openai:".parse::<ModelRef>().is_err());
    }

    #[test]
    fn test_model_ref_serde_as_string() {
        let model = ModelRef::new("anthropic", "claude-sonnet-4-20250514");
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, "\"anthropic:claude-sonnet-4-20250514\"");
        let back: ModelRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
        assert!(serde_json::from_str::<ModelRef>("\"nocolon\"").is_err());
    }

    #[test]
    fn test_call_config_defaults_and_timeout() {
        let config: LlmCallConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.timeout(), Duration::from_secs(180));
        assert_eq!(config.max_retries, 3);

        let config = LlmCallConfig {
            timeout: -1.0,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(180));

        for timeout in [0.0, f64::NAN, f64::INFINITY, 1e30, f64::MAX] {
            let config = LlmCallConfig {
                timeout,
                ..Default::default()
            };
            assert_eq!(config.timeout(), Duration::from_secs(180));
        }

        let config = LlmCallConfig {
            timeout: 2.5,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_model_entry_wire_shape() {
        let entry: ModelEntry =
            serde_json::from_str(r#"{"provider": {"name": "openai"}, "name": "gpt-4o"}"#).unwrap();
        assert_eq!(entry.model_ref(), ModelRef::default_model());
    }
}
