// OpenAI-compatible model provider
//
// Every supported vendor exposes an OpenAI-style `chat/completions` endpoint,
// so one reqwest client covers all of them. Per-provider base URLs can be
// overridden with `{PROVIDER}_BASE_URL` (e.g. `GROQ_BASE_URL`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inventio_core::{
    BoxedModelClient, LlmCallConfig, ModelClient, ModelError, ModelProvider, ModelRef, Prompt,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Prompt sent once at init when probing is enabled.
pub const PROBE_PROMPT: &str = "Respond YES if you are here";

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable holding the API key of each known provider.
pub fn api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("OPENAI_API_KEY"),
        "google_genai" => Some("GOOGLE_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistralai" => Some("MISTRAL_API_KEY"),
        "groq" => Some("GROQ_API_KEY"),
        _ => None,
    }
}

fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "google_genai" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
        "anthropic" => Some("https://api.anthropic.com/v1"),
        "mistralai" => Some("https://api.mistral.ai/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        _ => None,
    }
}

/// Builds clients for any provider that speaks the OpenAI chat protocol.
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    http: Client,
    base_urls: HashMap<String, String>,
    api_keys: HashMap<String, String>,
    probe: bool,
}

impl Default for OpenAiCompatibleProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiCompatibleProvider {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            base_urls: HashMap::new(),
            api_keys: HashMap::new(),
            probe: true,
        }
    }

    /// Provider with base URL overrides taken from the environment.
    pub fn from_env() -> Self {
        let mut provider = Self::new();
        for name in ["openai", "google_genai", "anthropic", "mistralai", "groq"] {
            let var = format!("{}_BASE_URL", name.to_ascii_uppercase());
            if let Ok(url) = std::env::var(&var) {
                provider = provider.with_base_url(name, url);
            }
        }
        provider
    }

    pub fn with_base_url(mut self, provider: &str, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.base_urls.insert(provider.to_string(), url);
        self
    }

    /// Use this key instead of reading the provider's environment variable.
    pub fn with_api_key(mut self, provider: &str, key: impl Into<String>) -> Self {
        self.api_keys.insert(provider.to_string(), key.into());
        self
    }

    pub fn with_probe(mut self, probe: bool) -> Self {
        self.probe = probe;
        self
    }

    fn api_key(&self, model: &ModelRef) -> Result<String, ModelError> {
        if let Some(key) = self.api_keys.get(&model.provider) {
            return Ok(key.clone());
        }
        let env_var = api_key_env(&model.provider).ok_or_else(|| ModelError::NotSupported {
            model: model.to_string(),
            reason: format!("unknown provider '{}'", model.provider),
        })?;
        std::env::var(env_var)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ModelError::NoApiKey {
                model: model.to_string(),
                env_var: env_var.to_string(),
            })
    }

    fn base_url(&self, model: &ModelRef) -> Result<String, ModelError> {
        self.base_urls
            .get(&model.provider)
            .cloned()
            .or_else(|| default_base_url(&model.provider).map(str::to_string))
            .ok_or_else(|| ModelError::NotSupported {
                model: model.to_string(),
                reason: format!("no endpoint for provider '{}'", model.provider),
            })
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    async fn init(&self, model: &ModelRef) -> Result<BoxedModelClient, ModelError> {
        let api_key = self.api_key(model)?;
        let client = ChatCompletionsClient {
            http: self.http.clone(),
            endpoint: format!("{}/chat/completions", self.base_url(model)?),
            api_key,
            model: model.name.clone(),
        };

        if self.probe {
            let config = LlmCallConfig {
                timeout: PROBE_TIMEOUT.as_secs_f64(),
                ..LlmCallConfig::default()
            };
            let reply = client
                .invoke(&Prompt::new(PROBE_PROMPT), &config)
                .await
                .map_err(|e| ModelError::Initialization {
                    model: model.to_string(),
                    reason: e.to_string(),
                })?;
            debug!(model = %model, reply = %reply.trim(), "Probe answered");
        }

        info!(model = %model, "Model client initialized");
        Ok(Arc::new(client))
    }
}

struct ChatCompletionsClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn invoke(&self, prompt: &Prompt, config: &LlmCallConfig) -> Result<String, ModelError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &prompt.system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: config.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(config.timeout())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(config.timeout())
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Transport(format!("invalid completion body: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::Provider {
                status: status.as_u16(),
                message: "no choices in completion response".to_string(),
            })
    }
}
