// Orchestrator configuration
//
// Every knob is read from the environment (after dotenvy has loaded `.env`)
// and has a default. A malformed value is logged and replaced by its default
// so a typo never keeps the service from starting.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use inventio_core::{JobKind, ModelRef};
use inventio_scheduler::MAX_TRIGGER_DELAY;
use tracing::warn;

/// Fatal configuration problems.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set unless AI_DEBUG_MODE is enabled")]
    Missing(&'static str),
}

/// Where the Job Store lives.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub base_url: Option<String>,
    /// Sent as the `TaskToken` header.
    pub token: Option<String>,
}

/// Sweep cadence and staleness threshold for one job kind.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Pending jobs older than this are considered orphaned or blocked.
    pub blocked_threshold: Duration,
    pub pending_interval: Duration,
    pub new_interval: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            blocked_threshold: Duration::from_secs(300),
            pending_interval: Duration::from_secs(60),
            new_interval: Duration::from_secs(180),
        }
    }
}

/// Per-model token bucket settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub max_bucket_size: u32,
    pub check_every: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            max_bucket_size: 10,
            check_every: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub backend: BackendConfig,
    /// Dry-run store and fallback model list.
    pub debug_mode: bool,
    pub http_addr: String,
    pub generation: SweepConfig,
    pub translation: SweepConfig,
    pub max_concurrent_model_inits: usize,
    pub blocking_workers: usize,
    pub misfire_grace: Duration,
    pub rate_limit: RateLimitConfig,
    pub self_heal_retries: u32,
    pub fixer_model: Option<ModelRef>,
    pub model_probe: bool,
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            debug_mode: false,
            http_addr: "0.0.0.0:8000".to_string(),
            generation: SweepConfig::default(),
            translation: SweepConfig::default(),
            max_concurrent_model_inits: 5,
            blocking_workers: 5,
            misfire_grace: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            self_heal_retries: 2,
            fixer_model: None,
            model_probe: true,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration from a fixed set of variables.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env { lookup };
        let defaults = Self::default();

        let sweep = |kind: &str, defaults: &SweepConfig| SweepConfig {
            blocked_threshold: env.secs(
                &format!("AI_BLOCKED_{kind}_TASK_THRESHOLD_SECONDS"),
                defaults.blocked_threshold,
            ),
            pending_interval: env.secs(
                &format!("AI_{kind}_CHECK_PENDING_SCHED_TIME"),
                defaults.pending_interval,
            ),
            new_interval: env.secs(
                &format!("AI_{kind}_CHECK_NEW_SCHED_SECONDS"),
                defaults.new_interval,
            ),
        };

        let fixer_model = env.get("AI_FIXER_MODEL").and_then(|raw| {
            raw.parse::<ModelRef>()
                .map_err(|e| warn!(error = %e, "Ignoring AI_FIXER_MODEL"))
                .ok()
        });

        Self {
            backend: BackendConfig {
                base_url: env.get("BACKEND_API_BASE_URL"),
                token: env.get("BACKEND_API_TOKEN"),
            },
            debug_mode: env.flag("AI_DEBUG_MODE", defaults.debug_mode),
            http_addr: env.get("HTTP_ADDR").unwrap_or(defaults.http_addr),
            generation: sweep("GENERATION", &defaults.generation),
            translation: sweep("TRANSLATION", &defaults.translation),
            max_concurrent_model_inits: env
                .parse("AI_MAX_CONCURRENT_MODEL_INITS", defaults.max_concurrent_model_inits)
                .max(1),
            blocking_workers: env
                .parse("AI_BLOCKING_JOB_WORKERS", defaults.blocking_workers)
                .max(1),
            misfire_grace: env.secs("AI_MISFIRE_GRACE_SECONDS", defaults.misfire_grace),
            rate_limit: RateLimitConfig {
                requests_per_second: env.parse(
                    "AI_LLM_MAX_REQUEST_PER_SECOND",
                    defaults.rate_limit.requests_per_second,
                ),
                max_bucket_size: env
                    .parse("AI_LLM_MAX_BUCKET_SIZE", defaults.rate_limit.max_bucket_size),
                check_every: env.secs("AI_LLM_CHECK_PER_SECOND", defaults.rate_limit.check_every),
            },
            self_heal_retries: env.parse("AI_SELF_HEAL_RETRIES", defaults.self_heal_retries),
            fixer_model,
            model_probe: env.flag("AI_MODEL_PROBE", defaults.model_probe),
            shutdown_timeout: env.secs("AI_SHUTDOWN_TIMEOUT_SECONDS", defaults.shutdown_timeout),
        }
    }

    /// Fail fast when the Job Store is not configured outside debug mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debug_mode {
            return Ok(());
        }
        if self.backend.base_url.is_none() {
            return Err(ConfigError::Missing("BACKEND_API_BASE_URL"));
        }
        if self.backend.token.is_none() {
            return Err(ConfigError::Missing("BACKEND_API_TOKEN"));
        }
        Ok(())
    }

    pub fn sweeps(&self, kind: JobKind) -> &SweepConfig {
        match kind {
            JobKind::Generation => &self.generation,
            JobKind::Translation => &self.translation,
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr + Copy>(&self, name: &str, default: T) -> T {
        match self.get(name) {
            None => default,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(variable = name, value = %raw, "Invalid value, using default");
                default
            }),
        }
    }

    /// Seconds, fractional values allowed. Capped at the longest delay the
    /// job registry accepts.
    fn secs(&self, name: &str, default: Duration) -> Duration {
        let secs = self.parse(name, default.as_secs_f64());
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) if !duration.is_zero() && duration <= MAX_TRIGGER_DELAY => duration,
            _ => {
                warn!(variable = name, value = secs, "Duration out of range, using default");
                default
            }
        }
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(|v| v.to_ascii_lowercase()) {
            None => default,
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
            Some(v) => {
                warn!(variable = name, value = %v, "Invalid flag, using default");
                default
            }
        }
    }
}
