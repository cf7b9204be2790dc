// Error taxonomy
//
// Only genuine failures are errors. The two expected scheduler signals
// (a duplicate schedule, a cancel that finds nothing) are plain enums in the
// scheduler crate and never appear here.

use std::time::Duration;

/// Failure talking to the external Job Store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with a non-success status.
    #[error("job store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The store answered with something we could not decode.
    #[error("job store response could not be decoded: {0}")]
    Decode(String),
}

/// Failure initializing or calling a model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid model name '{0}', expected provider:model")]
    InvalidName(String),

    #[error("{model} -> no API key in environment ({env_var})")]
    NoApiKey { model: String, env_var: String },

    #[error("{model} -> not supported: {reason}")]
    NotSupported { model: String, reason: String },

    #[error("{model} -> initialization failed: {reason}")]
    Initialization { model: String, reason: String },

    #[error("model {0} is not active")]
    NotActive(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ModelError {
    /// Transient failures are worth another attempt: rate limits, timeouts,
    /// provider-side 5xx and broken connections.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout(_) | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure executing one job or work unit. Always converted into a `Failed`
/// state write; never propagated to the scheduler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Provider(#[from] ModelError),

    /// Structured output still malformed after the self-healing attempts.
    #[error("output validation failed after {attempts} attempt(s): {message}")]
    Validation { attempts: u32, message: String },

    /// The job payload could not be turned into a prompt.
    #[error("cannot build prompt: {0}")]
    Prompt(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
