// Job lifecycle types
//
// Jobs and work units are owned and persisted by the external Job Store. The
// orchestrator only ever holds a transient copy while executing one, so every
// mutation here is followed by a `JobStore::update_job` call by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::model::{LlmCallConfig, ModelRef};

/// Caller-supplied job identity, unique within its kind.
pub type JobId = i64;

/// What a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Copy generated from a structured brief. One implicit work unit.
    Generation,
    /// Existing copy translated into one or more target languages.
    Translation,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Generation, JobKind::Translation];

    /// Lowercase name used on the wire (`?kind=generation`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Translation => "translation",
        }
    }

    /// Prefix of every scheduler key for this kind.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Generation => "Generation",
            Self::Translation => "Translation",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state shared by jobs and work units.
///
/// ```text
/// Sent ──▶ Pending ──▶ Success
///   ▲         │
///   │         └──────▶ Failed
///   └── (written by the content backend)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Written by the backend, not yet picked up.
    Sent,
    /// Picked up by an executor; work may be in flight.
    Pending,
    Success,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-conflicting variants of the same logical job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyVariant {
    /// Generation submitted with a start delay.
    Delayed,
    /// Translation revision with custom instructions.
    Retry,
}

impl KeyVariant {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Delayed => "delayed",
            Self::Retry => "retry",
        }
    }
}

/// Deterministic scheduler identity of a job: `{Kind}_{id}[_{variant}]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub kind: JobKind,
    pub id: JobId,
    pub variant: Option<KeyVariant>,
}

impl JobKey {
    pub fn new(kind: JobKind, id: JobId) -> Self {
        Self {
            kind,
            id,
            variant: None,
        }
    }

    pub fn with_variant(mut self, variant: KeyVariant) -> Self {
        self.variant = Some(variant);
        self
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.key_prefix(), self.id)?;
        if let Some(variant) = self.variant {
            write!(f, "_{}", variant.suffix())?;
        }
        Ok(())
    }
}

/// Error returned when a string is not a job key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a job key: {0}")]
pub struct ParseJobKeyError(String);

impl FromStr for JobKey {
    type Err = ParseJobKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseJobKeyError(s.to_string());
        let mut parts = s.splitn(3, '_');
        let kind = match parts.next() {
            Some("Generation") => JobKind::Generation,
            Some("Translation") => JobKind::Translation,
            _ => return Err(err()),
        };
        let id = parts
            .next()
            .and_then(|id| id.parse::<JobId>().ok())
            .ok_or_else(err)?;
        let variant = match parts.next() {
            None => None,
            Some("delayed") => Some(KeyVariant::Delayed),
            Some("retry") => Some(KeyVariant::Retry),
            Some(_) => return Err(err()),
        };
        Ok(Self { kind, id, variant })
    }
}

/// Target language of a translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Language {
    #[serde(default = "default_language_id")]
    pub id: i64,
    pub name: String,
    /// ISO 639-1 code, e.g. `it`.
    pub lang_alpha2: String,
    /// ISO 3166-1 alpha-2 code, e.g. `IT`.
    pub country_alpha2: String,
}

fn default_language_id() -> i64 {
    -1
}

impl Language {
    pub fn new(
        name: impl Into<String>,
        lang_alpha2: impl Into<String>,
        country_alpha2: impl Into<String>,
    ) -> Self {
        Self {
            id: default_language_id(),
            name: name.into(),
            lang_alpha2: lang_alpha2.into(),
            country_alpha2: country_alpha2.into(),
        }
    }

    /// `Italian(it-IT)`
    pub fn complete_name(&self) -> String {
        format!(
            "{}({}-{})",
            self.name, self.lang_alpha2, self.country_alpha2
        )
    }
}

/// One target-language translation inside a translation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkUnit {
    pub id: JobId,
    pub state: JobState,
    #[serde(default)]
    pub state_message: String,
    pub target_language: Language,
    /// Translated content; `null` until the unit succeeds.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub result: Value,
}

impl WorkUnit {
    pub fn new(id: JobId, target_language: Language) -> Self {
        Self {
            id,
            state: JobState::Sent,
            state_message: String::new(),
            target_language,
            result: Value::Null,
        }
    }
}

/// One submitted unit of orchestration work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    #[serde(default = "default_state")]
    pub state: JobState,
    #[serde(default)]
    pub state_message: String,
    /// Set when the job enters `Sent`.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Set on every state transition performed by the orchestrator.
    #[serde(default)]
    pub state_changed_at: Option<DateTime<Utc>>,
    /// Set on terminal transition.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default = "ModelRef::default_model")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "openai:gpt-4o"))]
    pub model_ref: ModelRef,
    #[serde(default)]
    pub llm_config: LlmCallConfig,
    /// Category of content (newsletter, homepage, ...); interpreted by the content codec.
    #[serde(default)]
    pub content_type: String,
    /// Opaque content reference resolved by the content codec.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    /// Generated content (generation jobs only).
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<Value>,
    /// Translation targets (translation jobs only).
    #[serde(default)]
    pub units: Vec<WorkUnit>,
}

fn default_state() -> JobState {
    JobState::Sent
}

impl Job {
    /// A generation job as the backend would write it.
    pub fn generation(id: JobId, model_ref: ModelRef, payload: Value) -> Self {
        Self {
            id,
            kind: JobKind::Generation,
            state: JobState::Sent,
            state_message: String::new(),
            submitted_at: Some(Utc::now()),
            state_changed_at: None,
            completed_at: None,
            model_ref,
            llm_config: LlmCallConfig::default(),
            content_type: String::new(),
            payload,
            result: None,
            units: Vec::new(),
        }
    }

    /// A translation job with one unit per target language.
    pub fn translation(id: JobId, model_ref: ModelRef, payload: Value, units: Vec<WorkUnit>) -> Self {
        Self {
            kind: JobKind::Translation,
            units,
            ..Self::generation(id, model_ref, payload)
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = Some(at);
        self
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        for unit in &mut self.units {
            unit.state = state;
        }
        self
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.kind, self.id)
    }

    /// Job-level state. Translation jobs have no authoritative state of their
    /// own, so it is derived from the units: any unit still `Pending` keeps the
    /// job pending, then any `Sent` unit keeps it sent; a finished job is a
    /// success only if every unit succeeded.
    pub fn effective_state(&self) -> JobState {
        if self.kind == JobKind::Generation || self.units.is_empty() {
            return self.state;
        }
        let any = |state: JobState| self.units.iter().any(|u| u.state == state);
        if any(JobState::Pending) {
            JobState::Pending
        } else if any(JobState::Sent) {
            JobState::Sent
        } else if any(JobState::Failed) {
            JobState::Failed
        } else {
            JobState::Success
        }
    }

    /// Reference point for staleness checks: the last transition the
    /// orchestrator performed, falling back to submission time.
    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.state_changed_at.or(self.submitted_at)
    }

    /// Move the job and every unit to `state`.
    pub fn transition(&mut self, state: JobState, message: impl Into<String>, now: DateTime<Utc>) {
        let message = message.into();
        self.state = state;
        self.state_message = message.clone();
        self.state_changed_at = Some(now);
        if state.is_terminal() {
            self.completed_at = Some(now);
        }
        for unit in &mut self.units {
            unit.state = state;
            unit.state_message = message.clone();
        }
    }

    /// Record the outcome of a single translation unit and refresh the
    /// derived job state.
    pub fn settle_unit(
        &mut self,
        unit_id: JobId,
        outcome: Result<Value, String>,
        now: DateTime<Utc>,
    ) {
        if let Some(unit) = self.units.iter_mut().find(|u| u.id == unit_id) {
            match outcome {
                Ok(result) => {
                    unit.state = JobState::Success;
                    unit.state_message.clear();
                    unit.result = result;
                }
                Err(message) => {
                    unit.state = JobState::Failed;
                    unit.state_message = message;
                }
            }
        }
        self.state = self.effective_state();
        self.state_changed_at = Some(now);
        if self.state.is_terminal() {
            self.completed_at = Some(now);
        }
    }

    /// Apply provider-specific call constraints. OpenAI reasoning models
    /// (`openai:o1`, `openai:o3`, ...) only accept the default temperature.
    pub fn normalize(&mut self) {
        if self.model_ref.provider == "openai" && self.model_ref.name.starts_with('o') {
            self.llm_config.temperature = 1.0;
        }
    }
}
