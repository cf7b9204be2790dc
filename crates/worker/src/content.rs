//! Content codec
//!
//! Turns job payloads into prompts and model output back into structured
//! content. The orchestrator treats both payload and output as opaque JSON;
//! content-type specific guidance and required output fields are registered
//! on [`JsonContentCodec`].

use std::collections::HashMap;

use inventio_core::{ExecutionError, Job, Prompt, WorkUnit};
use serde_json::Value;

/// Prompt construction and output parsing for every job kind.
pub trait ContentCodec: Send + Sync {
    fn generation_prompt(&self, job: &Job) -> Result<Prompt, ExecutionError>;

    fn translation_prompt(&self, job: &Job, unit: &WorkUnit) -> Result<Prompt, ExecutionError>;

    /// Revise an existing translation following free-text instructions.
    fn revision_prompt(
        &self,
        job: &Job,
        unit: &WorkUnit,
        instructions: &str,
    ) -> Result<Prompt, ExecutionError>;

    /// Ask a model to repair output that failed to parse.
    fn fix_prompt(&self, job: &Job, output: &str, error: &str) -> Prompt;

    /// Parse and validate model output. The error message is fed back into
    /// [`ContentCodec::fix_prompt`].
    fn parse(&self, job: &Job, output: &str) -> Result<Value, String>;
}

const GENERATION_SYSTEM: &str = "You are a senior copywriter for a luxury fashion retailer. \
Write persuasive, on-brand marketing copy from the brief you are given. \
Answer with a single JSON object and nothing else.";

const TRANSLATION_SYSTEM: &str = "You translate marketing content stored as JSON. \
Adapt the text to the target culture instead of translating word by word, \
keep the tone and persuasive intent, and leave identifiers, URLs and other \
technical values untouched. Answer with a JSON object that has exactly the \
structure of the input.";

const FIX_SYSTEM: &str = "You repair malformed JSON produced by another model. \
Keep the content, fix the structure, and answer with the corrected JSON object only.";

/// Default codec: JSON in, JSON out.
#[derive(Debug, Default, Clone)]
pub struct JsonContentCodec {
    guidance: HashMap<String, String>,
    required_fields: HashMap<String, Vec<String>>,
}

impl JsonContentCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra system instructions for one content type.
    pub fn with_guidance(mut self, content_type: &str, guidance: impl Into<String>) -> Self {
        self.guidance
            .insert(content_type.to_string(), guidance.into());
        self
    }

    /// Top-level fields the output must contain for one content type.
    pub fn with_required_fields(mut self, content_type: &str, fields: &[&str]) -> Self {
        self.required_fields.insert(
            content_type.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    fn system(&self, base: &str, job: &Job) -> String {
        match self.guidance.get(&job.content_type) {
            Some(extra) => format!("{base}\n\n{extra}"),
            None => base.to_string(),
        }
    }

    fn source(job: &Job) -> Result<String, ExecutionError> {
        if job.payload.is_null() {
            return Err(ExecutionError::Prompt(format!(
                "job {} has no payload",
                job.key()
            )));
        }
        serde_json::to_string_pretty(&job.payload).map_err(|e| ExecutionError::Prompt(e.to_string()))
    }
}

impl ContentCodec for JsonContentCodec {
    fn generation_prompt(&self, job: &Job) -> Result<Prompt, ExecutionError> {
        let brief = Self::source(job)?;
        let content_type = if job.content_type.is_empty() {
            "marketing copy"
        } else {
            job.content_type.as_str()
        };
        Ok(Prompt::new(format!(
            "Content type: {content_type}\n\nBrief:\n```json\n{brief}\n```\n\n\
             Return only the generated JSON object."
        ))
        .with_system(self.system(GENERATION_SYSTEM, job)))
    }

    fn translation_prompt(&self, job: &Job, unit: &WorkUnit) -> Result<Prompt, ExecutionError> {
        let source = Self::source(job)?;
        Ok(Prompt::new(format!(
            "Translate this JSON:\n```json\n{source}\n```\n\n\
             Target language: {}\n\nReturn only the translated JSON object.",
            unit.target_language.complete_name()
        ))
        .with_system(self.system(TRANSLATION_SYSTEM, job)))
    }

    fn revision_prompt(
        &self,
        job: &Job,
        unit: &WorkUnit,
        instructions: &str,
    ) -> Result<Prompt, ExecutionError> {
        let source = Self::source(job)?;
        if unit.result.is_null() {
            return Err(ExecutionError::Prompt(format!(
                "unit {} has no translation to revise",
                unit.id
            )));
        }
        let current = serde_json::to_string_pretty(&unit.result)
            .map_err(|e| ExecutionError::Prompt(e.to_string()))?;
        Ok(Prompt::new(format!(
            "Original JSON:\n```json\n{source}\n```\n\n\
             Current {} translation:\n```json\n{current}\n```\n\n\
             Revise the translation following these instructions:\n{instructions}\n\n\
             Change only what the instructions ask for and return the full revised JSON object.",
            unit.target_language.complete_name()
        ))
        .with_system(self.system(TRANSLATION_SYSTEM, job)))
    }

    fn fix_prompt(&self, _job: &Job, output: &str, error: &str) -> Prompt {
        Prompt::new(format!(
            "This output failed validation.\n\nError: {error}\n\nOutput:\n{output}\n\n\
             Return the corrected JSON object."
        ))
        .with_system(FIX_SYSTEM)
    }

    fn parse(&self, job: &Job, output: &str) -> Result<Value, String> {
        let value: Value = serde_json::from_str(strip_fences(output))
            .map_err(|e| format!("output is not valid JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "output must be a JSON object".to_string())?;

        if let Some(fields) = self.required_fields.get(&job.content_type) {
            if let Some(missing) = fields.iter().find(|f| !object.contains_key(f.as_str())) {
                return Err(format!("missing field `{missing}`"));
            }
        }
        Ok(value)
    }
}

/// Strip a surrounding markdown code fence, if any.
fn strip_fences(output: &str) -> &str {
    let trimmed = output.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
