// OpenAPI specification for the Submission API

use crate::api;
use crate::orchestrator::StatusSummary;
use inventio_core::{Job, JobKind, JobState, Language, LlmCallConfig, WorkUnit};
use utoipa::OpenApi;

/// OpenAPI documentation for the Inventio worker
#[derive(OpenApi)]
#[openapi(
    paths(
        api::jobs::submit_generation,
        api::jobs::submit_generation_delayed,
        api::jobs::submit_translation,
        api::jobs::retry_translation,
        api::scheduler::status,
        api::scheduler::cancel,
        api::scheduler::pause,
        api::scheduler::resume,
        api::models::activate,
        api::models::deactivate,
        api::models::list_active,
    ),
    components(
        schemas(
            Job, JobKind, JobState, WorkUnit, Language, LlmCallConfig,
            api::common::ErrorResponse,
            api::common::SubmitResponse,
            api::jobs::RetryTranslationRequest,
            api::scheduler::StatusResponse,
            api::scheduler::EntryView,
            api::scheduler::CancelResponse,
            api::scheduler::PauseResponse,
            api::models::ActiveModelsResponse,
            StatusSummary,
        )
    ),
    tags(
        (name = "jobs", description = "Generation and translation job submission"),
        (name = "scheduler", description = "Job registry inspection and control"),
        (name = "models", description = "Model activation")
    ),
    info(
        title = "Inventio Worker API",
        description = "Submission API for LLM generation and translation jobs"
    )
)]
pub struct ApiDoc;
