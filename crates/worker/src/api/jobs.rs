// Job submission endpoints

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use inventio_core::Job;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{accepted, submit_error, ApiError, AppState, ErrorResponse, SubmitResponse};

/// Request to revise an existing translation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RetryTranslationRequest {
    /// The translation job, including each unit's current result.
    pub job: Job,
    /// Free-text revision instructions.
    #[schema(example = "Use a more formal register")]
    pub instructions: String,
}

/// Submit a generation job for immediate execution
#[utoipa::path(
    post,
    path = "/v1/jobs/generation",
    request_body = Job,
    responses(
        (status = 202, description = "Job received", body = SubmitResponse),
        (status = 409, description = "Job already scheduled", body = ErrorResponse),
        (status = 422, description = "Not a generation job", body = ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = state
        .orchestrator
        .submit_generation(job)
        .map_err(submit_error)?;
    accepted(outcome, |a| SubmitResponse::received(a.job_key.clone()))
}

/// Submit a generation job to start after a delay
#[utoipa::path(
    post,
    path = "/v1/jobs/generation/delayed/{delay_seconds}",
    params(
        ("delay_seconds" = u64, Path, description = "Seconds to wait before starting")
    ),
    request_body = Job,
    responses(
        (status = 202, description = "Job scheduled", body = SubmitResponse),
        (status = 400, description = "Delay too large", body = ErrorResponse),
        (status = 409, description = "Job already scheduled", body = ErrorResponse),
        (status = 422, description = "Not a generation job", body = ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn submit_generation_delayed(
    State(state): State<AppState>,
    Path(delay_seconds): Path<u64>,
    Json(job): Json<Job>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = state
        .orchestrator
        .submit_generation_delayed(job, Duration::from_secs(delay_seconds))
        .map_err(submit_error)?;
    accepted(outcome, |a| SubmitResponse {
        status: "scheduled".to_string(),
        job_key: a.job_key.clone(),
        scheduled_time: a.scheduled_time(),
    })
}

/// Submit a translation job for immediate execution
#[utoipa::path(
    post,
    path = "/v1/jobs/translation",
    request_body = Job,
    responses(
        (status = 202, description = "Job received", body = SubmitResponse),
        (status = 409, description = "Job already scheduled", body = ErrorResponse),
        (status = 422, description = "Not a translation job", body = ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn submit_translation(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = state
        .orchestrator
        .submit_translation(job)
        .map_err(submit_error)?;
    accepted(outcome, |a| SubmitResponse::received(a.job_key.clone()))
}

/// Revise the translations of a job following free-text instructions
#[utoipa::path(
    post,
    path = "/v1/jobs/translation/retry",
    request_body = RetryTranslationRequest,
    responses(
        (status = 202, description = "Revision received", body = SubmitResponse),
        (status = 400, description = "Empty instructions", body = ErrorResponse),
        (status = 409, description = "Revision already scheduled", body = ErrorResponse)
    ),
    tag = "jobs"
)]
pub async fn retry_translation(
    State(state): State<AppState>,
    Json(req): Json<RetryTranslationRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    if req.instructions.trim().is_empty() {
        return Err(ErrorResponse::new("instructions must not be empty")
            .into_response(StatusCode::BAD_REQUEST));
    }
    let outcome = state
        .orchestrator
        .submit_translation_retry(req.job, req.instructions)
        .map_err(submit_error)?;
    accepted(outcome, |a| SubmitResponse::received(a.job_key.clone()))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/jobs/generation", post(submit_generation))
        .route(
            "/v1/jobs/generation/delayed/:delay_seconds",
            post(submit_generation_delayed),
        )
        .route("/v1/jobs/translation", post(submit_translation))
        .route("/v1/jobs/translation/retry", post(retry_translation))
        .with_state(state)
}
