// Common DTOs for the Submission API

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use inventio_scheduler::SchedulerError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::orchestrator::{Accepted, Orchestrator, SubmitError};

/// State shared by every route.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Standard error response for API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message describing what went wrong.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }

    /// Convert to axum response tuple
    pub fn into_response(self, status: StatusCode) -> (StatusCode, Json<Self>) {
        (status, Json(self))
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Acknowledgement of an accepted submission. Completion is only observable
/// through the Job Store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    /// `received` for immediate work, `scheduled` for delayed work.
    #[schema(example = "received")]
    pub status: String,
    #[schema(example = "Generation_42")]
    pub job_key: String,
    /// When the job will start (delayed submissions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl SubmitResponse {
    pub fn received(job_key: String) -> Self {
        Self {
            status: "received".to_string(),
            job_key,
            scheduled_time: None,
        }
    }
}

/// 202 for a new entry, 409 when the key is already live.
pub fn accepted(
    accepted: Accepted,
    response: impl FnOnce(&Accepted) -> SubmitResponse,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    if accepted.outcome.is_scheduled() {
        let body = response(&accepted);
        Ok((StatusCode::ACCEPTED, Json(body)))
    } else {
        Err(ErrorResponse::new(format!("{} is already scheduled", accepted.job_key))
            .into_response(StatusCode::CONFLICT))
    }
}

pub fn scheduler_error(error: SchedulerError) -> ApiError {
    let status = match error {
        SchedulerError::ShutDown => StatusCode::SERVICE_UNAVAILABLE,
        SchedulerError::InvalidKey(_) | SchedulerError::InvalidTrigger { .. } => {
            StatusCode::BAD_REQUEST
        }
    };
    ErrorResponse::new(error.to_string()).into_response(status)
}

pub fn submit_error(error: SubmitError) -> ApiError {
    match error {
        SubmitError::KindMismatch { .. } => {
            ErrorResponse::new(error.to_string()).into_response(StatusCode::UNPROCESSABLE_ENTITY)
        }
        SubmitError::Scheduler(e) => scheduler_error(e),
    }
}
