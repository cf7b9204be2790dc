// Scheduler control endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use inventio_scheduler::{CancelOutcome, ScheduleEntry};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{ApiError, AppState, ErrorResponse};
use crate::orchestrator::StatusSummary;

/// One live registry entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntryView {
    #[schema(example = "Generation_42")]
    pub id: String,
    #[schema(example = "generate")]
    pub name: String,
    #[schema(example = "interval[60s]")]
    pub trigger: String,
    #[schema(example = "cooperative")]
    pub executor: String,
    pub next_run: Option<DateTime<Utc>>,
    /// Whether a run is executing right now.
    pub pending: bool,
    pub last_started_at: Option<DateTime<Utc>>,
}

impl From<ScheduleEntry> for EntryView {
    fn from(entry: ScheduleEntry) -> Self {
        Self {
            id: entry.job_key,
            name: entry.name,
            trigger: entry.trigger.to_string(),
            executor: entry.executor.to_string(),
            next_run: entry.next_run,
            pending: entry.running,
            last_started_at: entry.last_started_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub paused: bool,
    pub summary: StatusSummary,
    pub jobs: Vec<EntryView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    #[schema(example = "cancelled")]
    pub status: String,
    pub job_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PauseResponse {
    pub paused: bool,
}

/// Live entries with counts by kind
#[utoipa::path(
    get,
    path = "/v1/scheduler/status",
    responses(
        (status = 200, description = "Scheduler status", body = StatusResponse)
    ),
    tag = "scheduler"
)]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.orchestrator.status();
    Json(StatusResponse {
        paused: status.paused,
        summary: status.summary,
        jobs: status.entries.into_iter().map(EntryView::from).collect(),
    })
}

/// Cancel a scheduled entry and abort its run
#[utoipa::path(
    delete,
    path = "/v1/scheduler/jobs/{job_key}",
    params(
        ("job_key" = String, Path, description = "Registry key, e.g. Generation_42")
    ),
    responses(
        (status = 200, description = "Entry cancelled", body = CancelResponse),
        (status = 404, description = "No such entry", body = ErrorResponse)
    ),
    tag = "scheduler"
)]
pub async fn cancel(
    State(state): State<AppState>,
    Path(job_key): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    match state.orchestrator.cancel(&job_key) {
        CancelOutcome::Removed => Ok(Json(CancelResponse {
            status: "cancelled".to_string(),
            job_key,
        })),
        CancelOutcome::NotFound => Err(ErrorResponse::new(format!("{job_key} is not scheduled"))
            .into_response(StatusCode::NOT_FOUND)),
    }
}

/// Hold every firing until resumed
#[utoipa::path(
    post,
    path = "/v1/scheduler/pause",
    responses(
        (status = 200, description = "Scheduler paused", body = PauseResponse)
    ),
    tag = "scheduler"
)]
pub async fn pause(State(state): State<AppState>) -> Json<PauseResponse> {
    state.orchestrator.pause();
    Json(PauseResponse { paused: true })
}

/// Resume firing
#[utoipa::path(
    post,
    path = "/v1/scheduler/resume",
    responses(
        (status = 200, description = "Scheduler resumed", body = PauseResponse)
    ),
    tag = "scheduler"
)]
pub async fn resume(State(state): State<AppState>) -> Json<PauseResponse> {
    state.orchestrator.resume();
    Json(PauseResponse { paused: false })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/scheduler/status", get(status))
        .route("/v1/scheduler/jobs/:job_key", delete(cancel))
        .route("/v1/scheduler/pause", post(pause))
        .route("/v1/scheduler/resume", post(resume))
        .with_state(state)
}
