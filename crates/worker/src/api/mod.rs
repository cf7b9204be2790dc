// Submission API
//
// Thin axum layer over the orchestrator. Every submission answers as soon as
// the job is registered; completion is only observable through the Job Store.

pub mod common;
pub mod jobs;
pub mod models;
pub mod scheduler;

pub use common::{AppState, ErrorResponse, SubmitResponse};

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::openapi::ApiDoc;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(jobs::routes(state.clone()))
        .merge(scheduler::routes(state.clone()))
        .merge(models::routes(state))
        .layer(TraceLayer::new_for_http())
}
