// Model activation endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use inventio_core::ModelRef;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{accepted, scheduler_error, ApiError, AppState, ErrorResponse, SubmitResponse};

/// Model selector passed as query parameters.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ModelQuery {
    /// Provider name, e.g. `openai`.
    pub provider: String,
    /// Model name, e.g. `gpt-4o`.
    pub name: String,
}

impl ModelQuery {
    fn model_ref(&self) -> Result<ModelRef, ApiError> {
        if self.provider.trim().is_empty() || self.name.trim().is_empty() {
            return Err(ErrorResponse::new("provider and name are required")
                .into_response(StatusCode::BAD_REQUEST));
        }
        Ok(ModelRef::new(self.provider.trim(), self.name.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActiveModelsResponse {
    /// Active models as `provider:model`.
    #[schema(example = json!(["openai:gpt-4o"]))]
    pub models: Vec<String>,
}

/// Schedule the activation of a model
#[utoipa::path(
    post,
    path = "/v1/models/activate",
    params(ModelQuery),
    responses(
        (status = 202, description = "Activation received", body = SubmitResponse),
        (status = 400, description = "Missing provider or name", body = ErrorResponse),
        (status = 409, description = "Activation already scheduled", body = ErrorResponse)
    ),
    tag = "models"
)]
pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = state
        .orchestrator
        .activate_model(query.model_ref()?)
        .map_err(scheduler_error)?;
    accepted(outcome, |a| SubmitResponse::received(a.job_key.clone()))
}

/// Schedule the deactivation of a model
#[utoipa::path(
    post,
    path = "/v1/models/deactivate",
    params(ModelQuery),
    responses(
        (status = 202, description = "Deactivation received", body = SubmitResponse),
        (status = 400, description = "Missing provider or name", body = ErrorResponse),
        (status = 409, description = "Deactivation already scheduled", body = ErrorResponse)
    ),
    tag = "models"
)]
pub async fn deactivate(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let outcome = state
        .orchestrator
        .deactivate_model(query.model_ref()?)
        .map_err(scheduler_error)?;
    accepted(outcome, |a| SubmitResponse::received(a.job_key.clone()))
}

/// Models currently active in this process
#[utoipa::path(
    get,
    path = "/v1/models",
    responses(
        (status = 200, description = "Active models", body = ActiveModelsResponse)
    ),
    tag = "models"
)]
pub async fn list_active(State(state): State<AppState>) -> Json<ActiveModelsResponse> {
    Json(ActiveModelsResponse {
        models: state.orchestrator.models().active_models(),
    })
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/models", get(list_active))
        .route("/v1/models/activate", post(activate))
        .route("/v1/models/deactivate", post(deactivate))
        .with_state(state)
}
