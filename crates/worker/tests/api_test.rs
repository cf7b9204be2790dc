// Submission API tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use inventio_core::llmsim::SimulatedModelProvider;
use inventio_core::memory::InMemoryJobStore;
use inventio_core::{Job, Language, ModelRef, SystemClock, WorkUnit};
use inventio_worker::api::{self, AppState};
use inventio_worker::{JsonContentCodec, Orchestrator, OrchestratorConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, Arc<Orchestrator>) {
    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorConfig::default(),
        Arc::new(InMemoryJobStore::new()),
        Arc::new(SimulatedModelProvider::new()),
        Arc::new(JsonContentCodec::new()),
        Arc::new(SystemClock),
    ));
    // Keep submitted entries live so responses can be inspected.
    orchestrator.pause();
    (api::router(AppState::new(orchestrator.clone())), orchestrator)
}

fn generation(id: i64) -> Job {
    Job::generation(id, ModelRef::default_model(), json!({"brief": "spring sale"}))
}

fn translation(id: i64) -> Job {
    Job::translation(
        id,
        ModelRef::default_model(),
        json!({"title": "Spring sale"}),
        vec![WorkUnit::new(1, Language::new("French", "fr", "FR"))],
    )
}

fn post_json(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (app, _) = app();
    let (status, body) = send(&app, request("GET", "/api-doc/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/jobs/generation"].is_object());
}

#[tokio::test]
async fn test_submit_generation_then_conflict() {
    let (app, orchestrator) = app();

    let (status, body) = send(&app, post_json("/v1/jobs/generation", &generation(42))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"status": "received", "job_key": "Generation_42"}));
    assert!(orchestrator.registry().contains("Generation_42"));

    let (status, body) = send(&app, post_json("/v1/jobs/generation", &generation(42))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Generation_42 is already scheduled");
}

#[tokio::test]
async fn test_submit_wrong_kind_is_unprocessable() {
    let (app, orchestrator) = app();

    let (status, body) = send(&app, post_json("/v1/jobs/generation", &translation(3))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "expected a generation job, got translation");
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_submit_delayed_generation() {
    let (app, orchestrator) = app();

    let (status, body) = send(
        &app,
        post_json("/v1/jobs/generation/delayed/600", &generation(8)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["job_key"], "Generation_8_delayed");
    assert!(body["scheduled_time"].is_string());

    let entry = orchestrator.registry().get("Generation_8_delayed").unwrap();
    assert_eq!(entry.name, "generate");
}

#[tokio::test]
async fn test_submit_delayed_generation_rejects_huge_delay() {
    let (app, orchestrator) = app();

    let uri = format!("/v1/jobs/generation/delayed/{}", u64::MAX);
    let (status, body) = send(&app, post_json(&uri, &generation(8))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid trigger for Generation_8_delayed"));
    assert!(orchestrator.registry().is_empty());
}

#[tokio::test]
async fn test_submit_translation_and_retry() {
    let (app, orchestrator) = app();

    let (status, body) = send(&app, post_json("/v1/jobs/translation", &translation(9))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_key"], "Translation_9");

    let mut job = translation(9);
    job.units[0].result = json!({"title": "Soldes de printemps"});
    let retry = json!({"job": job, "instructions": "Use a more formal register"});
    let (status, body) = send(&app, post_json("/v1/jobs/translation/retry", &retry)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_key"], "Translation_9_retry");
    assert_eq!(
        orchestrator.registry().get("Translation_9_retry").unwrap().name,
        "retry_translate"
    );

    let empty = json!({"job": translation(9), "instructions": "  "});
    let (status, _) = send(&app, post_json("/v1/jobs/translation/retry", &empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_scheduler_status_and_cancel() {
    let (app, _) = app();
    send(&app, post_json("/v1/jobs/generation", &generation(1))).await;
    send(&app, post_json("/v1/jobs/translation", &translation(2))).await;

    let (status, body) = send(&app, request("GET", "/v1/scheduler/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paused"], true);
    assert_eq!(
        body["summary"],
        json!({"generation": 1, "translation": 1, "system": 0, "total": 2})
    );
    assert_eq!(body["jobs"][0]["id"], "Generation_1");
    assert_eq!(body["jobs"][0]["pending"], false);

    let (status, body) = send(&app, request("DELETE", "/v1/scheduler/jobs/Generation_1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "cancelled", "job_key": "Generation_1"}));

    let (status, _) = send(&app, request("DELETE", "/v1/scheduler/jobs/Generation_1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (app, orchestrator) = app();

    let (status, body) = send(&app, request("POST", "/v1/scheduler/resume")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"paused": false}));
    assert!(!orchestrator.registry().is_paused());

    let (_, body) = send(&app, request("POST", "/v1/scheduler/pause")).await;
    assert_eq!(body, json!({"paused": true}));
    assert!(orchestrator.registry().is_paused());
}

#[tokio::test]
async fn test_model_activation_endpoints() {
    let (app, orchestrator) = app();

    let (status, body) = send(
        &app,
        request("POST", "/v1/models/activate?provider=openai&name=gpt-4o"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_key"], "activate_model_openai:gpt-4o");
    assert!(orchestrator
        .registry()
        .contains("activate_model_openai:gpt-4o"));

    let (status, _) = send(
        &app,
        request("POST", "/v1/models/activate?provider=openai&name=gpt-4o"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, request("POST", "/v1/models/deactivate?provider=&name=x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, request("GET", "/v1/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"models": []}));
}
