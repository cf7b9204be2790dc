// Inventio worker service
//
// Loads configuration, recovers work left behind by a previous process, then
// serves the Submission API until interrupted.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use inventio_core::telemetry::{init_telemetry, TelemetryConfig};
use inventio_core::{JobStore, SystemClock};
use inventio_worker::api::{self, AppState};
use inventio_worker::{
    DryRunJobStore, HttpJobStore, JsonContentCodec, OpenAiCompatibleProvider, Orchestrator,
    OrchestratorConfig,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut telemetry_config = TelemetryConfig::from_env();
    telemetry_config.service_name = "inventio-worker".to_string();
    init_telemetry(&telemetry_config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inventio-worker starting...");

    let config = OrchestratorConfig::from_env();
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn JobStore> = if config.debug_mode {
        tracing::warn!("Debug mode: Job Store writes are discarded");
        Arc::new(DryRunJobStore)
    } else {
        let (Some(base_url), Some(token)) = (&config.backend.base_url, &config.backend.token)
        else {
            anyhow::bail!("BACKEND_API_BASE_URL and BACKEND_API_TOKEN are required");
        };
        tracing::info!(base_url = %base_url, "Using Job Store backend");
        Arc::new(HttpJobStore::new(base_url, token).context("Failed to create Job Store client")?)
    };

    let provider = OpenAiCompatibleProvider::from_env().with_probe(config.model_probe);
    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        store,
        Arc::new(provider),
        Arc::new(JsonContentCodec::new()),
        Arc::new(SystemClock),
    ));

    orchestrator
        .start()
        .await
        .context("Failed to start orchestrator")?;

    // Only needed when callers live on another origin
    // Example: CORS_ALLOWED_ORIGINS="https://cms.example.com,https://admin.example.com"
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    let app = api::router(AppState::new(orchestrator.clone()));
    let app = if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    };

    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
        }
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("Server error")?;

    if !orchestrator.shutdown().await {
        tracing::warn!("Shutdown timed out with executions still running");
    }
    tracing::info!("inventio-worker stopped");
    Ok(())
}
