// Service entry point for the comic OCR/translation consensus pipeline

use comic_relay::core::types::{PipelineRequest, UserFeedback, ValidateRequest};
use comic_relay::core::Config;
use comic_relay::Pipeline;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "comic_relay={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== COMIC RELAY - CONSENSUS PIPELINE ===");
    info!(
        "Config: mode={:?} workers={} engine_timeout={}s global_timeout={}s",
        config.consensus.mode,
        config.consensus.max_workers,
        config.consensus.engine_timeout_secs,
        config.consensus.global_timeout_secs,
    );

    // Initialize pipeline
    info!("Initializing pipeline...");
    let pipeline = Arc::new(Pipeline::new(config.clone())?);
    let state = AppState { pipeline };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router with monitoring endpoints
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/engines", get(engines))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/translate", post(translate))
        .route("/recognize", post(recognize))
        .route("/validate", post(validate))
        .route("/feedback", post(feedback))
        .route("/sweep", post(sweep))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /          - Root endpoint");
    info!("  GET  /health    - Health check");
    info!("  GET  /engines   - Engine adapter status");
    info!("  GET  /metrics   - Prometheus metrics");
    info!("  GET  /stats     - Detailed statistics");
    info!("  POST /translate - Translate text (consensus)");
    info!("  POST /recognize - Recognize an image region (consensus)");
    info!("  POST /validate  - Score an assembled result batch");
    info!("  POST /feedback  - Submit a user correction");
    info!("  POST /sweep     - Reclaim expired store rows");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Comic Relay - Multi-Engine OCR/Translation Consensus Pipeline"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Engine adapter status endpoint
async fn engines(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "engines": state.pipeline.engines() }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.pipeline.metrics().to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.pipeline.stats())
}

async fn translate(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> impl IntoResponse {
    let response = state.pipeline.translate(&request).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(response))
}

async fn recognize(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> impl IntoResponse {
    let response = state.pipeline.recognize(&request).await;
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(response))
}

async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Json<serde_json::Value> {
    let result = state
        .pipeline
        .validate_batch(&request.ocr_results, &request.translations);
    Json(serde_json::json!({ "validation": result }))
}

async fn feedback(
    State(state): State<AppState>,
    Json(feedback): Json<UserFeedback>,
) -> impl IntoResponse {
    match state.pipeline.submit_feedback(&feedback) {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "accepted": true }))),
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "accepted": false, "error": e.to_string() })),
        ),
    }
}

async fn sweep(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.sweep_stores() {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({ "removed_rows": removed })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
