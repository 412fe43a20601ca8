//! HTTP API for the Scrivener service.
//!
//! This module provides the REST API endpoints for:
//! - Health monitoring
//! - Document analysis (summary, obligations, risks, Q&A)
//! - Knowledge-base chat over previously analyzed documents
//! - Job tracking

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post, put},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::StaticConfig;
use crate::service::ScrivenerService;

pub mod analysis;
pub mod jobs;

use analysis::{
    chat_with_kb_handler, find_obligations_handler, find_risks_handler, generate_summary_handler,
    qna_handler,
};
use jobs::{create_job_handler, get_job_handler, list_jobs_handler, update_job_status_handler};

/// Application state
pub struct AppState {
    pub service: Arc<ScrivenerService>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<ScrivenerService>, config: &StaticConfig) -> Router {
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Uploads carry the whole document in one multipart body
    let max_body_size = config.upload.max_file_size_bytes as usize + 64 * 1024;
    let upload_limit = DefaultBodyLimit::max(max_body_size);

    let api_routes = Router::new()
        // Analysis endpoints - with larger body limit for file uploads
        .route(
            "/summary",
            post(generate_summary_handler).layer(upload_limit.clone()),
        )
        .route(
            "/obligations",
            post(find_obligations_handler).layer(upload_limit.clone()),
        )
        .route("/risks", post(find_risks_handler).layer(upload_limit.clone()))
        .route("/qna", post(qna_handler).layer(upload_limit))
        .route("/chat_with_kb", post(chat_with_kb_handler))
        // Job endpoints
        .route("/jobs", get(list_jobs_handler))
        .route("/jobs", post(create_job_handler))
        .route("/jobs/{id}", get(get_job_handler))
        .route("/jobs/{id}/status", put(update_job_status_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llama_available = state.service.llama_healthy().await;
    let qdrant_available = state.service.vector_store_healthy().await;

    let status = match (llama_available, qdrant_available) {
        (true, true) => "healthy".to_string(),
        (false, _) => "degraded: llama-server unavailable".to_string(),
        (_, false) => "degraded: vector store unavailable".to_string(),
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        llama_available,
        qdrant_available,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
    llama_available: bool,
    qdrant_available: bool,
}
