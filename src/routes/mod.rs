pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;

use std::path::Path;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::services::storage::STATIC_URL_PREFIX;

/// Build the API router. Artifacts under `static_dir` are served at
/// `/static`, matching the URLs handed out in job results.
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/jobs", post(jobs::submit_job))
        .route("/api/v1/jobs/{job_id}", get(jobs::get_job_status))
        .route("/api/v1/image", post(jobs::submit_image))
        .route("/api/v1/video", post(jobs::submit_video))
        // Per-kind polling paths used by the web client; a job of the other
        // kind reads as not_found.
        .route("/image/{job_id}", get(jobs::get_image_status))
        .route("/video/{job_id}", get(jobs::get_video_status))
        .with_state(state)
        .nest_service(STATIC_URL_PREFIX, ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)) // 64 KB limit
}
