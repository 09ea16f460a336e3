use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use maya_backend::app_state::AppState;
use maya_backend::config::AppConfig;
use maya_backend::routes;
use maya_backend::services::{
    providers::ProviderSet, retention, storage::ArtifactStore, worker::WorkerLimits,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing MAYA media service");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    // Prepare static artifact storage
    let static_dir = PathBuf::from(&config.static_dir);
    let artifacts = ArtifactStore::new(&static_dir);
    artifacts
        .ensure_dirs()
        .await
        .expect("Failed to create static artifact directories");

    // Initialize render providers
    tracing::info!(
        image_provider = %config.image_provider,
        video_provider = %config.video_provider,
        "Initializing render providers"
    );
    let providers = ProviderSet::from_config(&config).expect("Failed to initialize providers");

    let state = AppState::new(providers, artifacts, WorkerLimits::from_config(&config));
    let worker = Arc::clone(&state.worker);

    match config.job_retention_secs {
        Some(secs) => {
            tracing::info!(retention_secs = secs, "Job retention sweeper enabled");
            retention::spawn_sweeper(Arc::clone(&state.jobs), Duration::from_secs(secs));
        }
        None => tracing::warn!(
            "JOB_RETENTION_SECS not set; finished jobs are kept in memory indefinitely"
        ),
    }

    let app = routes::router(state, &static_dir).merge(
        // Prometheus metrics endpoint (separate state)
        Router::new()
            .route("/metrics", get(routes::metrics::prometheus_metrics))
            .with_state(prometheus_handle),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, closing render worker");
    worker.shutdown();
}

/// Resolve on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
