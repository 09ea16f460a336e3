use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the job metrics emitted by the worker.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "generation_jobs_submitted_total",
        "Generation jobs accepted, by kind"
    );
    metrics::describe_counter!(
        "generation_jobs_completed_total",
        "Generation jobs that reached ready, by kind"
    );
    metrics::describe_counter!(
        "generation_jobs_failed_total",
        "Generation jobs that reached failed, by kind"
    );
    metrics::describe_histogram!(
        "generation_render_seconds",
        "Wall time of a single render including artifact write"
    );
    metrics::describe_gauge!(
        "generation_jobs_in_flight",
        "Renders currently holding a worker slot"
    );
}

/// GET /metrics: Prometheus text exposition format.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
