use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::job_store::StatusCounts;
use crate::services::providers::{Provider, RenderProvider};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    pub jobs: StatusCounts,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub image_provider: ComponentHealth,
    pub video_provider: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn check_provider(provider: &Provider) -> ComponentHealth {
    let start = std::time::Instant::now();
    match provider.health_check().await {
        Ok(()) => ComponentHealth {
            name: provider.name().to_string(),
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => ComponentHealth {
            name: provider.name().to_string(),
            status: "error".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    }
}

/// GET /health: provider reachability plus job counts.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let providers = state.worker.providers();
    let (image_check, video_check) =
        tokio::join!(check_provider(&providers.image), check_provider(&providers.video));

    let all_healthy = image_check.status == "ok" && video_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            image_provider: image_check,
            video_provider: video_check,
        },
        jobs: state.jobs.counts(),
    };

    (status_code, Json(response))
}
