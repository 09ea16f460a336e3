//! Test helper utilities for E2E testing

use maya_backend::app_state::AppState;
use maya_backend::routes;
use maya_backend::services::providers::{MockProvider, Provider, ProviderSet};
use maya_backend::services::storage::ArtifactStore;
use maya_backend::services::worker::WorkerLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use uuid::Uuid;

/// Response from POST /api/v1/jobs, /api/v1/image and /api/v1/video
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
}

/// Response from GET /api/v1/jobs/{job_id}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: Option<Uuid>,
    pub kind: Option<String>,
    pub status: String,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

/// A running server on an ephemeral port, backed by mock providers.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: AppState,
    pub static_dir: TempDir,
}

/// Start the real router with the given image and video providers.
pub async fn spawn_app(image: MockProvider, video: MockProvider) -> TestApp {
    spawn_app_with_timeout(image, video, Duration::from_secs(10)).await
}

pub async fn spawn_app_with_timeout(
    image: MockProvider,
    video: MockProvider,
    render_timeout: Duration,
) -> TestApp {
    let static_dir = tempfile::tempdir().expect("Failed to create temp static dir");
    let artifacts = ArtifactStore::new(static_dir.path());
    artifacts.ensure_dirs().await.expect("Failed to create artifact dirs");

    let providers = ProviderSet {
        image: Provider::Mock(image),
        video: Provider::Mock(video),
    };
    let state = AppState::new(
        providers,
        artifacts,
        WorkerLimits {
            max_concurrent_renders: 4,
            render_timeout,
        },
    );

    let app = routes::router(state.clone(), static_dir.path());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let addr = listener.local_addr().expect("No local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server error");
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        static_dir,
    }
}

impl TestApp {
    /// POST a JSON body and return the raw response.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    /// Submit and expect the job to be accepted.
    pub async fn submit(&self, path: &str, body: &serde_json::Value) -> SubmitResponse {
        let response = self.post_json(path, body).await;
        let status = response.status();
        if status != reqwest::StatusCode::ACCEPTED {
            let error_text = response.text().await.unwrap_or_default();
            panic!("Submission rejected with status {status}: {error_text}");
        }
        response.json().await.expect("Invalid submit response")
    }

    pub async fn status(&self, job_id: &str) -> StatusResponse {
        self.client
            .get(format!("{}/api/v1/jobs/{}", self.base_url, job_id))
            .send()
            .await
            .expect("Status request failed")
            .json()
            .await
            .expect("Invalid status response")
    }

    /// Poll job status until ready or failed (with timeout)
    pub async fn poll_until_terminal(&self, job_id: Uuid, timeout_secs: u64) -> StatusResponse {
        let max_attempts = timeout_secs * 20; // Poll every 50ms

        for _ in 0..max_attempts {
            let status = self.status(&job_id.to_string()).await;
            match status.status.as_str() {
                "ready" | "failed" => return status,
                "pending" | "processing" => sleep(Duration::from_millis(50)).await,
                other => panic!("Unexpected job status while polling {job_id}: {other}"),
            }
        }

        panic!("Job {job_id} did not finish within {timeout_secs} seconds");
    }
}
