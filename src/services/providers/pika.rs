use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{download, ensure_success, ProviderError, RenderProvider};
use crate::models::generation::{JobParams, VideoParams};
use crate::models::job::JobKind;
use crate::services::storage::Artifact;

/// Client for the Pika text-to-video API.
pub struct PikaVideoProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct CreateVideoRequest<'a> {
    prompt: &'a str,
    style: &'a str,
    duration: u32,
}

#[derive(Deserialize)]
struct CreateVideoResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VideoStatus {
    #[serde(default)]
    pub status: String,
    pub video_url: Option<String>,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

/// Pika job phase after normalizing its status vocabulary.
#[derive(Debug, PartialEq)]
pub enum PikaPhase {
    Running,
    Done(String),
    Failed(String),
}

impl VideoStatus {
    pub fn phase(&self) -> Result<PikaPhase, ProviderError> {
        match self.status.to_ascii_lowercase().as_str() {
            "completed" | "done" | "ready" | "succeeded" => self
                .video_url
                .clone()
                .or_else(|| self.output_url.clone())
                .map(PikaPhase::Done)
                .ok_or_else(|| {
                    ProviderError::MalformedResponse("completed video has no URL".to_string())
                }),
            "pending" | "queued" | "processing" | "in_progress" | "generating" => {
                Ok(PikaPhase::Running)
            }
            other => Ok(PikaPhase::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| format!("Pika reported status '{other}'")),
            )),
        }
    }
}

impl PikaVideoProvider {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        api_key: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval,
        }
    }

    async fn create(&self, params: &VideoParams) -> Result<String, ProviderError> {
        let request = CreateVideoRequest {
            prompt: &params.prompt,
            style: &params.style,
            duration: params.duration_secs,
        };

        let response = self
            .client
            .post(format!("{}/video", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: CreateVideoResponse = ensure_success(response).await?.json().await?;

        body.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::MalformedResponse("no job id returned by Pika".to_string())
        })
    }

    async fn status(&self, pika_id: &str) -> Result<VideoStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/video/status/{}", self.api_url, pika_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn render_video(
        &self,
        job_id: Uuid,
        params: &VideoParams,
    ) -> Result<Artifact, ProviderError> {
        let pika_id = self.create(params).await?;
        tracing::info!(job_id = %job_id, pika_id = %pika_id, "Video job created on Pika");

        let video_url = loop {
            match self.status(&pika_id).await?.phase()? {
                PikaPhase::Running => tokio::time::sleep(self.poll_interval).await,
                PikaPhase::Done(url) => break url,
                PikaPhase::Failed(reason) => return Err(ProviderError::RenderFailed(reason)),
            }
        };

        let bytes = download(&self.client, &video_url).await?;
        Ok(Artifact {
            bytes,
            extension: "mp4",
        })
    }
}

impl RenderProvider for PikaVideoProvider {
    fn name(&self) -> &'static str {
        "pika"
    }

    fn supports(&self, kind: JobKind) -> bool {
        kind == JobKind::Video
    }

    async fn render(&self, job_id: Uuid, params: &JobParams) -> Result<Artifact, ProviderError> {
        match params {
            JobParams::Video(video) => self.render_video(job_id, video).await,
            other => Err(ProviderError::UnsupportedKind {
                provider: self.name(),
                kind: other.kind(),
            }),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(&self.api_url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
