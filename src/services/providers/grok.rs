use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{download, ensure_success, image_artifact, ProviderError, RenderProvider};
use crate::models::generation::JobParams;
use crate::models::job::JobKind;
use crate::services::storage::Artifact;

const MODEL: &str = "grok-2-image";

/// Client for the xAI image generation API.
pub struct GrokImageProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    response_format: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    b64_json: Option<String>,
    url: Option<String>,
}

/// Where the generated image bytes come from.
#[derive(Debug, PartialEq)]
enum ImagePayload {
    Inline(Vec<u8>),
    Remote(String),
}

impl GenerationResponse {
    /// Take the first image, preferring inline base64 over a URL.
    fn into_payload(self) -> Result<ImagePayload, ProviderError> {
        let image = self
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("response has no data".to_string()))?;

        match (image.b64_json, image.url) {
            (Some(encoded), _) => Ok(ImagePayload::Inline(
                base64::engine::general_purpose::STANDARD.decode(encoded)?,
            )),
            (None, Some(url)) => Ok(ImagePayload::Remote(url)),
            (None, None) => Err(ProviderError::MalformedResponse(
                "image entry has neither b64_json nor url".to_string(),
            )),
        }
    }
}

impl GrokImageProvider {
    pub fn new(client: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn generate(&self, job_id: Uuid, prompt: &str) -> Result<Artifact, ProviderError> {
        let request = GenerationRequest {
            model: MODEL,
            prompt,
            n: 1,
            response_format: "b64_json",
        };

        tracing::info!(job_id = %job_id, model = MODEL, "Requesting image from xAI");

        let response = self
            .client
            .post(format!("{}/images/generations", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: GenerationResponse = ensure_success(response).await?.json().await?;

        let bytes = match body.into_payload()? {
            ImagePayload::Inline(bytes) => bytes,
            ImagePayload::Remote(url) => download(&self.client, &url).await?,
        };

        image_artifact(bytes)
    }
}

impl RenderProvider for GrokImageProvider {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn supports(&self, kind: JobKind) -> bool {
        kind == JobKind::Image
    }

    async fn render(&self, job_id: Uuid, params: &JobParams) -> Result<Artifact, ProviderError> {
        match params {
            JobParams::Image(image) => self.generate(job_id, &image.prompt).await,
            other => Err(ProviderError::UnsupportedKind {
                provider: self.name(),
                kind: other.kind(),
            }),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.api_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}
