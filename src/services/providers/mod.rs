//! Render providers.
//!
//! Every backend implements [`RenderProvider`]. The active backend for each
//! job kind is picked once at startup from configuration and stored as a
//! [`Provider`] variant, so dispatch is a plain `match`.

pub mod comfyui;
pub mod grok;
pub mod mock;
pub mod pika;

use std::future::Future;
use std::time::Duration;

use image::ImageFormat;
use serde::Deserialize;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::generation::JobParams;
use crate::models::job::JobKind;
use crate::services::storage::Artifact;

pub use comfyui::SdLocalProvider;
pub use grok::GrokImageProvider;
pub use mock::MockProvider;
pub use pika::PikaVideoProvider;

/// Capability set shared by all render backends.
pub trait RenderProvider {
    /// Short identifier recorded on each job.
    fn name(&self) -> &'static str;

    fn supports(&self, kind: JobKind) -> bool;

    /// Drive one render to completion and return the produced bytes.
    ///
    /// A single attempt; callers apply their own overall timeout.
    fn render(
        &self,
        job_id: Uuid,
        params: &JobParams,
    ) -> impl Future<Output = Result<Artifact, ProviderError>> + Send;

    /// Cheap reachability check used by `/health`.
    fn health_check(&self) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Provider backends selectable through configuration.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    SdLocal,
    Grok,
    Pika,
    Mock,
}

/// The configured backend for one job kind.
pub enum Provider {
    SdLocal(SdLocalProvider),
    Grok(GrokImageProvider),
    Pika(PikaVideoProvider),
    Mock(MockProvider),
}

impl Provider {
    /// Build the backend named by `provider` and check it can render `kind`.
    pub fn from_config(
        kind: JobKind,
        provider: ProviderKind,
        config: &AppConfig,
        http: &reqwest::Client,
    ) -> Result<Self, ProviderSetupError> {
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let built = match provider {
            ProviderKind::SdLocal => Provider::SdLocal(SdLocalProvider::new(
                http.clone(),
                config.comfyui_url.clone(),
                config.comfyui_checkpoint.clone(),
                poll_interval,
            )),
            ProviderKind::Grok => {
                let api_key = config
                    .grok_api_key
                    .clone()
                    .ok_or(ProviderSetupError::MissingKey("GROK_API_KEY"))?;
                Provider::Grok(GrokImageProvider::new(
                    http.clone(),
                    config.grok_api_url.clone(),
                    api_key,
                ))
            }
            ProviderKind::Pika => {
                let api_key = config
                    .pika_api_key
                    .clone()
                    .ok_or(ProviderSetupError::MissingKey("PIKA_API_KEY"))?;
                Provider::Pika(PikaVideoProvider::new(
                    http.clone(),
                    config.pika_api_url.clone(),
                    api_key,
                    poll_interval,
                ))
            }
            ProviderKind::Mock => Provider::Mock(MockProvider::new()),
        };

        if !built.supports(kind) {
            return Err(ProviderSetupError::Unsupported {
                provider: built.name(),
                kind,
            });
        }
        Ok(built)
    }
}

impl RenderProvider for Provider {
    fn name(&self) -> &'static str {
        match self {
            Provider::SdLocal(p) => p.name(),
            Provider::Grok(p) => p.name(),
            Provider::Pika(p) => p.name(),
            Provider::Mock(p) => p.name(),
        }
    }

    fn supports(&self, kind: JobKind) -> bool {
        match self {
            Provider::SdLocal(p) => p.supports(kind),
            Provider::Grok(p) => p.supports(kind),
            Provider::Pika(p) => p.supports(kind),
            Provider::Mock(p) => p.supports(kind),
        }
    }

    async fn render(&self, job_id: Uuid, params: &JobParams) -> Result<Artifact, ProviderError> {
        match self {
            Provider::SdLocal(p) => p.render(job_id, params).await,
            Provider::Grok(p) => p.render(job_id, params).await,
            Provider::Pika(p) => p.render(job_id, params).await,
            Provider::Mock(p) => p.render(job_id, params).await,
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match self {
            Provider::SdLocal(p) => p.health_check().await,
            Provider::Grok(p) => p.health_check().await,
            Provider::Pika(p) => p.health_check().await,
            Provider::Mock(p) => p.health_check().await,
        }
    }
}

/// One provider per job kind.
pub struct ProviderSet {
    pub image: Provider,
    pub video: Provider,
}

impl ProviderSet {
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderSetupError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(ProviderSetupError::Http)?;

        Ok(Self {
            image: Provider::from_config(JobKind::Image, config.image_provider, config, &http)?,
            video: Provider::from_config(JobKind::Video, config.video_provider, config, &http)?,
        })
    }

    pub fn for_kind(&self, kind: JobKind) -> &Provider {
        match kind {
            JobKind::Image => &self.image,
            JobKind::Video => &self.video,
        }
    }
}

/// Wrap raw image bytes, naming the file after the sniffed format.
pub(crate) fn image_artifact(bytes: Vec<u8>) -> Result<Artifact, ProviderError> {
    let extension = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => "png",
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        _ => return Err(ProviderError::UnsupportedFormat),
    };
    Ok(Artifact { bytes, extension })
}

/// Return the response unchanged on 2xx, otherwise an
/// [`ProviderError::Upstream`] carrying the status and body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Upstream {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Fetch a URL and return the full body.
pub(crate) async fn download(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<u8>, ProviderError> {
    let response = ensure_success(client.get(url).send().await?).await?;
    Ok(response.bytes().await?.to_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Provider {provider} does not render {kind} jobs")]
    UnsupportedKind {
        provider: &'static str,
        kind: JobKind,
    },

    #[error("Rendered output is not a supported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Render timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderSetupError {
    #[error("{0} must be set to use this provider")]
    MissingKey(&'static str),

    #[error("Provider {provider} cannot render {kind} jobs")]
    Unsupported {
        provider: &'static str,
        kind: JobKind,
    },

    #[error("Failed to build HTTP client: {0}")]
    Http(reqwest::Error),
}
