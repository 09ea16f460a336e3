use serde::Deserialize;

use crate::services::providers::ProviderKind;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory served under `/static`; rendered artifacts are written here.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Backend for image jobs: `sd_local`, `grok` or `mock`.
    #[serde(default = "default_image_provider")]
    pub image_provider: ProviderKind,

    /// Backend for video jobs: `pika` or `mock`.
    #[serde(default = "default_video_provider")]
    pub video_provider: ProviderKind,

    /// ComfyUI base URL
    #[serde(default = "default_comfyui_url")]
    pub comfyui_url: String,

    /// Checkpoint loaded by the txt2img workflow
    #[serde(default = "default_comfyui_checkpoint")]
    pub comfyui_checkpoint: String,

    /// xAI API key, required when `image_provider = grok`
    pub grok_api_key: Option<String>,

    #[serde(default = "default_grok_api_url")]
    pub grok_api_url: String,

    /// Pika API key, required when `video_provider = pika`
    pub pika_api_key: Option<String>,

    #[serde(default = "default_pika_api_url")]
    pub pika_api_url: String,

    /// Upper bound on one render, including upstream polling.
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,

    /// Per-request timeout for provider HTTP calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Interval between upstream status polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Renders allowed to run at once; further jobs wait as `pending`.
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,

    /// Drop finished jobs older than this. Unset keeps jobs forever.
    pub job_retention_secs: Option<u64>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_image_provider() -> ProviderKind {
    ProviderKind::SdLocal
}

fn default_video_provider() -> ProviderKind {
    ProviderKind::Mock
}

fn default_comfyui_url() -> String {
    "http://127.0.0.1:8188".to_string()
}

fn default_comfyui_checkpoint() -> String {
    "realisticVisionV60B1_v51VAE.safetensors".to_string()
}

fn default_grok_api_url() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_pika_api_url() -> String {
    "https://api.pika.art/v1".to_string()
}

fn default_render_timeout_secs() -> u64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_max_concurrent_renders() -> usize {
    4
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            image_provider: default_image_provider(),
            video_provider: default_video_provider(),
            comfyui_url: default_comfyui_url(),
            comfyui_checkpoint: default_comfyui_checkpoint(),
            grok_api_key: None,
            grok_api_url: default_grok_api_url(),
            pika_api_key: None,
            pika_api_url: default_pika_api_url(),
            render_timeout_secs: default_render_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent_renders: default_max_concurrent_renders(),
            job_retention_secs: None,
        }
    }
}
