use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{GenerationJob, JobKind, JobStatus};

/// Parameters for a text-to-image render.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImageParams {
    #[garde(length(min = 1, max = 2000), custom(not_blank))]
    pub prompt: String,

    #[serde(default)]
    #[garde(length(max = 2000))]
    pub negative_prompt: String,

    /// Signed so that a negative width is reported by validation rather than
    /// rejected by the JSON deserializer.
    #[serde(default = "default_width")]
    #[garde(range(min = 64, max = 2048), custom(multiple_of_eight))]
    pub width: i32,

    #[serde(default = "default_height")]
    #[garde(range(min = 64, max = 2048), custom(multiple_of_eight))]
    pub height: i32,

    #[serde(default = "default_steps")]
    #[garde(range(min = 1, max = 150))]
    pub steps: u32,

    #[serde(default = "default_cfg_scale")]
    #[garde(range(min = 1.0, max = 30.0))]
    pub cfg_scale: f64,

    #[serde(default)]
    #[garde(skip)]
    pub seed: Option<u64>,
}

/// Parameters for a text-to-video render.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VideoParams {
    #[garde(length(min = 1, max = 2000), custom(not_blank))]
    pub prompt: String,

    #[serde(default = "default_style")]
    #[garde(length(min = 1, max = 64))]
    pub style: String,

    #[serde(default = "default_duration")]
    #[garde(range(min = 1, max = 10))]
    pub duration_secs: u32,
}

fn default_width() -> i32 {
    512
}

fn default_height() -> i32 {
    768
}

fn default_steps() -> u32 {
    30
}

fn default_cfg_scale() -> f64 {
    8.0
}

fn default_style() -> String {
    "cinematic".to_string()
}

fn default_duration() -> u32 {
    4
}

fn not_blank(value: &String, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("must not be blank"));
    }
    Ok(())
}

fn multiple_of_eight(value: &i32, _ctx: &()) -> garde::Result {
    if value % 8 != 0 {
        return Err(garde::Error::new("must be a multiple of 8"));
    }
    Ok(())
}

/// A kind-tagged generation request: `{"kind": "image", "parameters": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "snake_case")]
pub enum JobParams {
    Image(ImageParams),
    Video(VideoParams),
}

impl JobParams {
    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Image(_) => JobKind::Image,
            JobParams::Video(_) => JobKind::Video,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            JobParams::Image(p) => &p.prompt,
            JobParams::Video(p) => &p.prompt,
        }
    }

    /// Validate the parameters against the schema of their kind.
    pub fn validate_params(&self) -> Result<(), garde::Report> {
        match self {
            JobParams::Image(p) => p.validate(),
            JobParams::Video(p) => p.validate(),
        }
    }
}

/// Response after accepting a generation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Status values exposed to polling clients. `NotFound` is a value, not an
/// error: it means the id was never issued by this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Processing,
    Ready,
    Failed,
    NotFound,
}

impl From<JobStatus> for PollStatus {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => PollStatus::Pending,
            JobStatus::Processing => PollStatus::Processing,
            JobStatus::Ready => PollStatus::Ready,
            JobStatus::Failed => PollStatus::Failed,
        }
    }
}

/// Response for querying job status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    pub status: PollStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn not_found() -> Self {
        Self {
            job_id: None,
            kind: None,
            status: PollStatus::NotFound,
            result_url: None,
            error: None,
        }
    }
}

impl From<&GenerationJob> for StatusResponse {
    fn from(job: &GenerationJob) -> Self {
        Self {
            job_id: Some(job.id),
            kind: Some(job.kind),
            status: job.status().into(),
            result_url: job.result_url().map(str::to_string),
            error: job.error().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: i32, height: i32) -> ImageParams {
        ImageParams {
            prompt: "a red cube".to_string(),
            negative_prompt: String::new(),
            width,
            height,
            steps: 30,
            cfg_scale: 8.0,
            seed: None,
        }
    }

    #[test]
    fn test_valid_image_params() {
        assert!(image(512, 512).validate().is_ok());
    }

    #[test]
    fn test_negative_width_rejected() {
        assert!(image(-512, 512).validate().is_err());
    }

    #[test]
    fn test_dimensions_out_of_bounds_rejected() {
        assert!(image(4096, 512).validate().is_err());
        assert!(image(512, 32).validate().is_err());
    }

    #[test]
    fn test_dimensions_must_be_multiple_of_eight() {
        assert!(image(513, 512).validate().is_err());
    }

    #[test]
    fn test_blank_prompt_rejected() {
        let mut params = image(512, 512);
        params.prompt = "   ".to_string();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_defaults_applied_from_json() {
        let params: ImageParams = serde_json::from_str(r#"{"prompt": "a red cube"}"#).unwrap();
        assert_eq!(params.width, 512);
        assert_eq!(params.height, 768);
        assert_eq!(params.steps, 30);
        assert!(params.seed.is_none());

        let video: VideoParams = serde_json::from_str(r#"{"prompt": "waves"}"#).unwrap();
        assert_eq!(video.style, "cinematic");
        assert_eq!(video.duration_secs, 4);
    }

    #[test]
    fn test_video_duration_bounds() {
        let video = VideoParams {
            prompt: "waves".to_string(),
            style: "cinematic".to_string(),
            duration_secs: 30,
        };
        assert!(video.validate().is_err());
    }

    #[test]
    fn test_tagged_request_parses_kind() {
        let req: JobParams = serde_json::from_str(
            r#"{"kind": "image",
                "parameters": {"prompt": "a red cube", "width": 512, "height": 512}}"#,
        )
        .unwrap();
        assert_eq!(req.kind(), JobKind::Image);
        assert!(req.validate_params().is_ok());
    }

    #[test]
    fn test_not_found_payload_shape() {
        let json = serde_json::to_value(StatusResponse::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "not_found" }));
    }
}
