//! Local Stable Diffusion rendering through the ComfyUI HTTP API.
//!
//! A render is three calls: queue the txt2img graph with `POST /prompt`,
//! poll `GET /history/{prompt_id}` until the prompt has outputs (or an
//! error), then fetch the first output image with `GET /view`.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{ensure_success, image_artifact, ProviderError, RenderProvider};
use crate::models::generation::{ImageParams, JobParams};
use crate::models::job::JobKind;
use crate::services::storage::Artifact;

/// Filename prefix for images saved by the SaveImage node.
const OUTPUT_PREFIX: &str = "maya";

pub struct SdLocalProvider {
    client: reqwest::Client,
    api_url: String,
    checkpoint: String,
    poll_interval: Duration,
}

/// Response returned by `/prompt` after queuing a workflow.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

#[derive(Debug, Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    status: Option<HistoryStatus>,
}

#[derive(Debug, Deserialize)]
struct NodeOutput {
    #[serde(default)]
    images: Vec<OutputImage>,
}

#[derive(Debug, Deserialize)]
struct HistoryStatus {
    #[serde(default)]
    status_str: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    messages: Vec<serde_json::Value>,
}

/// A file written by a ComfyUI output node.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputImage {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

/// Where a queued prompt stands according to `/history`.
#[derive(Debug, PartialEq)]
pub enum HistoryOutcome {
    Running,
    Done(OutputImage),
    Failed(String),
}

impl SdLocalProvider {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        checkpoint: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            checkpoint,
            poll_interval,
        }
    }

    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ProviderError> {
        let body = json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn fetch_image(&self, image: &OutputImage) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await?;

        Ok(ensure_success(response).await?.bytes().await?.to_vec())
    }

    async fn render_image(
        &self,
        job_id: Uuid,
        params: &ImageParams,
    ) -> Result<Artifact, ProviderError> {
        let seed = params.seed.unwrap_or_else(random_seed);
        let workflow = build_workflow(params, &self.checkpoint, seed);

        let queued = self.submit_workflow(&workflow, &job_id.to_string()).await?;
        tracing::info!(
            job_id = %job_id,
            prompt_id = %queued.prompt_id,
            seed,
            "Workflow queued on ComfyUI"
        );

        let image = loop {
            let history = self.get_history(&queued.prompt_id).await?;
            match parse_history(&history, &queued.prompt_id)? {
                HistoryOutcome::Running => tokio::time::sleep(self.poll_interval).await,
                HistoryOutcome::Done(image) => break image,
                HistoryOutcome::Failed(reason) => return Err(ProviderError::RenderFailed(reason)),
            }
        };

        tracing::debug!(job_id = %job_id, filename = %image.filename, "ComfyUI output ready");
        image_artifact(self.fetch_image(&image).await?)
    }
}

impl RenderProvider for SdLocalProvider {
    fn name(&self) -> &'static str {
        "sd_local"
    }

    fn supports(&self, kind: JobKind) -> bool {
        kind == JobKind::Image
    }

    async fn render(&self, job_id: Uuid, params: &JobParams) -> Result<Artifact, ProviderError> {
        match params {
            JobParams::Image(image) => self.render_image(job_id, image).await,
            other => Err(ProviderError::UnsupportedKind {
                provider: self.name(),
                kind: other.kind(),
            }),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

fn random_seed() -> u64 {
    (Uuid::new_v4().as_u128() as u64) & (i64::MAX as u64)
}

/// Build the txt2img graph in ComfyUI's API prompt format: node ids as
/// string keys, each with a `class_type` and `inputs`. Links are
/// `[node_id, output_index]` pairs.
pub fn build_workflow(params: &ImageParams, checkpoint: &str, seed: u64) -> serde_json::Value {
    json!({
        "1": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": checkpoint }
        },
        "2": {
            "class_type": "CLIPTextEncode",
            "inputs": { "clip": ["1", 1], "text": params.prompt }
        },
        "3": {
            "class_type": "CLIPTextEncode",
            "inputs": { "clip": ["1", 1], "text": params.negative_prompt }
        },
        "4": {
            "class_type": "EmptyLatentImage",
            "inputs": { "width": params.width, "height": params.height, "batch_size": 1 }
        },
        "5": {
            "class_type": "KSampler",
            "inputs": {
                "model": ["1", 0],
                "positive": ["2", 0],
                "negative": ["3", 0],
                "latent_image": ["4", 0],
                "seed": seed,
                "steps": params.steps,
                "cfg": params.cfg_scale,
                "sampler_name": "dpmpp_2m",
                "scheduler": "karras",
                "denoise": 1.0
            }
        },
        "6": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["5", 0], "vae": ["1", 2] }
        },
        "7": {
            "class_type": "SaveImage",
            "inputs": { "images": ["6", 0], "filename_prefix": OUTPUT_PREFIX }
        }
    })
}

/// Interpret a `/history/{prompt_id}` body.
///
/// ComfyUI answers `{}` until the prompt has finished, then a map keyed by
/// prompt id with the node outputs and an execution status.
pub fn parse_history(
    history: &serde_json::Value,
    prompt_id: &str,
) -> Result<HistoryOutcome, ProviderError> {
    let Some(raw) = history.get(prompt_id) else {
        return Ok(HistoryOutcome::Running);
    };
    let entry: HistoryEntry = serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::MalformedResponse(format!("ComfyUI history: {e}")))?;

    if let Some(status) = &entry.status {
        if status.status_str == "error" {
            return Ok(HistoryOutcome::Failed(execution_error(&status.messages)));
        }
    }

    let first_image = entry
        .outputs
        .into_values()
        .flat_map(|output| output.images)
        .next();

    match (first_image, entry.status) {
        (Some(image), _) => Ok(HistoryOutcome::Done(image)),
        (None, Some(status)) if status.completed => Ok(HistoryOutcome::Failed(
            "ComfyUI finished without producing an image".to_string(),
        )),
        (None, _) => Ok(HistoryOutcome::Running),
    }
}

/// Pull the exception message out of ComfyUI's `[event, data]` message log.
fn execution_error(messages: &[serde_json::Value]) -> String {
    messages
        .iter()
        .filter_map(|m| m.as_array())
        .find(|m| m.first().and_then(|e| e.as_str()) == Some("execution_error"))
        .and_then(|m| m.get(1))
        .and_then(|data| {
            let node = data.get("node_type").and_then(|n| n.as_str());
            let message = data.get("exception_message").and_then(|e| e.as_str())?;
            Some(match node {
                Some(node) => format!("{node}: {}", message.trim()),
                None => message.trim().to_string(),
            })
        })
        .unwrap_or_else(|| "ComfyUI reported an execution error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ImageParams {
        ImageParams {
            prompt: "a red cube".to_string(),
            negative_prompt: "blurry".to_string(),
            width: 512,
            height: 640,
            steps: 25,
            cfg_scale: 7.5,
            seed: Some(7),
        }
    }

    #[test]
    fn test_workflow_carries_parameters() {
        let workflow = build_workflow(&params(), "model.safetensors", 7);
        assert_eq!(workflow["1"]["inputs"]["ckpt_name"], "model.safetensors");
        assert_eq!(workflow["2"]["inputs"]["text"], "a red cube");
        assert_eq!(workflow["3"]["inputs"]["text"], "blurry");
        assert_eq!(workflow["4"]["inputs"]["width"], 512);
        assert_eq!(workflow["4"]["inputs"]["height"], 640);
        assert_eq!(workflow["5"]["inputs"]["seed"], 7);
        assert_eq!(workflow["5"]["inputs"]["steps"], 25);
        assert_eq!(workflow["7"]["class_type"], "SaveImage");
    }

    #[test]
    fn test_random_seed_fits_signed_range() {
        for _ in 0..100 {
            assert!(random_seed() <= i64::MAX as u64);
        }
    }

    #[test]
    fn test_empty_history_is_running() {
        let outcome = parse_history(&json!({}), "p1").unwrap();
        assert_eq!(outcome, HistoryOutcome::Running);
    }

    #[test]
    fn test_history_with_output_is_done() {
        let history = json!({
            "p1": {
                "prompt": [],
                "outputs": {
                    "7": {
                        "images": [
                            { "filename": "maya_00001_.png", "subfolder": "", "type": "output" }
                        ]
                    }
                },
                "status": { "status_str": "success", "completed": true, "messages": [] }
            }
        });

        let outcome = parse_history(&history, "p1").unwrap();
        assert_eq!(
            outcome,
            HistoryOutcome::Done(OutputImage {
                filename: "maya_00001_.png".to_string(),
                subfolder: String::new(),
                folder_type: "output".to_string(),
            })
        );
    }

    #[test]
    fn test_history_error_reports_exception() {
        let history = json!({
            "p1": {
                "outputs": {},
                "status": {
                    "status_str": "error",
                    "completed": false,
                    "messages": [
                        ["execution_start", { "prompt_id": "p1" }],
                        ["execution_error", {
                            "prompt_id": "p1",
                            "node_type": "CheckpointLoaderSimple",
                            "exception_message": "ckpt not found\n"
                        }]
                    ]
                }
            }
        });

        let outcome = parse_history(&history, "p1").unwrap();
        assert_eq!(
            outcome,
            HistoryOutcome::Failed("CheckpointLoaderSimple: ckpt not found".to_string())
        );
    }

    #[test]
    fn test_completed_without_images_fails() {
        let history = json!({
            "p1": {
                "outputs": {},
                "status": { "status_str": "success", "completed": true, "messages": [] }
            }
        });
        assert!(matches!(
            parse_history(&history, "p1").unwrap(),
            HistoryOutcome::Failed(_)
        ));
    }
}
