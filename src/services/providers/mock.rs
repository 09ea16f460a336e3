use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::time::Duration;

use image::{ImageFormat, Rgb, RgbImage};
use uuid::Uuid;

use super::{ProviderError, RenderProvider};
use crate::models::generation::JobParams;
use crate::models::job::JobKind;
use crate::services::storage::Artifact;

/// Minimal ISO base media `ftyp` box, enough for players to sniff an MP4.
const MP4_FTYP: [u8; 24] = [
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02,
    0x00, b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
];

/// Offline provider for development and tests.
///
/// Images are real PNGs of the requested size, filled with a colour derived
/// from the prompt and seed. Videos are a bare MP4 header.
#[derive(Debug, Clone, Default)]
pub struct MockProvider {
    delay: Duration,
    failure: Option<String>,
    panics: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before producing output.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every render with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Panic inside every render.
    #[cfg(test)]
    pub(crate) fn panicking() -> Self {
        Self {
            panics: true,
            ..Self::default()
        }
    }
}

impl RenderProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn supports(&self, _kind: JobKind) -> bool {
        true
    }

    async fn render(&self, job_id: Uuid, params: &JobParams) -> Result<Artifact, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(ProviderError::RenderFailed(reason.clone()));
        }
        if self.panics {
            panic!("mock render panicked for job {job_id}");
        }

        tracing::debug!(job_id = %job_id, kind = %params.kind(), "Mock render");

        match params {
            JobParams::Image(image) => {
                let color = prompt_color(&image.prompt, image.seed.unwrap_or_default());
                let bytes = solid_png(image.width as u32, image.height as u32, color)?;
                Ok(Artifact {
                    bytes,
                    extension: "png",
                })
            }
            JobParams::Video(_) => Ok(Artifact {
                bytes: MP4_FTYP.to_vec(),
                extension: "mp4",
            }),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn prompt_color(prompt: &str, seed: u64) -> [u8; 3] {
    let mut hasher = DefaultHasher::new();
    prompt.hash(&mut hasher);
    seed.hash(&mut hasher);
    let h = hasher.finish();
    [h as u8, (h >> 8) as u8, (h >> 16) as u8]
}

/// Encode a single-colour PNG.
pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Result<Vec<u8>, ProviderError> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
