use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::models::job::JobKind;

/// URL prefix under which the static root is mounted.
pub const STATIC_URL_PREFIX: &str = "/static";

/// Rendered output handed back by a provider.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

/// Local static-file storage for rendered artifacts.
///
/// Files land at `<root>/<kind dir>/<job_id>.<ext>` and are published as
/// root-relative URLs under [`STATIC_URL_PREFIX`].
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the per-kind directories under the static root.
    pub async fn ensure_dirs(&self) -> Result<(), StorageError> {
        for kind in [JobKind::Image, JobKind::Video] {
            tokio::fs::create_dir_all(self.root.join(kind.storage_dir())).await?;
        }
        Ok(())
    }

    /// Filesystem path of the artifact for a job.
    pub fn path_for(&self, kind: JobKind, job_id: Uuid, extension: &str) -> PathBuf {
        self.root
            .join(kind.storage_dir())
            .join(format!("{job_id}.{extension}"))
    }

    /// Root-relative URL of the artifact for a job.
    pub fn url_for(kind: JobKind, job_id: Uuid, extension: &str) -> String {
        format!(
            "{STATIC_URL_PREFIX}/{}/{job_id}.{extension}",
            kind.storage_dir()
        )
    }

    /// Write an artifact and return its public URL.
    ///
    /// Bytes go to a `.part` sibling first and are renamed into place, so a
    /// file at the final path is always complete.
    pub async fn save(
        &self,
        kind: JobKind,
        job_id: Uuid,
        artifact: &Artifact,
    ) -> Result<String, StorageError> {
        let final_path = self.path_for(kind, job_id, artifact.extension);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part_path = final_path.with_extension(format!("{}.part", artifact.extension));
        tokio::fs::write(&part_path, &artifact.bytes).await?;
        if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e.into());
        }

        tracing::debug!(
            job_id = %job_id,
            path = %final_path.display(),
            bytes = artifact.bytes.len(),
            "Artifact written"
        );

        Ok(Self::url_for(kind, job_id, artifact.extension))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}
