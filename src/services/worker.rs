use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::generation::JobParams;
use crate::models::job::JobKind;
use crate::services::job_store::JobStore;
use crate::services::providers::{ProviderError, ProviderSet, RenderProvider};
use crate::services::storage::{ArtifactStore, StorageError};

/// Concurrency and time limits applied to every render.
#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    pub max_concurrent_renders: usize,
    pub render_timeout: Duration,
}

impl WorkerLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_renders: config.max_concurrent_renders.max(1),
            render_timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }
}

/// Drives accepted jobs to a terminal state.
///
/// Each job gets a single render attempt bounded by the render timeout.
/// Whatever happens, the job ends `ready` or `failed`; errors are recorded
/// on the job and never propagated to the submitter.
pub struct RenderWorker {
    store: Arc<JobStore>,
    providers: ProviderSet,
    artifacts: ArtifactStore,
    permits: Semaphore,
    render_timeout: Duration,
}

impl RenderWorker {
    pub fn new(
        store: Arc<JobStore>,
        providers: ProviderSet,
        artifacts: ArtifactStore,
        limits: WorkerLimits,
    ) -> Self {
        Self {
            store,
            providers,
            artifacts,
            permits: Semaphore::new(limits.max_concurrent_renders),
            render_timeout: limits.render_timeout,
        }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Stop granting render slots. Jobs still waiting for one are failed.
    pub fn shutdown(&self) {
        self.permits.close();
    }

    /// Run one job from `pending` to `ready` or `failed`.
    pub async fn run_job(&self, job_id: Uuid, params: JobParams) {
        let kind = params.kind();

        // Jobs stay pending while waiting for a render slot.
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                self.record_failure(job_id, kind, "render worker is shutting down".to_string());
                return;
            }
        };

        if let Err(e) = self.store.mark_processing(job_id) {
            tracing::warn!(job_id = %job_id, error = %e, "Job could not be started");
            return;
        }

        tracing::info!(job_id = %job_id, kind = %kind, "Processing generation job");

        let in_flight = InFlightGuard::new();
        let start = Instant::now();
        let outcome = self.process(job_id, &params).await;
        let elapsed = start.elapsed();
        drop(in_flight);
        metrics::histogram!("generation_render_seconds", "kind" => kind.as_ref().to_string())
            .record(elapsed.as_secs_f64());

        match outcome {
            Ok(result_url) => match self.store.complete(job_id, result_url) {
                Ok(job) => {
                    metrics::counter!(
                        "generation_jobs_completed_total",
                        "kind" => kind.as_ref().to_string()
                    )
                    .increment(1);
                    tracing::info!(
                        job_id = %job_id,
                        kind = %kind,
                        result_url = job.result_url().unwrap_or_default(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Job completed successfully"
                    );
                }
                Err(e) => {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job result")
                }
            },
            Err(e) => self.record_failure(job_id, kind, e.to_string()),
        }
    }

    async fn process(&self, job_id: Uuid, params: &JobParams) -> Result<String, WorkerError> {
        let provider = self.providers.for_kind(params.kind());

        let artifact = tokio::time::timeout(self.render_timeout, provider.render(job_id, params))
            .await
            .map_err(|_| ProviderError::Timeout(self.render_timeout))??;

        Ok(self.artifacts.save(params.kind(), job_id, &artifact).await?)
    }

    /// Mark the job failed, logging and counting the failure.
    pub(crate) fn record_failure(&self, job_id: Uuid, kind: JobKind, error: String) {
        tracing::error!(job_id = %job_id, kind = %kind, error = %error, "Job processing failed");

        match self.store.fail(job_id, error) {
            Ok(_) => {
                metrics::counter!(
                    "generation_jobs_failed_total",
                    "kind" => kind.as_ref().to_string()
                )
                .increment(1);
            }
            Err(e) => tracing::warn!(job_id = %job_id, error = %e, "Failed to record job failure"),
        }
    }
}

/// Holds one unit of the in-flight gauge; released on drop, including unwinds.
struct InFlightGuard;

impl InFlightGuard {
    fn new() -> Self {
        metrics::gauge!("generation_jobs_in_flight").increment(1.0);
        Self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        metrics::gauge!("generation_jobs_in_flight").decrement(1.0);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
