use std::sync::Arc;

use uuid::Uuid;

use crate::models::generation::JobParams;
use crate::models::job::GenerationJob;
use crate::services::job_store::{JobStore, StoreError};
use crate::services::providers::RenderProvider;
use crate::services::worker::RenderWorker;

const ABORTED_MESSAGE: &str = "render task aborted unexpectedly";

/// Accepts generation requests and hands them to the render worker.
pub struct JobSubmitter {
    store: Arc<JobStore>,
    worker: Arc<RenderWorker>,
}

impl JobSubmitter {
    pub fn new(store: Arc<JobStore>, worker: Arc<RenderWorker>) -> Self {
        Self { store, worker }
    }

    /// Validate, record a pending job, and dispatch it in the background.
    ///
    /// The job is in the store before this returns, so the id can be polled
    /// straight away. Invalid parameters are rejected without creating a job.
    pub fn submit(&self, params: JobParams) -> Result<Uuid, SubmitError> {
        params.validate_params()?;

        let kind = params.kind();
        let provider = self.worker.providers().for_kind(kind).name();
        let job = GenerationJob::new(params.clone(), provider);
        let job_id = job.id;
        self.store.insert(job)?;

        metrics::counter!("generation_jobs_submitted_total", "kind" => kind.as_ref().to_string())
            .increment(1);
        tracing::info!(
            job_id = %job_id,
            kind = %kind,
            provider,
            prompt = %truncate(params.prompt(), 50),
            "Generation job submitted"
        );

        let worker = Arc::clone(&self.worker);
        let supervisor = Arc::clone(&self.worker);
        tokio::spawn(async move {
            let run = tokio::spawn(async move { worker.run_job(job_id, params).await });
            if let Err(e) = run.await {
                tracing::error!(job_id = %job_id, error = %e, "Render task aborted");
                supervisor.record_failure(job_id, kind, ABORTED_MESSAGE.to_string());
            }
        });

        Ok(job_id)
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid generation parameters: {0}")]
    Validation(#[from] garde::Report),

    #[error(transparent)]
    Store(#[from] StoreError),
}
