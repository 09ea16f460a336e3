use std::sync::Arc;

use crate::services::{
    job_store::JobStore,
    providers::ProviderSet,
    storage::ArtifactStore,
    submitter::JobSubmitter,
    worker::{RenderWorker, WorkerLimits},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub submitter: Arc<JobSubmitter>,
    pub worker: Arc<RenderWorker>,
}

impl AppState {
    pub fn new(providers: ProviderSet, artifacts: ArtifactStore, limits: WorkerLimits) -> Self {
        let jobs = Arc::new(JobStore::new());
        let worker = Arc::new(RenderWorker::new(
            Arc::clone(&jobs),
            providers,
            artifacts,
            limits,
        ));
        let submitter = Arc::new(JobSubmitter::new(Arc::clone(&jobs), Arc::clone(&worker)));

        Self {
            jobs,
            submitter,
            worker,
        }
    }
}
