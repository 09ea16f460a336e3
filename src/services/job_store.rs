use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{GenerationJob, JobState, JobStatus};

/// In-process registry of generation jobs.
///
/// Each entry is guarded by its shard lock, so writers to the same job are
/// serialized while unrelated jobs progress independently. Every mutation
/// replaces the whole state under that lock; readers only ever get clones.
#[derive(Default)]
pub struct JobStore {
    jobs: DashMap<Uuid, GenerationJob>,
}

/// Number of jobs in each status, for health reporting.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub ready: usize,
    pub failed: usize,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job. Ids are random v4 UUIDs, so a collision is a bug.
    pub fn insert(&self, job: GenerationJob) -> Result<(), StoreError> {
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(job.id)),
            Entry::Vacant(slot) => {
                slot.insert(job);
                Ok(())
            }
        }
    }

    /// Snapshot of a job, or `None` if the id is unknown.
    pub fn get(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.jobs.get(&job_id).map(|entry| entry.value().clone())
    }

    pub fn mark_processing(&self, job_id: Uuid) -> Result<GenerationJob, StoreError> {
        self.transition(job_id, JobState::Processing)
    }

    pub fn complete(&self, job_id: Uuid, result_url: String) -> Result<GenerationJob, StoreError> {
        self.transition(job_id, JobState::Ready { result_url })
    }

    pub fn fail(&self, job_id: Uuid, error: String) -> Result<GenerationJob, StoreError> {
        self.transition(job_id, JobState::Failed { error })
    }

    fn transition(&self, job_id: Uuid, next: JobState) -> Result<GenerationJob, StoreError> {
        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(StoreError::NotFound(job_id))?;

        let job = entry.value_mut();
        let to = next.status();
        if !job.state.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: job.status(),
                to,
            });
        }

        job.state = next;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.jobs.iter() {
            match entry.status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Ready => counts.ready += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop terminal jobs last updated before `cutoff`. Returns how many were
    /// removed. Jobs still in flight are never touched.
    pub fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs
            .retain(|_, job| !(job.status().is_terminal() && job.updated_at < cutoff));
        before.saturating_sub(self.jobs.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Job already exists: {0}")]
    Duplicate(Uuid),

    #[error("Invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::generation::{ImageParams, JobParams};
    use std::sync::Arc;

    fn image_job() -> GenerationJob {
        GenerationJob::new(
            JobParams::Image(ImageParams {
                prompt: "a red cube".to_string(),
                negative_prompt: String::new(),
                width: 512,
                height: 512,
                steps: 20,
                cfg_scale: 7.0,
                seed: Some(42),
            }),
            "mock",
        )
    }

    #[test]
    fn test_insert_then_get_is_pending() {
        let store = JobStore::new();
        let job = image_job();
        let id = job.id;
        store.insert(job).unwrap();

        let found = store.get(id).expect("job should be visible right after insert");
        assert_eq!(found.status(), JobStatus::Pending);
        assert!(found.result_url().is_none());
        assert!(found.error().is_none());
    }

    #[test]
    fn test_unknown_id_is_none() {
        let store = JobStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
        assert!(matches!(
            store.mark_processing(Uuid::new_v4()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_full_lifecycle_to_ready() {
        let store = JobStore::new();
        let job = image_job();
        let id = job.id;
        store.insert(job).unwrap();

        store.mark_processing(id).unwrap();
        let done = store.complete(id, format!("/static/images/{id}.png")).unwrap();
        assert_eq!(done.status(), JobStatus::Ready);
        assert_eq!(done.result_url(), Some(format!("/static/images/{id}.png").as_str()));
        assert!(done.error().is_none());
    }

    #[test]
    fn test_terminal_state_is_not_overwritten() {
        let store = JobStore::new();
        let job = image_job();
        let id = job.id;
        store.insert(job).unwrap();
        store.mark_processing(id).unwrap();
        store.fail(id, "renderer crashed".to_string()).unwrap();

        let err = store.complete(id, "/static/images/late.png".to_string());
        assert!(matches!(err, Err(StoreError::InvalidTransition { .. })));
        assert!(store.mark_processing(id).is_err());

        let job = store.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error(), Some("renderer crashed"));
        assert!(job.result_url().is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = JobStore::new();
        let job = image_job();
        store.insert(job.clone()).unwrap();
        assert!(matches!(store.insert(job), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn test_counts_and_purge() {
        let store = JobStore::new();
        let finished = image_job();
        let finished_id = finished.id;
        let running = image_job();
        let running_id = running.id;
        store.insert(finished).unwrap();
        store.insert(running).unwrap();
        store.mark_processing(finished_id).unwrap();
        store.complete(finished_id, "/static/images/a.png".to_string()).unwrap();
        store.mark_processing(running_id).unwrap();

        assert_eq!(
            store.counts(),
            StatusCounts {
                pending: 0,
                processing: 1,
                ready: 1,
                failed: 0,
            }
        );

        let removed = store.purge_finished_before(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(removed, 1);
        assert!(store.get(finished_id).is_none());
        assert!(store.get(running_id).is_some());
    }

    #[test]
    fn test_concurrent_updates_on_distinct_jobs() {
        let store = Arc::new(JobStore::new());
        let ids: Vec<Uuid> = (0..32)
            .map(|_| {
                let job = image_job();
                let id = job.id;
                store.insert(job).unwrap();
                id
            })
            .collect();

        let handles: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.mark_processing(id).unwrap();
                    if i % 2 == 0 {
                        store.complete(id, format!("/static/images/{id}.png")).unwrap();
                    } else {
                        store.fail(id, "odd job".to_string()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for (i, id) in ids.iter().enumerate() {
            let job = store.get(*id).unwrap();
            if i % 2 == 0 {
                assert_eq!(job.result_url(), Some(format!("/static/images/{id}.png").as_str()));
            } else {
                assert_eq!(job.error(), Some("odd job"));
            }
        }
    }

    #[test]
    fn test_racing_terminal_updates_only_one_wins() {
        let store = Arc::new(JobStore::new());
        let job = image_job();
        let id = job.id;
        store.insert(job).unwrap();
        store.mark_processing(id).unwrap();

        let a = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store
                    .complete(id, "/static/images/a.png".to_string())
                    .is_ok()
            })
        };
        let b = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || store.fail(id, "lost".to_string()).is_ok())
        };
        let wins = [a.join().unwrap(), b.join().unwrap()];
        assert_eq!(wins.iter().filter(|w| **w).count(), 1);
    }
}
