use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::models::generation::JobParams;

/// What a generation job produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobKind {
    Image,
    Video,
}

impl JobKind {
    /// Subdirectory of the static root that holds artifacts of this kind.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            JobKind::Image => "images",
            JobKind::Video => "videos",
        }
    }
}

/// Client-facing status of a generation job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

/// Lifecycle state of a job. Terminal variants carry their payload, so a
/// ready job always has a URL and a failed job always has a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Ready { result_url: String },
    Failed { error: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Pending => JobStatus::Pending,
            JobState::Processing => JobStatus::Processing,
            JobState::Ready { .. } => JobStatus::Ready,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }

    /// Whether moving from `self` to `next` is a forward transition.
    ///
    /// `pending -> processing -> {ready | failed}`, plus `pending -> failed`
    /// for jobs that could not be started. Terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self.status(), next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Ready)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// A single image or video generation job.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub kind: JobKind,
    pub state: JobState,
    pub params: JobParams,
    pub provider: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a fresh pending job with a new random id.
    pub fn new(params: JobParams, provider: &'static str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: params.kind(),
            state: JobState::Pending,
            params,
            provider,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn result_url(&self) -> Option<&str> {
        match &self.state {
            JobState::Ready { result_url } => Some(result_url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            JobState::Failed { error } => Some(error),
            _ => None,
        }
    }
}
