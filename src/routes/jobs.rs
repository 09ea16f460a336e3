use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::generation::{
    ImageParams, JobParams, StatusResponse, SubmitResponse, VideoParams,
};
use crate::models::job::{JobKind, JobStatus};
use crate::routes::error::ApiResult;
use crate::services::job_store::JobStore;

/// POST /api/v1/jobs: submit `{"kind": ..., "parameters": {...}}`.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(params): Json<JobParams>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let job_id = state.submitter.submit(params)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Pending,
        }),
    ))
}

/// POST /api/v1/image: submit an image job.
pub async fn submit_image(
    state: State<AppState>,
    Json(params): Json<ImageParams>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit_job(state, Json(JobParams::Image(params))).await
}

/// POST /api/v1/video: submit a video job.
pub async fn submit_video(
    state: State<AppState>,
    Json(params): Json<VideoParams>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    submit_job(state, Json(JobParams::Video(params))).await
}

/// GET /api/v1/jobs/{job_id}: poll a job of any kind. Never blocks, never mutates.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<StatusResponse> {
    Json(lookup_status(&state.jobs, &job_id, None))
}

/// GET /image/{job_id}: poll an image job.
pub async fn get_image_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<StatusResponse> {
    Json(lookup_status(&state.jobs, &job_id, Some(JobKind::Image)))
}

/// GET /video/{job_id}: poll a video job.
pub async fn get_video_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Json<StatusResponse> {
    Json(lookup_status(&state.jobs, &job_id, Some(JobKind::Video)))
}

/// Translate store state into the polling payload. Ids that fail to parse,
/// and jobs of a kind other than `kind` when one is given, are reported the
/// same way as ids that were never issued.
pub fn lookup_status(store: &JobStore, raw_id: &str, kind: Option<JobKind>) -> StatusResponse {
    Uuid::parse_str(raw_id)
        .ok()
        .and_then(|id| store.get(id))
        .filter(|job| kind.map_or(true, |k| job.kind == k))
        .map(|job| StatusResponse::from(&job))
        .unwrap_or_else(StatusResponse::not_found)
}
