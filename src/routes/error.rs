use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::services::submitter::SubmitError;

/// Errors surfaced synchronously to API callers.
#[derive(Debug)]
pub enum ApiError {
    Validation(garde::Report),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(report) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid generation parameters: {report}"),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(report) => ApiError::Validation(report),
            SubmitError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
