//! API error types.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sorawm_models::TaskId;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Daily limit reached ({limit} videos/day)")]
    QuotaExceeded { limit: u32 },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {0} is not completed yet")]
    TaskNotReady(TaskId),

    #[error("Output file for task {0} is missing")]
    ArtifactMissing(TaskId),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Multipart body refused while reading (malformed, too large, cut off).
    #[error("Upload rejected: {message}")]
    UploadRejected { status: StatusCode, message: String },

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Upload failed: {0}")]
    UploadIo(#[from] sorawm_storage::StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::QuotaExceeded { .. } | ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::TaskNotFound(_) | ApiError::TaskNotReady(_) | ApiError::ArtifactMissing(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UploadRejected { status, .. } => *status,
            ApiError::UploadIo(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::UploadIo(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false)
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse { detail });
        if matches!(self, ApiError::RateLimited) {
            return (status, [(header::RETRY_AFTER, "1")], body).into_response();
        }
        (status, body).into_response()
    }
}
