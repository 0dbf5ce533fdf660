//! Task submission, status polling and download handlers.

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use futures_util::TryStreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sorawm_models::{TaskId, TaskView};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::middleware::ClientKey;
use crate::state::AppState;

/// Multipart field carrying the video.
const FILE_FIELD: &str = "file";

/// Used when the client sends no file name.
const DEFAULT_UPLOAD_NAME: &str = "upload.mp4";

/// Response for a submitted task.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub task_id: String,
}

/// POST /submit_remove_task
///
/// Charges the client's daily quota, streams the `file` field to disk and
/// queues a removal job. Responds as soon as the job is queued.
pub async fn submit_remove_task(
    State(state): State<AppState>,
    ClientKey(client): ClientKey,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    if !state.quota.admit(&client) {
        warn!(client = %client, "Daily quota exhausted");
        metrics::record_quota_rejection();
        return Err(ApiError::QuotaExceeded {
            limit: state.quota.limit(),
        });
    }

    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(upload_rejected)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();

        // Body errors lose their status once wrapped in io::Error; keep it aside.
        let body_error: Mutex<Option<ApiError>> = Mutex::new(None);
        let reader = StreamReader::new(field.map_err(|e| {
            let io_err = std::io::Error::other(e.body_text());
            *body_error.lock() = Some(upload_rejected(e));
            io_err
        }));
        tokio::pin!(reader);

        let task_id = match state.ingestor.ingest(&original_name, &mut reader).await {
            Ok(task) => {
                metrics::record_upload("accepted");
                task.id
            }
            Err(e) => {
                metrics::record_upload("failed");
                return Err(body_error.lock().take().unwrap_or(e));
            }
        };

        info!(task_id = %task_id, client = %client, file = %original_name, "Task submitted");
        return Ok(Json(SubmitResponse {
            task_id: task_id.to_string(),
            message: "Task submitted successfully".to_string(),
        }));
    }

    Err(ApiError::bad_request(format!(
        "Missing required '{}' field",
        FILE_FIELD
    )))
}

/// Keep the status multipart parsing chose (400 malformed, 413 over the limit).
fn upload_rejected(e: MultipartError) -> ApiError {
    ApiError::UploadRejected {
        status: e.status(),
        message: e.body_text(),
    }
}

/// GET /get_results?task_id=...
pub async fn get_results(
    State(state): State<AppState>,
    query: Result<Query<ResultsQuery>, QueryRejection>,
) -> ApiResult<Json<TaskView>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let view = state.results.status(&TaskId::from_string(query.task_id))?;
    Ok(Json(view))
}

/// GET /download/:task_id
///
/// Streams the cleaned video as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Response> {
    let task_id = TaskId::from_string(task_id);
    let artifact = state.results.artifact(&task_id).await?;

    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|_| ApiError::ArtifactMissing(task_id.clone()))?;
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, artifact.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(e.to_string()))
}
