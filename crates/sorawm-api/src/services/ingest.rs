//! Upload intake: stage the file, register the task, queue the job.

use std::sync::Arc;

use sorawm_models::{Task, TaskId};
use sorawm_storage::{remove_quietly, sanitize_filename, stage_stream, StorageLayout};
use sorawm_worker::{JobDispatcher, TaskStore};
use tokio::io::AsyncRead;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

/// Turns an upload stream into a queued task.
#[derive(Clone)]
pub struct UploadIngestor {
    layout: Arc<StorageLayout>,
    store: Arc<TaskStore>,
    dispatcher: Arc<JobDispatcher>,
}

impl UploadIngestor {
    pub fn new(
        layout: Arc<StorageLayout>,
        store: Arc<TaskStore>,
        dispatcher: Arc<JobDispatcher>,
    ) -> Self {
        Self {
            layout,
            store,
            dispatcher,
        }
    }

    /// Stage `reader` to disk and queue a removal job for it.
    ///
    /// No task exists until the upload is fully on disk; a failed upload
    /// leaves neither a record nor a partial file.
    pub async fn ingest<R>(&self, original_name: &str, reader: &mut R) -> ApiResult<Task>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let task_id = TaskId::new();
        let input = self.layout.staging_path(&task_id, original_name);
        let output = self.layout.output_path(&task_id);

        let bytes = stage_stream(reader, &input).await.map_err(|e| {
            warn!(task_id = %task_id, "Upload staging failed: {}", e);
            ApiError::from(e)
        })?;

        let task = Task::new(
            task_id.clone(),
            sanitize_filename(original_name),
            input.clone(),
            output,
        );
        if let Err(e) = self.store.create(task.clone()) {
            remove_quietly(&input).await;
            return Err(ApiError::internal(e.to_string()));
        }

        info!(task_id = %task_id, bytes, "Upload staged, queueing job");

        // The handle is only needed by callers that wait; dropping it is fine.
        self.dispatcher
            .submit(task_id.clone())
            .map_err(|e| ApiError::internal(e.to_string()))?;

        Ok(task)
    }
}
