//! Status lookups and artifact resolution.

use std::path::PathBuf;
use std::sync::Arc;

use sorawm_models::{TaskId, TaskStatus, TaskView};
use sorawm_storage::output_filename;
use sorawm_worker::TaskStore;

use crate::error::{ApiError, ApiResult};

/// A completed task's output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub path: PathBuf,
    pub size: u64,
    /// Name offered to the client, `{task_id}.mp4`
    pub file_name: String,
}

/// Read-only access to task state for pollers and downloads.
#[derive(Clone)]
pub struct ResultRetriever {
    store: Arc<TaskStore>,
}

impl ResultRetriever {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self { store }
    }

    pub fn status(&self, task_id: &TaskId) -> ApiResult<TaskView> {
        self.store
            .view(task_id)
            .ok_or_else(|| ApiError::TaskNotFound(task_id.clone()))
    }

    /// Resolve the output of a completed task.
    pub async fn artifact(&self, task_id: &TaskId) -> ApiResult<ArtifactHandle> {
        let task = self
            .store
            .get(task_id)
            .ok_or_else(|| ApiError::TaskNotFound(task_id.clone()))?;

        if task.status != TaskStatus::Completed {
            return Err(ApiError::TaskNotReady(task_id.clone()));
        }

        let metadata = tokio::fs::metadata(&task.output_location)
            .await
            .map_err(|_| ApiError::ArtifactMissing(task_id.clone()))?;

        Ok(ArtifactHandle {
            path: task.output_location,
            size: metadata.len(),
            file_name: output_filename(task_id),
        })
    }
}
