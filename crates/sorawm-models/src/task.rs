//! Task records and their lifecycle.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a watermark removal task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted and waiting for, or running on, a worker
    #[default]
    Processing,
    /// Output produced and downloadable
    Completed,
    /// Removal failed; see the task error
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("task {task_id} is already {status}")]
    AlreadyTerminal { task_id: TaskId, status: TaskStatus },
}

/// Fallback message so a failed task never carries an empty error.
const UNKNOWN_FAILURE: &str = "Watermark removal failed for an unknown reason";

/// One client submission and its tracked lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Sanitized name of the uploaded file
    pub original_name: String,
    /// Staged upload
    pub input_location: PathBuf,
    /// Where the cleaned video is written
    pub output_location: PathBuf,
    /// Progress (0-100)
    pub progress: u8,
    /// Download reference (only when completed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_reference: Option<String>,
    /// Error message (only when failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task in the `Processing` state.
    pub fn new(
        id: TaskId,
        original_name: impl Into<String>,
        input_location: impl Into<PathBuf>,
        output_location: impl Into<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Processing,
            original_name: original_name.into(),
            input_location: input_location.into(),
            output_location: output_location.into(),
            progress: 0,
            download_reference: None,
            error: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Raise progress. Ignored once terminal or when `value` would not move it forward.
    pub fn set_progress(&mut self, value: u8) -> bool {
        let value = value.min(100);
        if self.is_terminal() || value <= self.progress {
            return false;
        }
        self.progress = value;
        self.updated_at = Utc::now();
        true
    }

    /// Mark the task as completed.
    pub fn complete(&mut self, download_reference: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        let now = Utc::now();
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.download_reference = Some(download_reference.into());
        self.error = None;
        self.updated_at = now;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Mark the task as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_processing()?;
        let error = error.into();
        let error = if error.trim().is_empty() {
            UNKNOWN_FAILURE.to_string()
        } else {
            error
        };
        let now = Utc::now();
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.download_reference = None;
        self.updated_at = now;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Project the record into what pollers see.
    pub fn view(&self) -> TaskView {
        TaskView {
            status: self.status,
            progress: self.progress,
            download_url: self.download_reference.clone(),
            error: self.error.clone(),
        }
    }

    fn ensure_processing(&self) -> Result<(), TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                task_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }
}

/// Read-only projection of a task for status polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskView {
    pub status: TaskStatus,
    pub progress: u8,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId::new(), "clip.mp4", "/in/clip.mp4", "/out/clip.mp4")
    }

    #[test]
    fn test_new_task_is_processing() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Processing);
        assert_eq!(t.progress, 0);
        assert!(t.download_reference.is_none());
        assert!(t.error.is_none());
        assert!(t.finished_at.is_none());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| TaskId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_complete_sets_reference_only() {
        let mut t = task();
        t.complete("/download/abc").unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.progress, 100);
        assert_eq!(t.download_reference.as_deref(), Some("/download/abc"));
        assert!(t.error.is_none());
        assert!(t.finished_at.is_some());
    }

    #[test]
    fn test_fail_sets_error_only() {
        let mut t = task();
        t.set_progress(40);
        t.fail("decoder crashed").unwrap();
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.error.as_deref(), Some("decoder crashed"));
        assert!(t.download_reference.is_none());
        assert_eq!(t.progress, 40);
    }

    #[test]
    fn test_fail_with_blank_message_still_has_error() {
        let mut t = task();
        t.fail("   ").unwrap();
        assert_eq!(t.error.as_deref(), Some(UNKNOWN_FAILURE));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut done = task();
        done.complete("/download/x").unwrap();
        assert!(matches!(
            done.fail("late failure"),
            Err(TransitionError::AlreadyTerminal { status: TaskStatus::Completed, .. })
        ));
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.error.is_none());

        let mut failed = task();
        failed.fail("boom").unwrap();
        assert!(failed.complete("/download/y").is_err());
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.download_reference.is_none());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut t = task();
        assert!(t.set_progress(30));
        assert!(!t.set_progress(20));
        assert!(!t.set_progress(30));
        assert_eq!(t.progress, 30);
        assert!(t.set_progress(250));
        assert_eq!(t.progress, 100);
    }

    #[test]
    fn test_progress_frozen_after_terminal() {
        let mut t = task();
        t.fail("nope").unwrap();
        assert!(!t.set_progress(90));
        assert_eq!(t.progress, 0);
    }

    #[test]
    fn test_view_serialization() {
        let mut t = task();
        t.complete("/download/abc").unwrap();
        let json = serde_json::to_value(t.view()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["progress"], 100);
        assert_eq!(json["download_url"], "/download/abc");
        assert!(json["error"].is_null());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Processing.to_string(), "processing");
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
