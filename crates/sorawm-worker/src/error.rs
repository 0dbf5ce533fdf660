//! Worker error types.

use std::path::PathBuf;
use std::time::Duration;

use sorawm_models::{TaskId, TransitionError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Why a job did not produce a result.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Media(#[from] sorawm_media::MediaError),

    #[error("Remover produced no output at {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("Watermark removal timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Task {0} disappeared before it could run")]
    TaskVanished(TaskId),

    #[error("Remover panicked: {0}")]
    Panicked(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job dispatcher is shut down")]
    DispatcherClosed,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            WorkerError::Media(_) => "remover",
            WorkerError::OutputMissing(_) => "output_missing",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::TaskVanished(_) => "vanished",
            WorkerError::Panicked(_) => "panic",
            WorkerError::JobFailed(_) => "job",
            WorkerError::DispatcherClosed => "shutdown",
            WorkerError::Store(_) => "store",
            WorkerError::Io(_) => "io",
        }
    }
}

/// Task store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("Task already exists: {0}")]
    Duplicate(TaskId),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}
