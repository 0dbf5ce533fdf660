//! Storage error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to stage upload to {path}: {source}")]
    StagingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn staging_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StagingFailed {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by the client rather than the disk.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StorageError::EmptyUpload)
    }
}
