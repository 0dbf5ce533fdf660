//! Error types for watermark removal.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while removing a watermark.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Remover executable not found in PATH: {0}")]
    RemoverNotFound(String),

    #[error("Invalid remover command: {0}")]
    InvalidCommand(String),

    #[error("{message}{}", details(.exit_code, .stderr))]
    ProcessingFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed { message: String },

    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn details(exit_code: &Option<i32>, stderr: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(code) = exit_code {
        out.push_str(&format!(" (exit code {})", code));
    }
    if let Some(stderr) = stderr.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        out.push_str(": ");
        out.push_str(stderr);
    }
    out
}

impl MediaError {
    /// Create a processing failure error.
    pub fn processing_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ProcessingFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Whether this error means the server cannot run removals at all.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            MediaError::RemoverNotFound(_) | MediaError::InvalidCommand(_)
        )
    }
}
