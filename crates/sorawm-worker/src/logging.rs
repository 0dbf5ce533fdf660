//! Per-job logging for watermark removals.
//!
//! Every job runs inside a `remove_watermark` span carrying the task id and
//! backend; the staged paths are recorded on the span once the task is loaded
//! so later events (including the remover's own) inherit them.

use std::path::Path;
use std::time::{Duration, Instant};

use sorawm_models::TaskId;
use tracing::field::Empty;
use tracing::{error, info, warn, Span};

use crate::error::{StoreError, WorkerError};

#[derive(Debug, Clone)]
pub struct JobLogger {
    task_id: TaskId,
    backend: String,
    started: Instant,
    span: Span,
}

impl JobLogger {
    pub fn new(task_id: &TaskId, backend: &str) -> Self {
        let span = tracing::info_span!(
            "remove_watermark",
            task_id = %task_id,
            backend = %backend,
            input = Empty,
            output = Empty,
        );
        Self {
            task_id: task_id.clone(),
            backend: backend.to_string(),
            started: Instant::now(),
            span,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }

    /// Time since the job left the queue.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the staged paths and announce the run.
    pub fn started(&self, input: &Path, output: &Path) {
        self.span.record("input", tracing::field::display(input.display()));
        self.span.record("output", tracing::field::display(output.display()));
        info!(
            task_id = %self.task_id,
            backend = %self.backend,
            "Removal started"
        );
    }

    /// Log success and return the run time in seconds.
    pub fn finished(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        info!(
            task_id = %self.task_id,
            backend = %self.backend,
            elapsed_secs = secs,
            "Removal finished"
        );
        secs
    }

    pub fn failed(&self, err: &WorkerError) {
        error!(
            task_id = %self.task_id,
            backend = %self.backend,
            reason = err.reason(),
            elapsed_secs = self.elapsed().as_secs_f64(),
            "Removal failed: {}", err
        );
    }

    /// The store refused the terminal transition (already terminal or gone).
    pub fn outcome_not_recorded(&self, outcome: &str, err: &StoreError) {
        warn!(
            task_id = %self.task_id,
            outcome,
            "Could not record job outcome: {}", err
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_job_logger_carries_task_and_backend() {
        let task_id = TaskId::from_string("task-123");
        let logger = JobLogger::new(&task_id, "delogo");

        assert_eq!(logger.task_id(), &task_id);
        assert_eq!(logger.backend(), "delogo");
    }

    #[test]
    fn test_elapsed_counts_from_creation() {
        let logger = JobLogger::new(&TaskId::new(), "command");
        std::thread::sleep(Duration::from_millis(5));

        let first = logger.elapsed();
        assert!(first >= Duration::from_millis(5));
        assert!(logger.finished() >= first.as_secs_f64());
    }

    #[test]
    fn test_lifecycle_events_without_subscriber() {
        let logger = JobLogger::new(&TaskId::new(), "command");
        logger.started(&PathBuf::from("incoming/a.mp4"), &PathBuf::from("output/a.mp4"));
        logger.failed(&WorkerError::OutputMissing(PathBuf::from("output/a.mp4")));
        logger.outcome_not_recorded("failed", &StoreError::NotFound(logger.task_id().clone()));
    }
}
