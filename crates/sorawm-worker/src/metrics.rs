//! Job metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the binary
//! installs a recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "sorawm_jobs_submitted_total";
    pub const JOBS_STARTED_TOTAL: &str = "sorawm_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "sorawm_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "sorawm_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "sorawm_job_duration_seconds";
    pub const JOBS_QUEUED: &str = "sorawm_jobs_queued";
    pub const JOBS_IN_FLIGHT: &str = "sorawm_jobs_in_flight";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_started(backend: &str) {
    let labels = [("backend", backend.to_string())];
    counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
}

/// Record a completed job and its duration.
pub fn record_job_completed(backend: &str, duration_secs: f64) {
    let labels = [("backend", backend.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_failed(backend: &str, reason: &str) {
    let labels = [
        ("backend", backend.to_string()),
        ("reason", reason.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_jobs_queued(count: usize) {
    gauge!(names::JOBS_QUEUED).set(count as f64);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}
