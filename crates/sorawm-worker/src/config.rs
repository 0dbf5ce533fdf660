//! Worker configuration.

use std::time::Duration;

/// Upper bound for the default job concurrency.
const DEFAULT_MAX_JOBS_CAP: usize = 4;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Job timeout (`None` disables it)
    pub job_timeout: Option<Duration>,
    /// Prefix for download references, joined with the task ID
    pub download_base_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_jobs(),
            job_timeout: Some(Duration::from_secs(3600)), // 1 hour
            download_base_url: "/download".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs)
                .max(1),
            job_timeout: match std::env::var("WORKER_JOB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.job_timeout,
            },
            download_base_url: std::env::var("DOWNLOAD_BASE_URL")
                .unwrap_or(defaults.download_base_url),
        }
    }

    /// Download reference for a completed task.
    pub fn download_reference(&self, task_id: &str) -> String {
        format!("{}/{}", self.download_base_url.trim_end_matches('/'), task_id)
    }
}

fn default_max_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, DEFAULT_MAX_JOBS_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_concurrency_bounds() {
        let config = WorkerConfig::default();
        assert!(config.max_concurrent_jobs >= 1);
        assert!(config.max_concurrent_jobs <= DEFAULT_MAX_JOBS_CAP);
    }

    #[test]
    fn test_download_reference() {
        let config = WorkerConfig::default();
        assert_eq!(config.download_reference("abc"), "/download/abc");

        let config = WorkerConfig {
            download_base_url: "https://wm.example.com/download/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.download_reference("abc"),
            "https://wm.example.com/download/abc"
        );
    }
}
