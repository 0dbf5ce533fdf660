//! The watermark removal capability.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MediaResult;

/// Receives progress percentages (0-100) while a removal runs.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// A progress callback that discards updates.
pub fn no_progress() -> ProgressCallback {
    Arc::new(|_: u8| {})
}

/// Transforms an input video into a copy with the watermark removed.
///
/// Implementations are expected to be expensive (CPU/GPU bound). Callers
/// bound how many run at once; implementations that block the thread must
/// move their work onto `tokio::task::spawn_blocking` themselves.
#[async_trait]
pub trait WatermarkRemover: Send + Sync {
    /// Short backend name for logs and metrics.
    fn name(&self) -> &str;

    /// Verify the backend can run at all (executables present, arguments valid).
    fn check_available(&self) -> MediaResult<()> {
        Ok(())
    }

    /// Read the video at `input` and write the cleaned video to `output`.
    async fn run(&self, input: &Path, output: &Path, progress: ProgressCallback) -> MediaResult<()>;
}
