//! FFmpeg `delogo` remover for watermarks at a fixed position.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::command::{resolve_program, run_process};
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;
use crate::remover::{ProgressCallback, WatermarkRemover};

/// Rectangle covering the watermark, in pixels from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelogoRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DelogoRegion {
    /// Build the `delogo` filter expression.
    pub fn filter(&self) -> String {
        format!(
            "delogo=x={}:y={}:w={}:h={}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Removes a watermark by interpolating over a fixed region with FFmpeg.
#[derive(Debug, Clone)]
pub struct DelogoRemover {
    region: DelogoRegion,
    ffmpeg: String,
    ffprobe: String,
}

impl DelogoRemover {
    pub fn new(region: DelogoRegion) -> MediaResult<Self> {
        if region.width == 0 || region.height == 0 {
            return Err(MediaError::InvalidCommand(
                "delogo region must have a non-zero width and height".to_string(),
            ));
        }
        Ok(Self {
            region,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        })
    }

    /// Use specific FFmpeg/FFprobe executables instead of the ones on `PATH`.
    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self.ffprobe = ffprobe.into();
        self
    }

    pub fn region(&self) -> DelogoRegion {
        self.region
    }

    /// Build the FFmpeg arguments for one job.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            self.region.filter(),
            "-c:a".to_string(),
            "copy".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Probe the input duration in milliseconds.
    async fn probe_duration_ms(&self, input: &Path) -> MediaResult<i64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let seconds: f64 = text.trim().parse().map_err(|_| MediaError::FfprobeFailed {
            message: format!("unexpected duration '{}'", text.trim()),
        })?;
        Ok((seconds * 1000.0) as i64)
    }
}

#[async_trait]
impl WatermarkRemover for DelogoRemover {
    fn name(&self) -> &str {
        "delogo"
    }

    fn check_available(&self) -> MediaResult<()> {
        resolve_program(&self.ffmpeg)?;
        resolve_program(&self.ffprobe)?;
        Ok(())
    }

    async fn run(&self, input: &Path, output: &Path, progress: ProgressCallback) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::InputNotFound(input.to_path_buf()));
        }

        // Without a duration the job still runs, it just reports no progress.
        let duration_ms = match self.probe_duration_ms(input).await {
            Ok(ms) => Some(ms),
            Err(e) => {
                warn!(input = %input.display(), "Could not probe duration: {}", e);
                None
            }
        };

        info!(
            input = %input.display(),
            filter = %self.region.filter(),
            "Running FFmpeg delogo"
        );

        let mut state = FfmpegProgress::default();
        let parse = move |line: &str| -> Option<u8> {
            if !FfmpegProgress::is_progress_line(line) {
                return None;
            }
            // Claim every key=value line so it stays out of the diagnostics.
            if state.apply_line(line) {
                if let Some(total) = duration_ms {
                    return Some(state.percentage(total) as u8);
                }
            }
            Some(0)
        };

        run_process(&self.ffmpeg, &self.build_args(input, output), parse, &progress).await
    }
}
