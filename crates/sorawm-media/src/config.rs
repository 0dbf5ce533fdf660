//! Remover backend selection.

use std::sync::Arc;

use tracing::info;

use crate::command::CommandRemover;
use crate::delogo::{DelogoRegion, DelogoRemover};
use crate::error::{MediaError, MediaResult};
use crate::remover::WatermarkRemover;

/// Default command line for the external remover.
pub const DEFAULT_REMOVER_COMMAND: &str = "sorawm --input {input} --output {output}";

/// Which removal backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemoverBackend {
    /// External program driven by `REMOVER_COMMAND`
    #[default]
    Command,
    /// FFmpeg `delogo` filter over a fixed region
    Delogo,
}

impl RemoverBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoverBackend::Command => "command",
            RemoverBackend::Delogo => "delogo",
        }
    }
}

impl std::str::FromStr for RemoverBackend {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(RemoverBackend::Command),
            "delogo" | "ffmpeg" => Ok(RemoverBackend::Delogo),
            other => Err(MediaError::InvalidCommand(format!(
                "unknown remover backend '{}'",
                other
            ))),
        }
    }
}

/// Remover configuration.
#[derive(Debug, Clone)]
pub struct RemoverConfig {
    /// Selected backend
    pub backend: RemoverBackend,
    /// Command line for the `command` backend
    pub command: String,
    /// Watermark rectangle for the `delogo` backend
    pub region: DelogoRegion,
}

impl Default for RemoverConfig {
    fn default() -> Self {
        Self {
            backend: RemoverBackend::Command,
            command: DEFAULT_REMOVER_COMMAND.to_string(),
            // Bottom-left corner of a 1280x720 frame.
            region: DelogoRegion {
                x: 10,
                y: 620,
                width: 200,
                height: 80,
            },
        }
    }
}

impl RemoverConfig {
    /// Create config from environment variables.
    ///
    /// An unknown `REMOVER_BACKEND` is an error rather than a silent fallback.
    pub fn from_env() -> MediaResult<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("REMOVER_BACKEND") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => defaults.backend,
        };

        Ok(Self {
            backend,
            command: std::env::var("REMOVER_COMMAND")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.command),
            region: DelogoRegion {
                x: env_u32("DELOGO_X", defaults.region.x),
                y: env_u32("DELOGO_Y", defaults.region.y),
                width: env_u32("DELOGO_W", defaults.region.width),
                height: env_u32("DELOGO_H", defaults.region.height),
            },
        })
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Build the configured remover.
///
/// Construction validates arguments only; call
/// [`WatermarkRemover::check_available`] to verify executables.
pub fn build_remover(config: &RemoverConfig) -> MediaResult<Arc<dyn WatermarkRemover>> {
    let remover: Arc<dyn WatermarkRemover> = match config.backend {
        RemoverBackend::Command => Arc::new(CommandRemover::parse(&config.command)?),
        RemoverBackend::Delogo => Arc::new(DelogoRemover::new(config.region)?),
    };
    info!(backend = config.backend.as_str(), "Configured watermark remover");
    Ok(remover)
}
