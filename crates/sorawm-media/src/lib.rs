//! Watermark removal capability.
//!
//! This crate provides:
//! - The `WatermarkRemover` trait the job dispatcher drives
//! - An external-command remover with stdout progress parsing
//! - An FFmpeg `delogo` remover for fixed-position watermarks
//! - Backend selection from environment configuration

pub mod command;
pub mod config;
pub mod delogo;
pub mod error;
pub mod progress;
pub mod remover;

pub use command::CommandRemover;
pub use config::{build_remover, RemoverBackend, RemoverConfig};
pub use delogo::{DelogoRegion, DelogoRemover};
pub use error::{MediaError, MediaResult};
pub use progress::{parse_percent, FfmpegProgress};
pub use remover::{no_progress, ProgressCallback, WatermarkRemover};
