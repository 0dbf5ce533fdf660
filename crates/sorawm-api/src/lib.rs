//! Axum HTTP API server.
//!
//! This crate provides:
//! - Upload intake with a per-client daily quota
//! - Task status polling and artifact download
//! - Rate limiting, request IDs and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{ArtifactHandle, DailyQuota, ResultRetriever, UploadIngestor};
pub use state::AppState;
