//! Background watermark removal jobs.
//!
//! This crate provides:
//! - The in-memory task store shared by the API and the jobs
//! - A FIFO job dispatcher bounded by a fixed number of permits
//! - Structured job logging and job metrics

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod store;

pub use config::WorkerConfig;
pub use dispatcher::{JobDispatcher, JobHandle};
pub use error::{StoreError, StoreResult, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use store::{StatusCounts, TaskStore};
