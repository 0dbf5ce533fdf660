//! Shared data models for the watermark removal service.
//!
//! This crate provides Serde-serializable types for:
//! - Task identifiers and lifecycle status
//! - Task records and their one-way transitions
//! - The read-only task view returned to pollers

pub mod task;

pub use task::{Task, TaskId, TaskStatus, TaskView, TransitionError};
