//! Local filesystem storage for staged uploads and produced artifacts.
//!
//! This crate provides:
//! - The `incoming/` and `output/` directory layout
//! - Collision-free staging paths derived from task IDs
//! - Stream staging that never leaves partial files behind

pub mod error;
pub mod layout;
pub mod staging;

pub use error::{StorageError, StorageResult};
pub use layout::{output_filename, sanitize_filename, StorageLayout};
pub use staging::{remove_quietly, stage_stream};
