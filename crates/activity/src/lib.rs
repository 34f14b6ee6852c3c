//! Activity recording for fileactivity
//!
//! This crate provides:
//! - ActivityRecord formatting (CSV, millisecond ISO-8601 timestamps)
//! - The rotating activity log (single backup generation)
//! - The event consumer loop draining the watcher's channels

pub mod consumer;
pub mod log;
pub mod record;

// Re-exports
pub use consumer::Consumer;
pub use log::{LogError, RotatingLog};
pub use record::ActivityRecord;

/// Result type for activity operations
pub type Result<T> = anyhow::Result<T>;
