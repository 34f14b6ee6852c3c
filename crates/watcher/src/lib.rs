//! Filesystem watching for fileactivity
//!
//! This crate provides the watch-side half of the daemon:
//! - Exclusion filters compiled from configuration patterns
//! - Directory enumeration over selected mountpoints
//! - Kernel inotify limit management (proactive and reactive)
//! - Watch registration and event/fault channel plumbing

pub mod enumerate;
pub mod events;
pub mod exclude;
pub mod limits;
pub mod subscribe;

// Re-exports
pub use enumerate::{enumerate_watch_dirs, WatchSet};
pub use events::{ActivityEvent, Fault, OpSet};
pub use exclude::ExclusionFilter;
pub use limits::{
    ensure_watch_capacity, escalate_queue_capacity, Escalation, KernelLimits, ProcFdCensus,
    ProcSysctl, WatchCensus, QUEUED_EVENTS_CAP,
};
pub use subscribe::FsWatcher;

/// Result type for watcher operations
pub type Result<T> = anyhow::Result<T>;
