//! Storage inventory for fileactivity
//!
//! This crate turns the host's raw storage inventory into the list of
//! mountpoints the watcher should observe:
//! - `disks.ini` parsing (array and pool members)
//! - unassigned-devices JSON parsing (removable media)
//! - mount selection rules (disk type, SSD/cache toggles, mount state)

pub mod disk;
pub mod disks_ini;
pub mod removable;
pub mod select;

// Re-exports
pub use disk::{DiskKind, MountTarget};
pub use disks_ini::DiskEntry;
pub use removable::RemovableEntry;
pub use select::{select_mounts, SelectOptions};

/// Result type for inventory operations
pub type Result<T> = anyhow::Result<T>;
