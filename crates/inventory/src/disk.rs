//! Mount target data model

use std::fmt;
use std::path::PathBuf;

/// Where a storage volume lives in the host's layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskKind {
    /// Array member (declared type `data`)
    Array,
    /// Cache pool member (declared type `cache`)
    Pool,
    /// Removable device from the unassigned-devices inventory
    Removable,
}

impl DiskKind {
    /// Map a declared inventory type to a kind
    ///
    /// Only `data` and `cache` are valid storage types; anything else
    /// (parity, flash, ...) is not observable and yields `None`.
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared {
            "data" => Some(DiskKind::Array),
            "cache" => Some(DiskKind::Pool),
            _ => None,
        }
    }
}

impl fmt::Display for DiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiskKind::Array => "array",
            DiskKind::Pool => "pool",
            DiskKind::Removable => "removable",
        };
        f.write_str(name)
    }
}

/// One observable storage volume
#[derive(Debug, Clone)]
pub struct MountTarget {
    /// Inventory name (`disk1`, `cache`, ...)
    pub name: String,
    /// Absolute path the volume is mounted at
    pub mountpoint: PathBuf,
    /// Volume kind
    pub kind: DiskKind,
    /// Filesystem type; empty for an unformatted or absent device
    pub filesystem: String,
    /// False for solid-state media
    pub rotational: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_type_mapping() {
        assert_eq!(DiskKind::from_declared("data"), Some(DiskKind::Array));
        assert_eq!(DiskKind::from_declared("cache"), Some(DiskKind::Pool));
        assert_eq!(DiskKind::from_declared("parity"), None);
        assert_eq!(DiskKind::from_declared("flash"), None);
        assert_eq!(DiskKind::from_declared(""), None);
    }
}
