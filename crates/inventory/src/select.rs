//! Mount selection rules
//!
//! Filters the raw inventory down to the volumes worth watching. The
//! resulting order is array members, then pool members, then removable
//! devices, each group in inventory order.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::disk::{DiskKind, MountTarget};
use crate::disks_ini::DiskEntry;
use crate::removable::RemovableEntry;

/// Inclusion toggles from configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    /// Watch non-rotational (solid-state) media
    pub include_ssd: bool,
    /// Watch cache pool members
    pub include_cache: bool,
}

/// Apply the selection rules to the full inventory
pub fn select_mounts(
    disks: &[DiskEntry],
    removable: &[RemovableEntry],
    options: &SelectOptions,
) -> Vec<MountTarget> {
    let mut array = Vec::new();
    let mut pool = Vec::new();

    for disk in disks {
        let Some(kind) = DiskKind::from_declared(&disk.declared_type) else {
            debug!(disk = %disk.name, declared_type = %disk.declared_type, "skipping invalid disk type");
            continue;
        };
        if !disk.rotational && !options.include_ssd {
            debug!(disk = %disk.name, "skipping SSD");
            continue;
        }
        match kind {
            DiskKind::Array => {
                debug!(disk = %disk.name, "added to array disks");
                array.push(target_for(disk, kind));
            }
            // An empty filesystem type marks an unformatted or absent pool
            // slot, which has no mountpoint to walk.
            DiskKind::Pool if options.include_cache && !disk.filesystem.is_empty() => {
                debug!(disk = %disk.name, "added to pool disks");
                pool.push(target_for(disk, kind));
            }
            DiskKind::Pool => {
                debug!(disk = %disk.name, "skipping pool disk");
            }
            DiskKind::Removable => unreachable!("inventory sections never declare removable"),
        }
    }
    info!(array_disks = array.len(), pool_disks = pool.len(), "disk count");

    let mut targets = array;
    targets.append(&mut pool);

    for device in removable {
        info!(
            name = %device.name,
            mountpoint = %device.mountpoint,
            mounted = device.mounted,
            "removable device details"
        );
        if device.mounted && !device.mountpoint.is_empty() {
            info!(disk = %device.name, "added removable disk");
            targets.push(MountTarget {
                name: device.name.clone(),
                mountpoint: PathBuf::from(&device.mountpoint),
                kind: DiskKind::Removable,
                filesystem: device.fstype.clone(),
                rotational: true,
            });
        } else {
            info!(disk = %device.name, "skipping removable disk as it is not mounted or has no mountpoint");
        }
    }

    targets
}

fn target_for(disk: &DiskEntry, kind: DiskKind) -> MountTarget {
    MountTarget {
        name: disk.name.clone(),
        mountpoint: PathBuf::from(format!("/mnt/{}", disk.name)),
        kind,
        filesystem: disk.filesystem.clone(),
        rotational: disk.rotational,
    }
}
