//! Removable-device inventory
//!
//! The unassigned-devices state file is a JSON object mapping device name
//! to its mount state. Failures here are never fatal: removable media is
//! optional coverage, and the file is absent on hosts without it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Mount state of one removable device
#[derive(Debug, Clone, Deserialize)]
pub struct RemovableInfo {
    #[serde(default)]
    pub mountpoint: String,
    #[serde(default)]
    pub mounted: bool,
    #[serde(default)]
    pub fstype: String,
}

/// One named removable device from the inventory
#[derive(Debug, Clone)]
pub struct RemovableEntry {
    pub name: String,
    pub mountpoint: String,
    pub mounted: bool,
    pub fstype: String,
}

/// Load the removable-device inventory
///
/// A missing or malformed file yields an empty inventory with a warning.
pub fn load(path: &Path) -> Vec<RemovableEntry> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "error reading removable devices file");
            return Vec::new();
        }
    };
    match parse(&data) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "error parsing removable devices JSON");
            Vec::new()
        }
    }
}

/// Parse the JSON object into entries, ordered by device name
pub fn parse(data: &str) -> serde_json::Result<Vec<RemovableEntry>> {
    let devices: BTreeMap<String, RemovableInfo> = serde_json::from_str(data)?;
    Ok(devices
        .into_iter()
        .map(|(name, info)| RemovableEntry {
            name,
            mountpoint: info.mountpoint,
            mounted: info.mounted,
            fstype: info.fstype,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let json = r#"{
            "sdb": {"mountpoint": "/mnt/disks/usb", "mounted": true, "fstype": "exfat"},
            "sda": {"mountpoint": "", "mounted": false, "fstype": ""}
        }"#;

        let entries = parse(json).unwrap();
        assert_eq!(entries.len(), 2);
        // Ordered by name for determinism
        assert_eq!(entries[0].name, "sda");
        assert!(!entries[0].mounted);
        assert_eq!(entries[1].name, "sdb");
        assert_eq!(entries[1].mountpoint, "/mnt/disks/usb");
        assert_eq!(entries[1].fstype, "exfat");
    }

    #[test]
    fn test_parse_missing_fields_default() {
        let entries = parse(r#"{"sdc": {}}"#).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mountpoint, "");
        assert!(!entries[0].mounted);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load(&dir.path().join("unassigned.devices.json")).is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("unassigned.devices.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_empty());
    }
}
