//! Daemon configuration
//!
//! Loaded once at startup from a JSON file maintained by the management
//! UI. A missing file means a default (disabled) configuration; an
//! unreadable or unparsable file is fatal.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Default configuration file location
pub const CONFIG_PATH: &str = "/boot/config/plugins/file.activity/config.json";

/// Disk inventory location
pub const DISKS_INI_PATH: &str = "/var/local/emhttp/disks.ini";

/// Removable-device inventory location
pub const REMOVABLE_DEVICES_PATH: &str = "/var/state/unassigned.devices/unassigned.devices.json";

/// Activity log location
pub const ACTIVITY_LOG_PATH: &str = "/var/log/file.activity/data.log";

/// Runtime options, with per-field defaults for absent keys
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Master switch; the daemon exits immediately when disabled
    pub enable: bool,
    /// Watch removable devices from the unassigned-devices inventory
    pub unassigned_devices: bool,
    /// Watch cache pool members
    pub cache: bool,
    /// Watch non-rotational media
    pub ssd: bool,
    /// Record count shown by the management UI
    pub display_events: u32,
    /// Directory exclusion patterns, matched case-insensitively
    pub exclusions: Vec<String>,
    /// Records per log file before rollover
    pub max_records: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enable: false,
            unassigned_devices: true,
            cache: false,
            ssd: false,
            display_events: 1000,
            exclusions: default_exclusions(),
            max_records: 20000,
        }
    }
}

fn default_exclusions() -> Vec<String> {
    ["appdata", "docker", "system", "syslogs"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl ActivityConfig {
    /// Load configuration, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("config file not found, using default configuration");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("error reading config file {}", path.display()));
            }
        };
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("error parsing config file {}", path.display()))?;

        info!(
            enable = config.enable,
            unassigned_devices = config.unassigned_devices,
            cache = config.cache,
            ssd = config.ssd,
            display_events = config.display_events,
            max_records = config.max_records,
            exclusions = ?config.exclusions,
            "file activity watcher configuration"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ActivityConfig::default();
        assert!(!config.enable);
        assert!(config.unassigned_devices);
        assert!(!config.cache);
        assert!(!config.ssd);
        assert_eq!(config.display_events, 1000);
        assert_eq!(config.max_records, 20000);
        assert_eq!(config.exclusions.len(), 4);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ActivityConfig::load(&temp_dir.path().join("config.json")).unwrap();
        assert!(!config.enable);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"enable": true, "max_records": 500}"#).unwrap();

        let config = ActivityConfig::load(&path).unwrap();
        assert!(config.enable);
        assert_eq!(config.max_records, 500);
        assert!(config.unassigned_devices);
        assert_eq!(config.exclusions.len(), 4);
    }

    #[test]
    fn test_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "enable": true,
                "unassigned_devices": false,
                "cache": true,
                "ssd": true,
                "display_events": 50,
                "exclusions": ["tmp"],
                "max_records": 100
            }"#,
        )
        .unwrap();

        let config = ActivityConfig::load(&path).unwrap();
        assert!(config.cache && config.ssd && !config.unassigned_devices);
        assert_eq!(config.exclusions, vec!["tmp".to_string()]);
        assert_eq!(config.max_records, 100);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(ActivityConfig::load(&path).is_err());
    }
}
