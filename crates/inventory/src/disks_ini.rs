//! Parser for the `disks.ini` storage inventory
//!
//! The inventory is a sectioned key-value document: one `["name"]` header
//! per storage member, followed by `key="value"` lines. Only the keys the
//! selector needs are kept.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// One raw inventory section, prior to any selection rules
#[derive(Debug, Clone)]
pub struct DiskEntry {
    /// `name` key (`disk1`, `cache`, ...)
    pub name: String,
    /// `type` key, lowercased (`data`, `cache`, `parity`, ...)
    pub declared_type: String,
    /// `fsType` key; empty for an unformatted or absent device
    pub filesystem: String,
    /// `rotational` key; defaults to false when absent or unparsable
    pub rotational: bool,
}

/// Load and parse the inventory file
///
/// An unreadable file is fatal: without the disk inventory there is
/// nothing to watch.
pub fn load(path: &Path) -> Result<Vec<DiskEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read disk inventory at {}", path.display()))?;
    Ok(parse(&text))
}

/// Parse inventory text into entries, one per section
pub fn parse(text: &str) -> Vec<DiskEntry> {
    let mut entries = Vec::new();
    let mut section: HashMap<String, String> = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            flush_section(&mut section, &mut entries);
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            section.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        }
    }
    flush_section(&mut section, &mut entries);

    entries
}

fn flush_section(section: &mut HashMap<String, String>, entries: &mut Vec<DiskEntry>) {
    if section.is_empty() {
        return;
    }
    let entry = DiskEntry {
        name: section.remove("name").unwrap_or_default(),
        declared_type: section
            .remove("type")
            .unwrap_or_default()
            .to_ascii_lowercase(),
        filesystem: section.remove("fsType").unwrap_or_default(),
        rotational: section
            .remove("rotational")
            .map(|v| parse_bool(&v))
            .unwrap_or(false),
    };
    debug!(
        disk = %entry.name,
        declared_type = %entry.declared_type,
        filesystem = %entry.filesystem,
        rotational = entry.rotational,
        "found disk"
    );
    entries.push(entry);
    section.clear();
}

/// Strip one layer of surrounding quotes, if present
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Lenient boolean parse; unknown values read as false
fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "t" | "true" | "y" | "yes" | "on"
    )
}
