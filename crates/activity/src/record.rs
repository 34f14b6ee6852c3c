//! Activity record formatting

use std::borrow::Cow;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use watcher::{ActivityEvent, OpSet};

/// Timestamp layout: ISO-8601, millisecond precision, numeric UTC offset
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// One observed filesystem change, ready to serialize
///
/// Records are written the moment they are built and never held beyond the
/// current loop iteration.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub timestamp: DateTime<Local>,
    pub ops: OpSet,
    pub path: PathBuf,
}

impl ActivityRecord {
    /// Stamp a delivered event with the current wall-clock time
    pub fn from_event(event: &ActivityEvent) -> Self {
        Self {
            timestamp: Local::now(),
            ops: event.ops,
            path: event.path.clone(),
        }
    }

    /// Render as one CSV line, newline-terminated
    pub fn to_csv_line(&self) -> String {
        let timestamp = self.timestamp.format(TIMESTAMP_FORMAT).to_string();
        format!(
            "{},{},{}\n",
            csv_field(&timestamp),
            csv_field(&self.ops.to_string()),
            csv_field(&self.path.to_string_lossy()),
        )
    }
}

/// Quote a field when it contains a separator, quote, or line break
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
