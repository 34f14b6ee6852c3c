//! Rotating activity log
//!
//! A single active CSV file plus at most one backup generation at
//! `<path>.1`. The record that reaches the configured maximum is written
//! to the old file immediately before rotation, so the active file never
//! holds more than the maximum.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::record::ActivityRecord;

/// Failure modes of the log, split by severity
///
/// Rotation tolerates backup-eviction and rename failures (the loop
/// continues on the old file), but losing the writable target is fatal.
#[derive(Debug, Error)]
pub enum LogError {
    /// Appending a record failed; the record is dropped, the run continues
    #[error("failed to append activity record: {0}")]
    Write(#[source] std::io::Error),

    /// The active file could not be reopened after rollover
    #[error("failed to reopen activity log at {path}: {source}")]
    Reopen {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The persisted record store
pub struct RotatingLog {
    path: PathBuf,
    backup_path: PathBuf,
    file: Option<File>,
    records: usize,
    max_records: usize,
}

impl RotatingLog {
    /// Open (or create) the log and count its existing records
    ///
    /// Failure here is fatal at startup: the daemon must know the current
    /// record count to honor the rollover threshold.
    pub fn open(path: &Path, max_records: usize) -> anyhow::Result<Self> {
        use anyhow::Context;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
            .with_context(|| format!("error opening activity file {}", path.display()))?;

        let mut existing = String::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_string(&mut existing))
            .with_context(|| format!("error reading activity file {}", path.display()))?;
        let records = count_records(&existing);
        info!(current_lines = records, "current activity records");

        Ok(Self {
            path: path.to_path_buf(),
            backup_path: backup_path(path),
            file: Some(file),
            records,
            max_records,
        })
    }

    /// Append one record, flush it, and rotate once the file is full
    pub fn append(&mut self, record: &ActivityRecord) -> Result<(), LogError> {
        let file = self.file.as_mut().ok_or_else(|| {
            LogError::Write(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no active log file",
            ))
        })?;
        let line = record.to_csv_line();
        file.write_all(line.as_bytes())
            .and_then(|_| file.flush())
            .map_err(LogError::Write)?;

        self.records += 1;
        if self.records >= self.max_records {
            self.rotate()?;
        }
        Ok(())
    }

    /// Retire the active file to the backup slot and start fresh
    ///
    /// Steps, in order: close the active handle, evict any existing
    /// backup, rename active → backup, reopen a fresh active file. The
    /// first two failures are logged and tolerated; a reopen failure is
    /// fatal to the consumer.
    fn rotate(&mut self) -> Result<(), LogError> {
        // The handle must be closed before the rename shuffle.
        self.file = None;

        if self.backup_path.exists() {
            info!(rollover_path = %self.backup_path.display(), "removing existing rollover file");
            if let Err(err) = fs::remove_file(&self.backup_path) {
                error!(error = %err, "error removing existing rollover file");
            }
        }
        if let Err(err) = fs::rename(&self.path, &self.backup_path) {
            error!(error = %err, "error renaming activity file");
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)
            .map_err(|source| LogError::Reopen {
                path: self.path.clone(),
                source,
            })?;
        self.file = Some(file);
        self.records = 0;
        info!("activity file rolled over");
        Ok(())
    }

    /// Records currently in the active file
    pub fn records(&self) -> usize {
        self.records
    }

    /// Active file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup file path
    pub fn backup(&self) -> &Path {
        &self.backup_path
    }
}

/// Backup slot path: `<path>.1`
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".1");
    PathBuf::from(name)
}

/// Count CSV records, honoring quoted fields that span line breaks
fn count_records(text: &str) -> usize {
    let mut records = 0;
    let mut in_quotes = false;
    let mut line_has_data = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                line_has_data = true;
            }
            '\n' if !in_quotes => {
                if line_has_data {
                    records += 1;
                }
                line_has_data = false;
            }
            '\r' => {}
            _ => line_has_data = true,
        }
    }
    if line_has_data {
        records += 1;
    }
    records
}
