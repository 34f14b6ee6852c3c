//! inotify subscription and event plumbing
//!
//! One inotify instance serves the whole process. Registration happens on
//! the main task at startup; an internal pump task drains the kernel event
//! stream and fans it out over two bounded channels, one for deliverable
//! events and one for subsystem faults. The consumer loop on the other end
//! treats closure of either channel as an instruction to stop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use inotify::{EventMask, EventOwned, EventStream, Inotify, WatchDescriptor, WatchMask};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::enumerate::WatchSet;
use crate::events::{ActivityEvent, Fault, OpSet};

/// Bounded capacity of the delivery channel
///
/// When the consumer falls behind, the pump blocks and events queue in the
/// kernel instead, where the overflow escalation path can see the pressure.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

const FAULT_CHANNEL_CAPACITY: usize = 16;

/// Change kinds every watched directory subscribes to
fn watch_mask() -> WatchMask {
    WatchMask::CREATE
        | WatchMask::MOVED_TO
        | WatchMask::MODIFY
        | WatchMask::DELETE
        | WatchMask::DELETE_SELF
        | WatchMask::MOVED_FROM
        | WatchMask::MOVE_SELF
        | WatchMask::ATTRIB
        | WatchMask::OPEN
}

/// Handle over the notification subsystem
///
/// Owns the inotify instance for the lifetime of the run; dropping it on
/// process exit is the only cleanup.
pub struct FsWatcher {
    inotify: Inotify,
    paths: Arc<RwLock<HashMap<WatchDescriptor, PathBuf>>>,
}

impl FsWatcher {
    /// Create the inotify instance and start the pump task
    ///
    /// Returns the watcher handle plus the two consumer-side receivers.
    /// Must be called within a tokio runtime. Failure to create the
    /// instance is fatal at startup.
    pub fn new() -> Result<(Self, mpsc::Receiver<ActivityEvent>, mpsc::Receiver<Fault>)> {
        let mut inotify = Inotify::init().context("error creating inotify instance")?;
        let stream = inotify
            .event_stream(vec![0u8; 4096])
            .context("error creating inotify event stream")?;

        let paths = Arc::new(RwLock::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (fault_tx, fault_rx) = mpsc::channel(FAULT_CHANNEL_CAPACITY);

        tokio::spawn(pump(stream, Arc::clone(&paths), event_tx, fault_tx));

        Ok((Self { inotify, paths }, event_rx, fault_rx))
    }

    /// Subscribe one directory
    pub fn watch(&mut self, dir: &Path) -> Result<()> {
        let wd = self
            .inotify
            .add_watch(dir, watch_mask())
            .with_context(|| format!("error adding watch for {}", dir.display()))?;
        self.paths.write().insert(wd, dir.to_path_buf());
        Ok(())
    }

    /// Subscribe every enumerated directory
    ///
    /// A per-directory failure is logged and skipped; partial coverage is
    /// preferable to aborting the run. Returns the number registered.
    pub fn watch_all(&mut self, dirs: &WatchSet) -> usize {
        let mut registered = 0;
        for dir in dirs {
            match self.watch(dir) {
                Ok(()) => registered += 1,
                Err(err) => {
                    warn!(folder = %dir.display(), error = %err, "error adding folder to watcher");
                }
            }
        }
        registered
    }

    /// Number of active subscriptions held by this handle
    pub fn watch_count(&self) -> usize {
        self.paths.read().len()
    }
}

/// Drain the kernel stream into the delivery and fault channels
async fn pump(
    mut stream: EventStream<Vec<u8>>,
    paths: Arc<RwLock<HashMap<WatchDescriptor, PathBuf>>>,
    event_tx: mpsc::Sender<ActivityEvent>,
    fault_tx: mpsc::Sender<Fault>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                if event.mask.contains(EventMask::Q_OVERFLOW) {
                    if fault_tx.send(Fault::Overflow).await.is_err() {
                        return;
                    }
                    continue;
                }
                if event.mask.contains(EventMask::IGNORED) {
                    continue;
                }
                let ops = OpSet::from_mask(event.mask);
                if ops.is_empty() {
                    debug!(mask = ?event.mask, "dropping event with no recordable operation");
                    continue;
                }
                let Some(path) = resolve_path(&paths, &event) else {
                    debug!(wd = ?event.wd, "dropping event for unknown watch descriptor");
                    continue;
                };
                if event_tx.send(ActivityEvent { path, ops }).await.is_err() {
                    return;
                }
            }
            Err(err) => {
                if fault_tx.send(Fault::Subsystem(err)).await.is_err() {
                    return;
                }
            }
        }
    }
    // Stream end drops both senders, closing the channels and stopping the
    // consumer loop.
}

/// Resolve an event to an absolute path via the descriptor map
///
/// Events naming a child join the child onto the watched directory; events
/// on the directory itself (delete-self, move-self) resolve to it directly.
fn resolve_path(
    paths: &RwLock<HashMap<WatchDescriptor, PathBuf>>,
    event: &EventOwned,
) -> Option<PathBuf> {
    let paths = paths.read();
    let dir = paths.get(&event.wd)?;
    match &event.name {
        Some(name) if !name.is_empty() => Some(dir.join(name)),
        _ => Some(dir.clone()),
    }
}
