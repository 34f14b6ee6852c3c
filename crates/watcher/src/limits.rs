//! Kernel inotify limit management
//!
//! The kernel caps both the number of concurrent watches per user and the
//! number of queued-but-undelivered events. Both ceilings are raised here:
//! the watch ceiling proactively at startup, sized from a system-wide
//! census of active watches, and the queued-event ceiling reactively when
//! the subsystem reports an overflow.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

/// Headroom factor over exact watch demand
///
/// Watch counts can rise between measurement and registration.
const WATCH_HEADROOM: f64 = 1.1;

/// Queued-event ceiling above which escalation stops
pub const QUEUED_EVENTS_CAP: u64 = 300_000;

/// Read/raise access to the kernel's inotify ceilings
///
/// The ceilings are externally owned mutable state; they are only ever
/// raised, never lowered, so concurrent raisers race benignly.
pub trait KernelLimits {
    fn max_user_watches(&self) -> Result<u64>;
    fn set_max_user_watches(&self, value: u64) -> Result<()>;
    fn max_queued_events(&self) -> Result<u64>;
    fn set_max_queued_events(&self, value: u64) -> Result<()>;
}

impl<T: KernelLimits + ?Sized> KernelLimits for std::sync::Arc<T> {
    fn max_user_watches(&self) -> Result<u64> {
        (**self).max_user_watches()
    }
    fn set_max_user_watches(&self, value: u64) -> Result<()> {
        (**self).set_max_user_watches(value)
    }
    fn max_queued_events(&self) -> Result<u64> {
        (**self).max_queued_events()
    }
    fn set_max_queued_events(&self, value: u64) -> Result<()> {
        (**self).set_max_queued_events(value)
    }
}

/// `/proc/sys`-backed [`KernelLimits`]
pub struct ProcSysctl {
    sys_root: PathBuf,
}

impl ProcSysctl {
    pub fn new() -> Self {
        Self::with_root("/proc/sys")
    }

    /// Use an alternate root, e.g. a fixture tree in tests
    pub fn with_root(sys_root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: sys_root.into(),
        }
    }

    fn read(&self, key: &str) -> Result<u64> {
        let path = self.sys_root.join(key);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read sysctl {}", path.display()))?;
        text.trim()
            .parse()
            .with_context(|| format!("sysctl {} is not an integer: '{}'", key, text.trim()))
    }

    fn write(&self, key: &str, value: u64) -> Result<()> {
        let path = self.sys_root.join(key);
        std::fs::write(&path, value.to_string())
            .with_context(|| format!("failed to write sysctl {}", path.display()))
    }
}

impl Default for ProcSysctl {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelLimits for ProcSysctl {
    fn max_user_watches(&self) -> Result<u64> {
        self.read("fs/inotify/max_user_watches")
    }

    fn set_max_user_watches(&self, value: u64) -> Result<()> {
        self.write("fs/inotify/max_user_watches", value)
    }

    fn max_queued_events(&self) -> Result<u64> {
        self.read("fs/inotify/max_queued_events")
    }

    fn set_max_queued_events(&self, value: u64) -> Result<()> {
        self.write("fs/inotify/max_queued_events", value)
    }
}

/// Count of active inotify subscriptions, system-wide
pub trait WatchCensus {
    fn active_watches(&self) -> Result<u64>;
}

/// [`WatchCensus`] backed by a `/proc` descriptor scan
///
/// Every process's open descriptors are scanned for links to
/// `anon_inode:inotify`; each matching descriptor's fdinfo lists one
/// `inotify` line per watch entry. The scan is inherently racy against
/// processes starting and exiting, which the headroom factor absorbs.
pub struct ProcFdCensus {
    proc_root: PathBuf,
}

impl ProcFdCensus {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use an alternate root, e.g. a fixture tree in tests
    pub fn with_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    fn count_process(&self, pid_dir: &Path) -> u64 {
        let fd_dir = pid_dir.join("fd");
        let entries = match std::fs::read_dir(&fd_dir) {
            Ok(entries) => entries,
            // Exited mid-scan or permission denied; skip this process.
            Err(err) => {
                debug!(path = %fd_dir.display(), error = %err, "error reading descriptor table");
                return 0;
            }
        };

        let mut watches = 0;
        for entry in entries.flatten() {
            let link = entry.path();
            let is_symlink = link
                .symlink_metadata()
                .map(|meta| meta.file_type().is_symlink())
                .unwrap_or(false);
            if !is_symlink {
                continue;
            }
            let target = match std::fs::read_link(&link) {
                Ok(target) => target,
                Err(err) => {
                    debug!(link_path = %link.display(), error = %err, "error reading link");
                    continue;
                }
            };
            if !target.to_string_lossy().contains("anon_inode:inotify") {
                continue;
            }

            let fdinfo = pid_dir.join("fdinfo").join(entry.file_name());
            let info = match std::fs::read_to_string(&fdinfo) {
                Ok(info) => info,
                Err(err) => {
                    debug!(fdinfo_path = %fdinfo.display(), error = %err, "error reading fdinfo");
                    continue;
                }
            };
            let entries = info
                .lines()
                .filter(|line| line.starts_with("inotify"))
                .count() as u64;
            debug!(path = %fdinfo.display(), entries, "found inotify descriptor");
            watches += entries;
        }
        watches
    }
}

impl Default for ProcFdCensus {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchCensus for ProcFdCensus {
    fn active_watches(&self) -> Result<u64> {
        let processes = std::fs::read_dir(&self.proc_root)
            .with_context(|| format!("failed to read {}", self.proc_root.display()))?;

        let mut total = 0;
        for process in processes.flatten() {
            let name = process.file_name();
            let is_pid = name.to_string_lossy().chars().all(|c| c.is_ascii_digit());
            if !is_pid || !process.path().is_dir() {
                continue;
            }
            total += self.count_process(&process.path());
        }
        Ok(total)
    }
}

/// Proactive sizing of the watch ceiling
///
/// Raises `max_user_watches` so a fresh watch set of `demand` directories
/// fits alongside every watch already registered on the system. Errors are
/// fatal: without a known ceiling the daemon cannot tell whether
/// registration will silently fall short.
pub fn ensure_watch_capacity(
    demand: usize,
    census: &dyn WatchCensus,
    limits: &dyn KernelLimits,
) -> Result<u64> {
    let ceiling = limits
        .max_user_watches()
        .context("error getting current inotify watch limit")?;
    info!(current_limit = ceiling, "current inotify watch limit");

    let active = census
        .active_watches()
        .context("error counting active inotify watches")?;
    info!(current_watches = active, "active inotify watches");

    let required = ((demand as u64 + active) as f64 * WATCH_HEADROOM).ceil() as u64;
    info!(required_limit = required, "required inotify watch limit");

    if required > ceiling {
        limits
            .set_max_user_watches(required)
            .context("error setting inotify watch limit")?;
        info!(new_limit = required, "inotify watch limit increased");
    }
    Ok(required)
}

/// Outcome of a reactive queued-event escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Ceiling doubled
    Raised { from: u64, to: u64 },
    /// Ceiling already at or above the cap; caller should stop escalating
    CapReached { current: u64 },
    /// Read or apply failed; logged, retried on the next overflow
    Failed,
}

/// Reactive sizing of the queued-event ceiling
///
/// Invoked from the consumer's fault path on overflow. Never fatal: the
/// run continues with best-effort delivery whatever happens here.
pub fn escalate_queue_capacity(limits: &dyn KernelLimits) -> Escalation {
    let current = match limits.max_queued_events() {
        Ok(current) => current,
        Err(err) => {
            error!(error = %err, "error getting current inotify event limit");
            return Escalation::Failed;
        }
    };

    if current >= QUEUED_EVENTS_CAP {
        info!(
            current_limit = current,
            "current inotify event limit is high, not increasing, ignoring overflow"
        );
        return Escalation::CapReached { current };
    }

    let wanted = current * 2;
    match limits.set_max_queued_events(wanted) {
        Ok(()) => {
            info!(new_limit = wanted, "inotify event limit increased");
            Escalation::Raised {
                from: current,
                to: wanted,
            }
        }
        Err(err) => {
            error!(error = %err, "error setting inotify event limit");
            Escalation::Failed
        }
    }
}
