//! Event and fault types delivered to the consumer

use std::fmt;
use std::path::PathBuf;

use inotify::EventMask;

bitflags::bitflags! {
    /// Operations observed on a path
    ///
    /// Usually a single bit per event, but the kernel may coalesce, so the
    /// set renders as a composite string (`CREATE|OPEN`).
    pub struct OpSet: u8 {
        const CREATE = 1 << 0;
        const WRITE  = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD  = 1 << 4;
        const OPEN   = 1 << 5;
    }
}

impl OpSet {
    /// Translate a raw inotify mask into operations
    ///
    /// A file moved into a watched directory appears as a create; a watched
    /// directory being deleted or moved reports remove/rename on itself.
    pub fn from_mask(mask: EventMask) -> Self {
        let mut ops = OpSet::empty();
        if mask.intersects(EventMask::CREATE | EventMask::MOVED_TO) {
            ops |= OpSet::CREATE;
        }
        if mask.contains(EventMask::MODIFY) {
            ops |= OpSet::WRITE;
        }
        if mask.intersects(EventMask::DELETE | EventMask::DELETE_SELF) {
            ops |= OpSet::REMOVE;
        }
        if mask.intersects(EventMask::MOVED_FROM | EventMask::MOVE_SELF) {
            ops |= OpSet::RENAME;
        }
        if mask.contains(EventMask::ATTRIB) {
            ops |= OpSet::CHMOD;
        }
        if mask.contains(EventMask::OPEN) {
            ops |= OpSet::OPEN;
        }
        ops
    }
}

impl fmt::Display for OpSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OpSet, &str); 6] = [
            (OpSet::CREATE, "CREATE"),
            (OpSet::WRITE, "WRITE"),
            (OpSet::REMOVE, "REMOVE"),
            (OpSet::RENAME, "RENAME"),
            (OpSet::CHMOD, "CHMOD"),
            (OpSet::OPEN, "OPEN"),
        ];
        let mut first = true;
        for (op, name) in NAMES {
            if self.contains(op) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("UNKNOWN")?;
        }
        Ok(())
    }
}

/// One filesystem change, resolved to an absolute path
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub path: PathBuf,
    pub ops: OpSet,
}

/// Subsystem-level fault delivered on the error channel
#[derive(Debug)]
pub enum Fault {
    /// The kernel dropped events because its queue was full
    Overflow,
    /// Any other subsystem error; logged, never terminates the run
    Subsystem(std::io::Error),
}
