//! Event consumer loop
//!
//! The single long-running task of the daemon: drains the delivery and
//! fault channels, appends every delivered event to the rotating log, and
//! drives reactive queue-capacity escalation when the kernel reports
//! overflow. The loop ends only when a channel closes or the log loses its
//! writable target.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};
use watcher::{escalate_queue_capacity, ActivityEvent, Escalation, Fault, KernelLimits};

use crate::log::{LogError, RotatingLog};
use crate::record::ActivityRecord;

/// Overflow-handling state, scoped to one run
///
/// Once escalation hits its cap, further overflow notifications are
/// ignored for the remainder of the run; the escalation already failed to
/// buy more headroom and repeating it is pure cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OverflowPolicy {
    Escalate,
    Suppressed,
}

/// The event consumer
pub struct Consumer {
    events: mpsc::Receiver<ActivityEvent>,
    faults: mpsc::Receiver<Fault>,
    log: RotatingLog,
    limits: Box<dyn KernelLimits + Send + Sync>,
    overflow: OverflowPolicy,
}

impl Consumer {
    pub fn new(
        events: mpsc::Receiver<ActivityEvent>,
        faults: mpsc::Receiver<Fault>,
        log: RotatingLog,
        limits: Box<dyn KernelLimits + Send + Sync>,
    ) -> Self {
        Self {
            events,
            faults,
            log,
            limits,
            overflow: OverflowPolicy::Escalate,
        }
    }

    /// Drain both channels until either closes
    ///
    /// Returns an error only for the fatal mid-run condition: the log
    /// could not be reopened after a rollover.
    pub async fn run(mut self) -> Result<()> {
        info!("starting event listener");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.record(&event)?,
                    None => break,
                },
                fault = self.faults.recv() => match fault {
                    Some(fault) => self.handle_fault(fault),
                    None => break,
                },
            }
        }
        info!("event channel closed, stopping listener");
        Ok(())
    }

    fn record(&mut self, event: &ActivityEvent) -> Result<()> {
        let record = ActivityRecord::from_event(event);
        match self.log.append(&record) {
            Ok(()) => Ok(()),
            Err(err @ LogError::Reopen { .. }) => {
                error!(error = %err, "error reopening activity file");
                Err(err.into())
            }
            Err(err) => {
                error!(error = %err, path = %event.path.display(), "error writing activity record");
                Ok(())
            }
        }
    }

    fn handle_fault(&mut self, fault: Fault) {
        match fault {
            Fault::Overflow => {
                if self.overflow == OverflowPolicy::Suppressed {
                    return;
                }
                if let Escalation::CapReached { .. } = escalate_queue_capacity(self.limits.as_ref())
                {
                    self.overflow = OverflowPolicy::Suppressed;
                }
            }
            Fault::Subsystem(err) => {
                error!(error = %err, "watcher error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;
    use watcher::OpSet;

    /// In-memory kernel limits that count sysctl accesses
    struct FakeLimits {
        queued_events: Mutex<u64>,
        reads: Mutex<u32>,
    }

    impl FakeLimits {
        fn new(queued_events: u64) -> Arc<Self> {
            Arc::new(Self {
                queued_events: Mutex::new(queued_events),
                reads: Mutex::new(0),
            })
        }
    }

    impl KernelLimits for FakeLimits {
        fn max_user_watches(&self) -> Result<u64> {
            Ok(0)
        }
        fn set_max_user_watches(&self, _value: u64) -> Result<()> {
            Ok(())
        }
        fn max_queued_events(&self) -> Result<u64> {
            *self.reads.lock() += 1;
            Ok(*self.queued_events.lock())
        }
        fn set_max_queued_events(&self, value: u64) -> Result<()> {
            *self.queued_events.lock() = value;
            Ok(())
        }
    }

    fn event(path: &str) -> ActivityEvent {
        ActivityEvent {
            path: PathBuf::from(path),
            ops: OpSet::CREATE,
        }
    }

    struct Channels {
        event_tx: mpsc::Sender<ActivityEvent>,
        fault_tx: mpsc::Sender<Fault>,
    }

    fn consumer_with(
        temp_dir: &TempDir,
        max_records: usize,
        limits: Arc<FakeLimits>,
    ) -> (Consumer, Channels, PathBuf) {
        let path = temp_dir.path().join("data.log");
        let log = RotatingLog::open(&path, max_records).unwrap();
        let (event_tx, events) = mpsc::channel(16);
        let (fault_tx, faults) = mpsc::channel(16);
        let consumer = Consumer::new(events, faults, log, Box::new(limits));
        (consumer, Channels { event_tx, fault_tx }, path)
    }

    #[tokio::test]
    async fn test_events_recorded_in_delivery_order() {
        let temp_dir = TempDir::new().unwrap();
        let (consumer, channels, path) = consumer_with(&temp_dir, 100, FakeLimits::new(16384));

        channels.event_tx.send(event("/mnt/disk1/a")).await.unwrap();
        channels.event_tx.send(event("/mnt/disk1/b")).await.unwrap();
        drop(channels);

        consumer.run().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",CREATE,/mnt/disk1/a"));
        assert!(lines[1].ends_with(",CREATE,/mnt/disk1/b"));
    }

    #[tokio::test]
    async fn test_loop_rotates_at_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let (consumer, channels, path) = consumer_with(&temp_dir, 2, FakeLimits::new(16384));

        for n in 0..3 {
            channels
                .event_tx
                .send(event(&format!("/mnt/disk1/{n}")))
                .await
                .unwrap();
        }
        drop(channels);

        consumer.run().await.unwrap();

        let active = std::fs::read_to_string(&path).unwrap();
        let backup = std::fs::read_to_string(path.with_extension("log.1")).unwrap();
        assert_eq!(active.lines().count(), 1);
        assert_eq!(backup.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_overflow_doubles_queue_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let limits = FakeLimits::new(16384);
        let (consumer, channels, _path) = consumer_with(&temp_dir, 100, Arc::clone(&limits));

        channels.fault_tx.send(Fault::Overflow).await.unwrap();
        drop(channels);
        consumer.run().await.unwrap();

        assert_eq!(*limits.queued_events.lock(), 32768);
    }

    #[tokio::test]
    async fn test_overflow_suppressed_after_cap() {
        let temp_dir = TempDir::new().unwrap();
        let limits = FakeLimits::new(400_000);
        let (consumer, channels, _path) = consumer_with(&temp_dir, 100, Arc::clone(&limits));

        for _ in 0..3 {
            channels.fault_tx.send(Fault::Overflow).await.unwrap();
        }
        drop(channels);
        consumer.run().await.unwrap();

        // Only the first overflow consulted the kernel; the rest were
        // ignored by the one-shot suppression state.
        assert_eq!(*limits.reads.lock(), 1);
        assert_eq!(*limits.queued_events.lock(), 400_000);
    }

    #[tokio::test]
    async fn test_subsystem_fault_does_not_stop_loop() {
        let temp_dir = TempDir::new().unwrap();
        let (consumer, channels, path) = consumer_with(&temp_dir, 100, FakeLimits::new(16384));

        channels
            .fault_tx
            .send(Fault::Subsystem(std::io::Error::new(
                std::io::ErrorKind::Other,
                "boom",
            )))
            .await
            .unwrap();
        channels.event_tx.send(event("/mnt/disk1/after")).await.unwrap();
        drop(channels);

        consumer.run().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
