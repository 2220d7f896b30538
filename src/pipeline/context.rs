//! Shared batch context: counters, cancellation, event channel, read permits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::catalog::Clock;
use crate::types::{ImportProgressEvent, Options};

use super::monitor::QueueMonitor;

/// Snapshot of the batch counters at one instant.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterSnapshot {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Batch counters. The submission tier is the only writer; preparation
/// workers read snapshots for their `FileStarted` events.
#[derive(Debug, Default)]
pub struct BatchCounters {
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl BatchCounters {
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Counting semaphore over a token channel: `max_concurrent_reads` permits,
/// acquired for the duration of one file read, returned on drop. Distinct
/// from preparation parallelism so slow I/O on one path does not starve
/// hashing elsewhere.
#[derive(Debug)]
pub struct ReadPermits {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl ReadPermits {
    pub fn new(permits: usize) -> Self {
        let (tx, rx) = bounded(permits.max(1));
        for _ in 0..permits.max(1) {
            // Channel was sized for exactly these tokens.
            tx.send(()).expect("seed read permits");
        }
        Self { tx, rx }
    }

    pub fn acquire(&self) -> ReadPermit {
        // Cannot disconnect: we hold both ends for the batch lifetime.
        self.rx.recv().expect("read permit channel closed");
        ReadPermit {
            tx: self.tx.clone(),
        }
    }
}

/// RAII read permit; returns its token when dropped.
#[derive(Debug)]
pub struct ReadPermit {
    tx: Sender<()>,
}

impl Drop for ReadPermit {
    fn drop(&mut self) {
        let _ = self.tx.send(());
    }
}

/// Everything the pipeline tiers share for one batch. Built once by the
/// orchestrator; explicitly threaded into workers, never global.
pub struct BatchContext {
    pub options: Options,
    pub total: usize,
    pub counters: BatchCounters,
    pub clock: Arc<dyn Clock>,
    pub cancel: Arc<AtomicBool>,
    pub events: Sender<ImportProgressEvent>,
    pub read_permits: ReadPermits,
    pub monitor: QueueMonitor,
}

impl BatchContext {
    /// Publish one progress event. A dropped consumer is not an error; the
    /// batch still runs to completion.
    pub fn emit(&self, event: ImportProgressEvent) {
        let _ = self.events.send(event);
    }

    pub fn canceled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }
}
