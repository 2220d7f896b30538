//! Shelver: concurrent folder-import engine for a document catalog.
//!
//! Given a folder and optional [`ImportOpts`], the engine walks the tree,
//! hashes and size-checks each matching file through a bounded two-tier
//! pipeline, submits new content to the [`Catalog`](catalog::Catalog),
//! skips byte-identical duplicates, self-heals one known class of
//! search-index corruption, and streams an ordered
//! [`ImportProgressEvent`] sequence terminating in exactly one
//! `BatchCompleted` carrying the [`ImportAggregateResult`].

pub mod catalog;
pub mod engine;
pub mod errors;
pub mod options;
pub mod pipeline;
pub mod types;
pub mod utils;

pub use errors::{ErrorCode, ImportError};
pub use types::*;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, bounded};

use crate::catalog::{Catalog, Clock};
use crate::pipeline::orchestrator::{BatchParams, run_batch};
use crate::utils::config::ChannelCaps;

/// Result alias used by the public shelver API.
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// The ordered progress stream of one import batch.
///
/// Iterate to drain events; the stream ends after the single
/// `BatchCompleted`. Dropping the stream early cancels delivery but lets the
/// batch run to completion in the background. The consumer is shielded from
/// the batch's cancellation signal: queued events are still delivered after
/// cancellation.
pub struct ImportStream {
    events: Option<Receiver<ImportProgressEvent>>,
    driver: Option<JoinHandle<()>>,
}

impl Iterator for ImportStream {
    type Item = ImportProgressEvent;

    fn next(&mut self) -> Option<ImportProgressEvent> {
        match self.events.as_ref()?.recv() {
            Ok(event) => Some(event),
            Err(_) => {
                self.events = None;
                if let Some(driver) = self.driver.take() {
                    let _ = driver.join();
                }
                None
            }
        }
    }
}

impl ImportStream {
    /// Fold the stream into its terminal aggregate, discarding intermediate
    /// events. Thin wrapper over the same event sequence, never a parallel
    /// implementation.
    pub fn collect_result(mut self) -> ImportAggregateResult {
        let mut last = None;
        for event in &mut self {
            if let ImportProgressEvent::BatchCompleted { result, .. } = event {
                last = Some(result);
            }
        }
        // The driver always sends BatchCompleted; this arm is only reachable
        // if it died without unwinding through the event contract.
        last.unwrap_or(ImportAggregateResult {
            status: ImportStatus::FatalError,
            total: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: vec![ImportError::new(
                "",
                ErrorCode::UnexpectedError,
                "import driver exited without completing the batch",
                std::time::SystemTime::now(),
            )],
        })
    }
}

impl Drop for ImportStream {
    fn drop(&mut self) {
        // Release the receiver first so a driver blocked on a full event
        // queue can finish, then wait for it.
        self.events = None;
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
    }
}

/// Single entry point: import every matching file under `root` into
/// `catalog`, streaming ordered progress events.
///
/// `cancel` may be flipped from any thread (e.g. a Ctrl+C handler) to stop
/// the batch cooperatively; cancellation surfaces as a `canceled` error and
/// `PartialSuccess`, never a lost `BatchCompleted`.
pub fn import_dir(
    root: &Path,
    opts: &ImportOpts,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    cancel: Option<Arc<AtomicBool>>,
) -> ImportStream {
    let (events_tx, events_rx) = bounded(ChannelCaps::EVENTS);
    let params = BatchParams {
        root: root.to_path_buf(),
        opts: opts.clone(),
        catalog,
        clock,
        cancel: cancel.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        events: events_tx,
    };
    let driver = std::thread::spawn(move || run_batch(params));
    ImportStream {
        events: Some(events_rx),
        driver: Some(driver),
    }
}

/// Convenience entry point: run the import and return only the terminal
/// aggregate.
pub fn import_dir_collect(
    root: &Path,
    opts: &ImportOpts,
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    cancel: Option<Arc<AtomicBool>>,
) -> ImportAggregateResult {
    import_dir(root, opts, catalog, clock, cancel).collect_result()
}
