//! Batch driver: normalize options, enumerate, run the preparation and
//! submission tiers, and emit the ordered progress stream ending in exactly
//! one `BatchCompleted`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Sender, bounded};

use crate::catalog::{Catalog, Clock};
use crate::engine::repair::RepairGate;
use crate::engine::status::{BatchTally, classify_batch};
use crate::engine::submit::Submitter;
use crate::errors::{ErrorCode, ImportError};
use crate::options;
use crate::types::{ImportAggregateResult, ImportOpts, ImportProgressEvent};

use super::context::{BatchContext, BatchCounters, CounterSnapshot, ReadPermits};
use super::enumerate::enumerate_folder;
use super::monitor::QueueMonitor;
use super::prepare::spawn_prepare_workers;

pub(crate) struct BatchParams {
    pub root: PathBuf,
    pub opts: ImportOpts,
    pub catalog: Arc<dyn Catalog>,
    pub clock: Arc<dyn Clock>,
    pub cancel: Arc<AtomicBool>,
    pub events: Sender<ImportProgressEvent>,
}

fn emit_error_event(
    events: &Sender<ImportProgressEvent>,
    clock: &dyn Clock,
    snap: CounterSnapshot,
    total: usize,
    error: &ImportError,
) {
    let _ = events.send(ImportProgressEvent::ErrorOccurred {
        error: error.clone(),
        processed: snap.processed,
        total,
        succeeded: snap.succeeded,
        failed: snap.failed,
        skipped: snap.skipped,
        time: clock.now(),
    });
}

/// Build the aggregate, classify it, and send the terminal event.
/// The status stored here is the single source of truth for batch success.
fn finish_batch(
    events: &Sender<ImportProgressEvent>,
    clock: &dyn Clock,
    total: usize,
    snap: CounterSnapshot,
    errors: Vec<ImportError>,
    fatal: bool,
    canceled: bool,
    enumeration_diagnostics: bool,
) {
    let tally = BatchTally {
        total,
        processed: snap.processed,
        succeeded: snap.succeeded,
        failed: snap.failed,
        skipped: snap.skipped,
    };
    let other_errors = errors
        .iter()
        .any(|e| e.code != ErrorCode::DirectoryEnumerationFailed);
    let status = classify_batch(&tally, fatal, canceled, enumeration_diagnostics, other_errors);
    log::debug!(
        "batch finished: {status:?} ({} of {} processed, {} succeeded, {} failed, {} skipped)",
        snap.processed,
        total,
        snap.succeeded,
        snap.failed,
        snap.skipped
    );
    let result = ImportAggregateResult {
        status,
        total,
        processed: snap.processed,
        succeeded: snap.succeeded,
        failed: snap.failed,
        skipped: snap.skipped,
        errors,
    };
    let _ = events.send(ImportProgressEvent::BatchCompleted {
        result,
        time: clock.now(),
    });
}

/// Run one import batch to completion. Always emits exactly one
/// `BatchStarted` and one `BatchCompleted`, whatever goes wrong in between.
pub(crate) fn run_batch(params: BatchParams) {
    let BatchParams {
        root,
        opts,
        catalog,
        clock,
        cancel,
        events,
    } = params;

    let (options, warnings) = options::normalize(&root, &opts, clock.as_ref());
    log::debug!("importing {} with {options:?}", root.display());

    let mut errors: Vec<ImportError> = Vec::new();

    let enumeration = match enumerate_folder(&root, &options, clock.as_ref(), &cancel) {
        Ok(e) => e,
        Err(root_err) => {
            // Fatal: the batch never starts real work, but the event contract
            // still holds.
            let _ = events.send(ImportProgressEvent::BatchStarted {
                total: 0,
                time: clock.now(),
            });
            for w in warnings {
                emit_error_event(&events, clock.as_ref(), CounterSnapshot::default(), 0, &w);
                errors.push(w);
            }
            log::error!("{root_err}");
            emit_error_event(
                &events,
                clock.as_ref(),
                CounterSnapshot::default(),
                0,
                &root_err,
            );
            errors.push(root_err);
            finish_batch(
                &events,
                clock.as_ref(),
                0,
                CounterSnapshot::default(),
                errors,
                true,
                false,
                false,
            );
            return;
        }
    };

    let total = enumeration.candidates.len();
    let enumeration_diagnostics = !enumeration.diagnostics.is_empty();

    let ctx = Arc::new(BatchContext {
        options: options.clone(),
        total,
        counters: BatchCounters::default(),
        clock: Arc::clone(&clock),
        cancel: Arc::clone(&cancel),
        events: events.clone(),
        read_permits: ReadPermits::new(options.max_concurrent_reads),
        monitor: QueueMonitor::new(options.channel_cap),
    });

    ctx.emit(ImportProgressEvent::BatchStarted {
        total,
        time: ctx.now(),
    });
    for w in warnings {
        emit_error_event(&events, clock.as_ref(), ctx.counters.snapshot(), total, &w);
        errors.push(w);
    }
    for d in enumeration.diagnostics {
        emit_error_event(&events, clock.as_ref(), ctx.counters.snapshot(), total, &d);
        errors.push(d);
    }

    let (path_tx, path_rx) = bounded::<PathBuf>(options.channel_cap);
    let (prepared_tx, prepared_rx) = bounded(options.channel_cap);

    let feeder = {
        let cancel = Arc::clone(&cancel);
        let candidates = enumeration.candidates;
        thread::spawn(move || {
            for path in candidates {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                if path_tx.send(path).is_err() {
                    break;
                }
            }
        })
    };

    let workers = spawn_prepare_workers(path_rx, prepared_tx, Arc::clone(&ctx));

    let repair = RepairGate::new();
    let mut submitter = Submitter::new(catalog.as_ref(), &ctx, &repair);
    submitter.run(&prepared_rx);
    // Unblocks workers still parked on a full prepared queue after cancellation.
    drop(prepared_rx);
    let (file_errors, canceled_mid_submit) = submitter.finish();
    errors.extend(file_errors);

    let mut fatal = false;
    if feeder.join().is_err() {
        fatal = true;
        errors.push(ImportError::new(
            &root,
            ErrorCode::UnexpectedError,
            "candidate feeder thread panicked",
            clock.now(),
        ));
    }
    for handle in workers {
        if handle.join().is_err() {
            fatal = true;
            errors.push(ImportError::new(
                &root,
                ErrorCode::UnexpectedError,
                "a preparation worker panicked",
                clock.now(),
            ));
        }
    }

    let canceled = canceled_mid_submit || cancel.load(Ordering::Relaxed);
    if canceled {
        let e = ImportError::new(
            &root,
            ErrorCode::Canceled,
            "import canceled before all files were processed",
            clock.now(),
        )
        .with_suggestion("re-run the import to pick up the remaining files");
        log::warn!("{e}");
        emit_error_event(&events, clock.as_ref(), ctx.counters.snapshot(), total, &e);
        errors.push(e);
    }

    let snap = ctx.counters.snapshot();
    finish_batch(
        &events,
        clock.as_ref(),
        total,
        snap,
        errors,
        fatal,
        canceled,
        enumeration_diagnostics,
    );
}
