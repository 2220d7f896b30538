//! Preparation tier: workers that read paths, hash file content under the
//! read-permit throttle, and enqueue prepared outcomes for submission.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::engine::reader::{PrepareError, PreparedFile, prepare_file};
use crate::errors::{ErrorCode, ImportError};
use crate::types::ImportProgressEvent;

use super::context::BatchContext;

/// What one preparation worker produced for a candidate path. Failures ride
/// the same queue so the submission tier stays the single writer of counters
/// and terminal events.
#[derive(Debug)]
pub enum PreparedOutcome {
    Ready(Box<PreparedFile>),
    Failed(ImportError),
}

fn prepare_error_to_import_error(
    path: &std::path::Path,
    err: PrepareError,
    ctx: &BatchContext,
) -> ImportError {
    let time = ctx.now();
    match err {
        PrepareError::TooLarge { actual, limit } => ImportError::new(
            path,
            ErrorCode::FileTooLarge,
            format!("file is {actual} bytes, over the {limit}-byte import limit"),
            time,
        )
        .with_suggestion("raise the size limit in import options or exclude the file"),
        PrepareError::GrewPastLimit { limit } => ImportError::new(
            path,
            ErrorCode::FileTooLarge,
            format!("file exceeded the {limit}-byte import limit while reading"),
            time,
        )
        .with_suggestion("the file may be in use; import it once it stops changing"),
        PrepareError::Io(e) => ImportError::new(
            path,
            ErrorCode::UnexpectedError,
            format!("cannot read file: {e}"),
            time,
        )
        .with_detail(e.to_string()),
    }
}

fn prepare_worker_loop(
    path_rx: Receiver<std::path::PathBuf>,
    prepared_tx: Sender<PreparedOutcome>,
    ctx: Arc<BatchContext>,
) {
    while let Ok(path) = path_rx.recv() {
        if ctx.canceled() {
            break;
        }
        let snap = ctx.counters.snapshot();
        ctx.emit(ImportProgressEvent::FileStarted {
            path: path.clone(),
            processed: snap.processed,
            total: ctx.total,
            time: ctx.now(),
        });

        let outcome = {
            let _permit = ctx.read_permits.acquire();
            prepare_file(&path, &ctx.options)
        };
        let outcome = match outcome {
            Ok(prepared) => PreparedOutcome::Ready(Box::new(prepared)),
            Err(e) => PreparedOutcome::Failed(prepare_error_to_import_error(&path, e, &ctx)),
        };

        ctx.monitor.before_send(prepared_tx.len());
        if prepared_tx.send(outcome).is_err() {
            break;
        }
    }
}

/// Spawn the preparation workers. Caller must drop its own `prepared_tx`
/// clone so the channel closes when the last worker exits.
pub fn spawn_prepare_workers(
    path_rx: Receiver<std::path::PathBuf>,
    prepared_tx: Sender<PreparedOutcome>,
    ctx: Arc<BatchContext>,
) -> Vec<JoinHandle<()>> {
    (0..ctx.options.max_parallelism)
        .map(|_| {
            let path_rx = path_rx.clone();
            let prepared_tx = prepared_tx.clone();
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || prepare_worker_loop(path_rx, prepared_tx, ctx))
        })
        .collect()
}
