//! Submission tier: duplicate detection, catalog submission, result
//! classification, and per-file event emission. Runs on a single thread,
//! draining prepared items in fixed-size batches.

use std::io::{Seek, SeekFrom};
use std::sync::Mutex;

use crossbeam_channel::Receiver;

use crate::catalog::{
    Catalog, CatalogError, CatalogErrorKind, DocumentRecord, IDENTICAL_CONTENT_MARKER,
};
use crate::errors::{ErrorCode, ImportError};
use crate::pipeline::context::BatchContext;
use crate::pipeline::prepare::PreparedOutcome;
use crate::types::ImportProgressEvent;

use super::reader::PreparedFile;
use super::repair::{RepairGate, is_index_corruption};

/// Single-slot gate around the duplicate-check/submit pair, shared by every
/// batch in the process. Concurrent imports into the same catalog cannot
/// interleave between the hash lookup and the write.
static WRITE_GATE: Mutex<()> = Mutex::new(());

fn write_gate() -> std::sync::MutexGuard<'static, ()> {
    // A poisoned gate means another batch panicked mid-write; the lock
    // itself is still usable.
    WRITE_GATE
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

enum SubmitOutcome {
    Written { updated: bool },
    Duplicate,
}

/// The single sequential writer of the submission tier. Owns the counters'
/// write side and the per-file error list for the batch.
pub struct Submitter<'a> {
    catalog: &'a dyn Catalog,
    ctx: &'a BatchContext,
    repair: &'a RepairGate,
    errors: Vec<ImportError>,
    canceled: bool,
}

impl<'a> Submitter<'a> {
    pub fn new(catalog: &'a dyn Catalog, ctx: &'a BatchContext, repair: &'a RepairGate) -> Self {
        Self {
            catalog,
            ctx,
            repair,
            errors: Vec::new(),
            canceled: false,
        }
    }

    /// Drain prepared items until the channel closes or cancellation hits.
    /// Items are pulled in batches of `batch_size`, bounding outstanding open
    /// handles while preparation runs ahead.
    pub fn run(&mut self, prepared_rx: &Receiver<PreparedOutcome>) {
        let batch_size = self.ctx.options.batch_size;
        let mut open = true;
        while open {
            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match prepared_rx.recv() {
                    Ok(item) => batch.push(item),
                    Err(_) => {
                        open = false;
                        break;
                    }
                }
            }
            for item in batch {
                if self.ctx.canceled() {
                    // Remaining handles close on drop.
                    self.canceled = true;
                    return;
                }
                match item {
                    PreparedOutcome::Failed(error) => {
                        self.fail_file(vec![error]);
                    }
                    PreparedOutcome::Ready(prepared) => self.submit_prepared(*prepared),
                }
            }
        }
    }

    /// Accumulated per-file errors and whether cancellation interrupted the loop.
    pub fn finish(self) -> (Vec<ImportError>, bool) {
        (self.errors, self.canceled)
    }

    fn submit_prepared(&mut self, mut prepared: PreparedFile) {
        let first = {
            let _gate = write_gate();
            self.try_submit(&mut prepared)
        };
        match first {
            Ok(SubmitOutcome::Written { updated }) => self.complete_success(&prepared, updated),
            Ok(SubmitOutcome::Duplicate) => self.complete_skipped(&prepared),
            Err(err) => {
                if is_index_corruption(&err) && self.repair.attempt(self.catalog) {
                    // Repair succeeded: resubmit this file exactly once.
                    let second = {
                        let _gate = write_gate();
                        self.try_submit(&mut prepared)
                    };
                    match second {
                        Ok(SubmitOutcome::Written { updated }) => {
                            self.complete_success(&prepared, updated)
                        }
                        Ok(SubmitOutcome::Duplicate) => self.complete_skipped(&prepared),
                        Err(err) => self.fail_catalog(&prepared, err),
                    }
                } else {
                    // No repair, repair already failed, or an unrelated
                    // failure: keep the original error.
                    self.fail_catalog(&prepared, err);
                }
            }
        }
    }

    fn try_submit(&self, prepared: &mut PreparedFile) -> Result<SubmitOutcome, CatalogError> {
        if self.catalog.contains_hash(&prepared.hash)? {
            return Ok(SubmitOutcome::Duplicate);
        }
        prepared
            .file
            .seek(SeekFrom::Start(0))
            .map_err(|e| CatalogError::other(format!("rewind content stream: {e}")))?;
        let doc = self.to_record(prepared);
        match self.catalog.submit(&doc, &mut prepared.file) {
            Ok(receipt) => Ok(SubmitOutcome::Written {
                updated: receipt.updated > 0,
            }),
            Err(e)
                if e.kind == CatalogErrorKind::Conflict
                    && e.message.to_lowercase().contains(IDENTICAL_CONTENT_MARKER) =>
            {
                // The catalog lost a race to identical content; same as a
                // duplicate found up front.
                Ok(SubmitOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Map a prepared file to the catalog writer's input, applying the
    /// normalized metadata options.
    fn to_record(&self, prepared: &PreparedFile) -> DocumentRecord {
        let options = &self.ctx.options;
        DocumentRecord {
            path: prepared.path.clone(),
            file_name: prepared
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_hash: prepared.hash,
            content_length: prepared.len,
            author: options.default_author.clone(),
            created: options.keep_fs_metadata.then_some(prepared.created).flatten(),
            modified: options
                .keep_fs_metadata
                .then_some(prepared.modified)
                .flatten(),
            read_only: options.set_read_only
                || (options.keep_fs_metadata && prepared.fs_read_only),
        }
    }

    fn complete_success(&mut self, prepared: &PreparedFile, updated: bool) {
        self.ctx.counters.record_success();
        let snap = self.ctx.counters.snapshot();
        self.ctx.emit(ImportProgressEvent::FileCompleted {
            path: prepared.path.clone(),
            processed: snap.processed,
            total: self.ctx.total,
            succeeded: true,
            skipped: false,
            message: updated.then(|| "updated existing catalog record".to_string()),
            time: self.ctx.now(),
        });
        self.emit_progress(None);
    }

    fn complete_skipped(&mut self, prepared: &PreparedFile) {
        self.ctx.counters.record_skip();
        let snap = self.ctx.counters.snapshot();
        self.ctx.emit(ImportProgressEvent::FileCompleted {
            path: prepared.path.clone(),
            processed: snap.processed,
            total: self.ctx.total,
            succeeded: false,
            skipped: true,
            message: Some("identical content already in catalog".to_string()),
            time: self.ctx.now(),
        });
        self.emit_progress(None);
    }

    fn fail_catalog(&mut self, prepared: &PreparedFile, err: CatalogError) {
        let errors = errors_from_catalog(&prepared.path, err, self.ctx);
        self.fail_file(errors);
    }

    /// Record one failed file. `errors` must be non-empty; the first entry is
    /// the primary error carried by the `ErrorOccurred` event.
    fn fail_file(&mut self, errors: Vec<ImportError>) {
        debug_assert!(!errors.is_empty());
        self.ctx.counters.record_failure();
        let snap = self.ctx.counters.snapshot();
        let primary = errors[0].clone();
        log::warn!("import failed: {primary}");
        self.errors.extend(errors);
        self.ctx.emit(ImportProgressEvent::ErrorOccurred {
            error: primary,
            processed: snap.processed,
            total: self.ctx.total,
            succeeded: snap.succeeded,
            failed: snap.failed,
            skipped: snap.skipped,
            time: self.ctx.now(),
        });
        self.emit_progress(None);
    }

    fn emit_progress(&self, message: Option<String>) {
        let snap = self.ctx.counters.snapshot();
        self.ctx.emit(ImportProgressEvent::Progress {
            processed: snap.processed,
            total: self.ctx.total,
            succeeded: snap.succeeded,
            failed: snap.failed,
            skipped: snap.skipped,
            message,
            time: self.ctx.now(),
        });
    }
}

fn catalog_kind_to_code(kind: CatalogErrorKind) -> ErrorCode {
    match kind {
        CatalogErrorKind::Database => ErrorCode::DatabaseError,
        CatalogErrorKind::HashMismatch => ErrorCode::ContentHashMismatch,
        CatalogErrorKind::Conflict
        | CatalogErrorKind::Validation
        | CatalogErrorKind::Other => ErrorCode::UnexpectedError,
    }
}

/// Build the error records for one failed submission: one per field issue
/// when the catalog reported any, one from the message otherwise, or a
/// synthetic unexpected error when the response carries nothing usable.
fn errors_from_catalog(
    path: &std::path::Path,
    err: CatalogError,
    ctx: &BatchContext,
) -> Vec<ImportError> {
    let time = ctx.now();
    let code = catalog_kind_to_code(err.kind);
    if !err.field_issues.is_empty() {
        return err
            .field_issues
            .iter()
            .map(|issue| {
                let mut e = ImportError::new(
                    path,
                    code,
                    format!("{}: {}", issue.field, issue.message),
                    time,
                );
                if let Some(detail) = &err.detail {
                    e = e.with_detail(detail.clone());
                }
                e
            })
            .collect();
    }
    if !err.message.trim().is_empty() {
        let mut e = ImportError::new(path, code, err.message.clone(), time);
        if let Some(detail) = &err.detail {
            e = e.with_detail(detail.clone());
        }
        return vec![e];
    }
    vec![ImportError::new(
        path,
        ErrorCode::UnexpectedError,
        "catalog returned an unclassified failure",
        time,
    )]
}
