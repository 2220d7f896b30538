//! Public types for the shelver API: options, progress events, aggregate result.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::errors::ImportError;

/// Named bundle of default concurrency/buffer/batch settings.
///
/// `Custom` starts from the `Normal` defaults and lets every knob be set
/// explicitly on [`ImportOpts`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum PerfProfile {
    Low,
    #[default]
    Normal,
    High,
    Custom,
}

/// Caller-facing options for [`import_dir`](crate::import_dir). Every field is
/// optional; absent or zero numeric fields fall back to the profile default
/// during normalization. Built once per batch, never mutated.
#[derive(Clone, Debug, Default)]
pub struct ImportOpts {
    /// File name pattern (`*` and `?` wildcards). Invalid patterns are
    /// replaced with `"*"` and recorded as a warning, never a batch failure.
    pub pattern: Option<String>,
    /// Descend into subdirectories. Default true.
    pub recursive: Option<bool>,
    /// Author assigned to documents that carry none.
    pub default_author: Option<String>,
    /// Carry filesystem created/modified timestamps into the catalog. Default true.
    pub keep_fs_metadata: Option<bool>,
    /// Mark cataloged documents read-only. Default false.
    pub set_read_only: Option<bool>,
    /// Size ceiling in bytes; larger files fail with `file_too_large`.
    /// `None` means unlimited.
    pub max_file_size: Option<u64>,
    pub profile: PerfProfile,
    /// Preparation worker count.
    pub max_parallelism: Option<usize>,
    /// Concurrent file reads, throttled separately from preparation workers.
    pub max_concurrent_reads: Option<usize>,
    /// Read buffer size in bytes.
    pub read_buffer_size: Option<usize>,
    /// Prepared files drained per submission batch.
    pub batch_size: Option<usize>,
    /// Retries for transient open failures.
    pub retry_count: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
}

/// Fully bounded options produced by [`normalize`](crate::options::normalize).
/// Every numeric knob lies within its profile-derived range.
#[derive(Clone, Debug)]
pub struct Options {
    pub pattern: String,
    pub recursive: bool,
    pub default_author: Option<String>,
    pub keep_fs_metadata: bool,
    pub set_read_only: bool,
    pub max_file_size: Option<u64>,
    pub profile: PerfProfile,
    pub max_parallelism: usize,
    pub max_concurrent_reads: usize,
    pub read_buffer_size: usize,
    pub batch_size: usize,
    pub retry_count: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Capacity of the path and prepared channels, derived from parallelism.
    pub channel_cap: usize,
}

/// Terminal classification of one import batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    Success,
    PartialSuccess,
    Failure,
    FatalError,
}

/// The one artifact surviving past stream completion: final counters, status,
/// and the ordered error list.
#[derive(Clone, Debug, Serialize)]
pub struct ImportAggregateResult {
    pub status: ImportStatus,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// One element of the ordered progress stream.
///
/// Invariants: exactly one `BatchStarted` first and one `BatchCompleted` last;
/// per file, `FileStarted` precedes its terminal event (`FileCompleted` or
/// `ErrorOccurred`); interleaving across different files is permitted.
#[derive(Clone, Debug)]
pub enum ImportProgressEvent {
    BatchStarted {
        total: usize,
        time: SystemTime,
    },
    FileStarted {
        path: PathBuf,
        processed: usize,
        total: usize,
        time: SystemTime,
    },
    FileCompleted {
        path: PathBuf,
        processed: usize,
        total: usize,
        succeeded: bool,
        skipped: bool,
        message: Option<String>,
        time: SystemTime,
    },
    ErrorOccurred {
        error: ImportError,
        processed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        time: SystemTime,
    },
    Progress {
        processed: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        message: Option<String>,
        time: SystemTime,
    },
    BatchCompleted {
        result: ImportAggregateResult,
        time: SystemTime,
    },
}
