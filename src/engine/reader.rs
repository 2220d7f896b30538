//! Content Reader/Hasher: open with bounded retry, stream bytes through a
//! rolling blake3 hash under the size ceiling, return a rewound seekable
//! handle. The whole file is never buffered.

use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::types::Options;

/// A file fully prepared for submission: open handle (rewound), content hash,
/// and captured filesystem metadata. Owned by exactly one pipeline stage at a
/// time; the handle closes on drop on every exit path.
#[derive(Debug)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub hash: [u8; 32],
    pub len: u64,
    pub file: File,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub fs_read_only: bool,
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("file is {actual} bytes, over the {limit}-byte import limit")]
    TooLarge { actual: u64, limit: u64 },
    #[error("file exceeded the {limit}-byte import limit while reading")]
    GrewPastLimit { limit: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Exponential backoff for attempt `n` (0-based): `base * 2^n`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    base.checked_mul(1u32 << attempt.min(16)).unwrap_or(max).min(max)
}

/// Error kinds worth retrying: sharing violations and other transient
/// conditions that clear once another process lets go of the file.
fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::PermissionDenied
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::ResourceBusy
    )
}

/// Open `path` for reading, retrying transient failures up to `retry_count`
/// times with exponential backoff between `base` and `max`.
pub fn open_with_retry(
    path: &Path,
    retry_count: u32,
    base: Duration,
    max: Duration,
) -> std::io::Result<File> {
    let mut attempt = 0u32;
    loop {
        match File::open(path) {
            Ok(f) => return Ok(f),
            Err(e) if attempt < retry_count && is_transient(e.kind()) => {
                let delay = backoff_delay(attempt, base, max);
                log::debug!(
                    "transient open failure on {} (attempt {}): {e}; retrying in {delay:?}",
                    path.display(),
                    attempt + 1
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Open, hash, and size-check one candidate file.
///
/// A known up-front size over the ceiling fails before any read. The running
/// total is checked while streaming as well, so growing files and files whose
/// length was unknown at open still respect the ceiling.
pub fn prepare_file(path: &Path, options: &Options) -> Result<PreparedFile, PrepareError> {
    let mut file = open_with_retry(
        path,
        options.retry_count,
        options.retry_base_delay,
        options.retry_max_delay,
    )?;
    let meta = file.metadata()?;
    if let Some(limit) = options.max_file_size {
        if meta.len() > limit {
            return Err(PrepareError::TooLarge {
                actual: meta.len(),
                limit,
            });
        }
    }

    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; options.read_buffer_size];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if let Some(limit) = options.max_file_size {
            if total > limit {
                return Err(PrepareError::GrewPastLimit { limit });
            }
        }
        hasher.update(&buf[..n]);
    }
    file.seek(SeekFrom::Start(0))?;

    Ok(PreparedFile {
        path: path.to_path_buf(),
        hash: *hasher.finalize().as_bytes(),
        len: total,
        file,
        created: meta.created().ok(),
        modified: meta.modified().ok(),
        fs_read_only: meta.permissions().readonly(),
    })
}
