//! Options Normalizer: resolve partially-specified [`ImportOpts`] into fully
//! bounded [`Options`]. Pure; performs no I/O.

use std::path::Path;
use std::time::Duration;

use crate::catalog::Clock;
use crate::errors::{ErrorCode, ImportError};
use crate::types::{ImportOpts, Options, PerfProfile};
use crate::utils::config::{ChannelCaps, OptionFloors};

/// Profile-derived defaults and upper bounds for every numeric knob.
#[derive(Clone, Copy, Debug)]
struct ProfileBounds {
    parallelism: usize,
    parallelism_max: usize,
    concurrent_reads: usize,
    concurrent_reads_max: usize,
    read_buffer: usize,
    read_buffer_max: usize,
    batch: usize,
    batch_max: usize,
    retries: u32,
    retries_max: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    delay_ceiling_ms: u64,
}

const LOW: ProfileBounds = ProfileBounds {
    parallelism: 2,
    parallelism_max: 4,
    concurrent_reads: 2,
    concurrent_reads_max: 4,
    read_buffer: 64 * 1024,
    read_buffer_max: 1024 * 1024,
    batch: 25,
    batch_max: 100,
    retries: 2,
    retries_max: 5,
    base_delay_ms: 100,
    max_delay_ms: 2_000,
    delay_ceiling_ms: 10_000,
};

const NORMAL: ProfileBounds = ProfileBounds {
    parallelism: 4,
    parallelism_max: 8,
    concurrent_reads: 4,
    concurrent_reads_max: 8,
    read_buffer: 128 * 1024,
    read_buffer_max: 4 * 1024 * 1024,
    batch: 50,
    batch_max: 200,
    retries: 3,
    retries_max: 8,
    base_delay_ms: 50,
    max_delay_ms: 1_000,
    delay_ceiling_ms: 10_000,
};

const HIGH: ProfileBounds = ProfileBounds {
    parallelism: 8,
    parallelism_max: 16,
    concurrent_reads: 8,
    concurrent_reads_max: 16,
    read_buffer: 256 * 1024,
    read_buffer_max: 8 * 1024 * 1024,
    batch: 100,
    batch_max: 500,
    retries: 3,
    retries_max: 8,
    base_delay_ms: 50,
    max_delay_ms: 1_000,
    delay_ceiling_ms: 10_000,
};

fn bounds_for(profile: PerfProfile, network: bool) -> ProfileBounds {
    let mut b = match profile {
        PerfProfile::Low => LOW,
        PerfProfile::Normal | PerfProfile::Custom => NORMAL,
        PerfProfile::High => HIGH,
    };
    if network {
        // Likely network share: fewer concurrent requests, bigger reads.
        b.concurrent_reads = b.concurrent_reads.div_ceil(2);
        b.parallelism = b.parallelism.min(b.concurrent_reads.max(2));
        b.read_buffer = (b.read_buffer * 4).min(b.read_buffer_max);
        b.base_delay_ms *= 2;
        b.max_delay_ms = (b.max_delay_ms * 2).min(b.delay_ceiling_ms);
    }
    b
}

/// UNC-style prefixes are the only portable hint we act on; anything else is
/// indistinguishable from a local mount without touching the filesystem.
fn looks_like_network_path(root: &Path) -> bool {
    let s = root.to_string_lossy();
    s.starts_with(r"\\") || s.starts_with("//")
}

/// Characters that cannot appear in a file name pattern (plus path separators,
/// checked separately). `*` and `?` are wildcards, not errors.
const FORBIDDEN_PATTERN_CHARS: [char; 5] = ['<', '>', ':', '"', '|'];

/// A pattern is usable when it is non-blank, names no directories, and
/// contains no forbidden filename characters.
pub fn pattern_is_valid(pattern: &str) -> bool {
    if pattern.trim().is_empty() {
        return false;
    }
    !pattern.chars().any(|c| {
        c == '/' || c == '\\' || c.is_control() || FORBIDDEN_PATTERN_CHARS.contains(&c)
    })
}

/// Absent or zero -> default; otherwise clamp into [floor, max].
fn clamp_usize(requested: Option<usize>, default: usize, floor: usize, max: usize) -> usize {
    match requested {
        Some(v) if v > 0 => v.clamp(floor, max),
        _ => default,
    }
}

fn clamp_u64(requested: Option<u64>, default: u64, floor: u64, max: u64) -> u64 {
    match requested {
        Some(v) if v > 0 => v.clamp(floor, max),
        _ => default,
    }
}

/// Resolve `opts` against `root` into fully bounded [`Options`].
///
/// Never fails: an invalid pattern is replaced with `"*"` and returned as a
/// single `invalid_search_pattern` warning instead of failing the batch.
pub fn normalize(root: &Path, opts: &ImportOpts, clock: &dyn Clock) -> (Options, Vec<ImportError>) {
    let mut warnings = Vec::new();
    let network = looks_like_network_path(root);
    let b = bounds_for(opts.profile, network);

    let pattern = match opts.pattern.as_deref() {
        None => "*".to_string(),
        Some(p) if pattern_is_valid(p) => p.to_string(),
        Some(p) => {
            warnings.push(
                ImportError::new(
                    root,
                    ErrorCode::InvalidSearchPattern,
                    format!("invalid file pattern {p:?}; importing all files instead"),
                    clock.now(),
                )
                .with_suggestion("use a plain file name pattern such as *.pdf"),
            );
            "*".to_string()
        }
    };

    let max_parallelism = clamp_usize(opts.max_parallelism, b.parallelism, 1, b.parallelism_max);
    let max_concurrent_reads = clamp_usize(
        opts.max_concurrent_reads,
        b.concurrent_reads,
        1,
        b.concurrent_reads_max,
    );
    let read_buffer_size = clamp_usize(
        opts.read_buffer_size,
        b.read_buffer,
        OptionFloors::READ_BUFFER,
        b.read_buffer_max,
    );
    let batch_size = clamp_usize(opts.batch_size, b.batch, OptionFloors::BATCH, b.batch_max);
    let retry_count = match opts.retry_count {
        Some(v) if v > 0 => v.min(b.retries_max),
        _ => b.retries,
    };
    let retry_base_delay_ms = clamp_u64(
        opts.retry_base_delay_ms,
        b.base_delay_ms,
        1,
        b.delay_ceiling_ms,
    );
    let retry_max_delay_ms = clamp_u64(
        opts.retry_max_delay_ms,
        b.max_delay_ms,
        retry_base_delay_ms,
        b.delay_ceiling_ms,
    );

    let channel_cap =
        (max_parallelism * ChannelCaps::PER_WORKER).clamp(ChannelCaps::MIN, ChannelCaps::MAX);

    let options = Options {
        pattern,
        recursive: opts.recursive.unwrap_or(true),
        default_author: opts.default_author.clone(),
        keep_fs_metadata: opts.keep_fs_metadata.unwrap_or(true),
        set_read_only: opts.set_read_only.unwrap_or(false),
        max_file_size: opts.max_file_size.filter(|&v| v > 0),
        profile: opts.profile,
        max_parallelism,
        max_concurrent_reads,
        read_buffer_size,
        batch_size,
        retry_count,
        retry_base_delay: Duration::from_millis(retry_base_delay_ms),
        retry_max_delay: Duration::from_millis(retry_max_delay_ms),
        channel_cap,
    };
    (options, warnings)
}
