//! Option normalization: profile defaults, clamping, floors, pattern
//! validation, and the network-path bias.

mod common;

use std::path::Path;

use common::FixedClock;
use shelver::options::{normalize, pattern_is_valid};
use shelver::utils::glob_match;
use shelver::{ErrorCode, ImportOpts, PerfProfile};

fn clock() -> FixedClock {
    FixedClock::at_epoch_secs(1_700_000_000)
}

fn local_root() -> &'static Path {
    Path::new("/data/docs")
}

#[test]
fn defaults_from_normal_profile() {
    let (options, warnings) = normalize(local_root(), &ImportOpts::default(), &clock());
    assert!(warnings.is_empty());
    assert_eq!(options.pattern, "*");
    assert!(options.recursive);
    assert!(options.keep_fs_metadata);
    assert!(!options.set_read_only);
    assert_eq!(options.max_file_size, None);
    assert_eq!(options.max_parallelism, 4);
    assert_eq!(options.max_concurrent_reads, 4);
    assert_eq!(options.read_buffer_size, 128 * 1024);
    assert_eq!(options.batch_size, 50);
    assert_eq!(options.retry_count, 3);
    assert_eq!(options.retry_base_delay.as_millis(), 50);
    assert_eq!(options.retry_max_delay.as_millis(), 1_000);
    assert_eq!(options.channel_cap, 16);
}

#[test]
fn low_and_high_profile_defaults() {
    let low = ImportOpts {
        profile: PerfProfile::Low,
        ..ImportOpts::default()
    };
    let (options, _) = normalize(local_root(), &low, &clock());
    assert_eq!(options.max_parallelism, 2);
    assert_eq!(options.read_buffer_size, 64 * 1024);
    assert_eq!(options.batch_size, 25);
    // 2 workers x 4 slots = 8, already at the channel floor.
    assert_eq!(options.channel_cap, 8);

    let high = ImportOpts {
        profile: PerfProfile::High,
        ..ImportOpts::default()
    };
    let (options, _) = normalize(local_root(), &high, &clock());
    assert_eq!(options.max_parallelism, 8);
    assert_eq!(options.read_buffer_size, 256 * 1024);
    assert_eq!(options.batch_size, 100);
    assert_eq!(options.channel_cap, 32);
}

#[test]
fn zero_values_fall_back_to_defaults() {
    let opts = ImportOpts {
        max_parallelism: Some(0),
        max_concurrent_reads: Some(0),
        read_buffer_size: Some(0),
        batch_size: Some(0),
        retry_count: Some(0),
        max_file_size: Some(0),
        ..ImportOpts::default()
    };
    let (options, warnings) = normalize(local_root(), &opts, &clock());
    assert!(warnings.is_empty());
    assert_eq!(options.max_parallelism, 4);
    assert_eq!(options.max_concurrent_reads, 4);
    assert_eq!(options.read_buffer_size, 128 * 1024);
    assert_eq!(options.batch_size, 50);
    assert_eq!(options.retry_count, 3);
    // A zero ceiling means "no ceiling", not "reject everything".
    assert_eq!(options.max_file_size, None);
}

#[test]
fn oversized_values_clamp_to_profile_max() {
    let opts = ImportOpts {
        max_parallelism: Some(10_000),
        max_concurrent_reads: Some(10_000),
        read_buffer_size: Some(usize::MAX),
        batch_size: Some(1_000_000),
        retry_count: Some(100),
        retry_base_delay_ms: Some(999_999),
        retry_max_delay_ms: Some(999_999),
        ..ImportOpts::default()
    };
    let (options, _) = normalize(local_root(), &opts, &clock());
    assert_eq!(options.max_parallelism, 8);
    assert_eq!(options.max_concurrent_reads, 8);
    assert_eq!(options.read_buffer_size, 4 * 1024 * 1024);
    assert_eq!(options.batch_size, 200);
    assert_eq!(options.retry_count, 8);
    assert_eq!(options.retry_base_delay.as_millis(), 10_000);
    assert_eq!(options.retry_max_delay.as_millis(), 10_000);
}

#[test]
fn floors_apply_to_tiny_values() {
    let opts = ImportOpts {
        read_buffer_size: Some(16),
        batch_size: Some(1),
        max_parallelism: Some(1),
        ..ImportOpts::default()
    };
    let (options, _) = normalize(local_root(), &opts, &clock());
    assert_eq!(options.read_buffer_size, 4096);
    assert_eq!(options.batch_size, 1);
    assert_eq!(options.max_parallelism, 1);
    // One worker would give cap 4; the channel floor keeps it at 8.
    assert_eq!(options.channel_cap, 8);
}

#[test]
fn invalid_pattern_becomes_match_all_with_one_warning() {
    for bad in ["", "   ", "a/b", r"a\b", "doc:s", "a|b", "x<y>"] {
        let opts = ImportOpts {
            pattern: Some(bad.to_string()),
            ..ImportOpts::default()
        };
        let (options, warnings) = normalize(local_root(), &opts, &clock());
        assert_eq!(options.pattern, "*", "pattern {bad:?}");
        assert_eq!(warnings.len(), 1, "pattern {bad:?}");
        assert_eq!(warnings[0].code, ErrorCode::InvalidSearchPattern);
        assert!(warnings[0].suggestion.is_some());
    }
}

#[test]
fn valid_patterns_pass_through() {
    for good in ["*", "*.pdf", "report-?.txt", "invoice 2024*.md"] {
        assert!(pattern_is_valid(good), "{good:?}");
        let opts = ImportOpts {
            pattern: Some(good.to_string()),
            ..ImportOpts::default()
        };
        let (options, warnings) = normalize(local_root(), &opts, &clock());
        assert_eq!(options.pattern, good);
        assert!(warnings.is_empty());
    }
}

#[test]
fn network_root_biases_toward_fewer_bigger_reads() {
    let (local, _) = normalize(local_root(), &ImportOpts::default(), &clock());
    let (network, _) = normalize(Path::new("//server/share/docs"), &ImportOpts::default(), &clock());
    assert_eq!(network.max_concurrent_reads, local.max_concurrent_reads / 2);
    assert_eq!(network.read_buffer_size, local.read_buffer_size * 4);
    assert!(network.max_parallelism <= local.max_parallelism);
    assert!(network.retry_base_delay > local.retry_base_delay);
}

#[test]
fn explicit_values_survive_network_bias_within_bounds() {
    let opts = ImportOpts {
        max_concurrent_reads: Some(6),
        ..ImportOpts::default()
    };
    let (options, _) = normalize(Path::new(r"\\server\share"), &opts, &clock());
    // Explicit request wins over the biased default, still clamped to max.
    assert_eq!(options.max_concurrent_reads, 6);
}

#[test]
fn glob_match_wildcards_and_case() {
    assert!(glob_match("*", "anything.bin"));
    assert!(glob_match("*", ""));
    assert!(glob_match("*.pdf", "scan.pdf"));
    assert!(glob_match("*.pdf", "SCAN.PDF"));
    assert!(!glob_match("*.pdf", "scan.pdfx"));
    assert!(!glob_match("*.pdf", "pdf"));
    assert!(glob_match("report-?.txt", "report-1.txt"));
    assert!(!glob_match("report-?.txt", "report-10.txt"));
    assert!(glob_match("a*b*c", "aXXbYYc"));
    assert!(glob_match("a*b*c", "abc"));
    assert!(!glob_match("a*b*c", "acb"));
    assert!(glob_match("*fts*", "documents_fts_idx"));
}
