//! Engine stages in isolation: retry backoff, file preparation, corruption
//! detection, and the one-shot repair gate.

mod common;

use std::io::Read;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MemoryCatalog, TempDir, normalized_options};
use shelver::catalog::CatalogError;
use shelver::engine::{
    PrepareError, RepairGate, backoff_delay, is_index_corruption, open_with_retry, prepare_file,
};
use shelver::options::normalize;
use shelver::{ImportOpts, options};

#[test]
fn backoff_doubles_then_caps() {
    let base = Duration::from_millis(50);
    let max = Duration::from_millis(1_000);
    assert_eq!(backoff_delay(0, base, max), Duration::from_millis(50));
    assert_eq!(backoff_delay(1, base, max), Duration::from_millis(100));
    assert_eq!(backoff_delay(2, base, max), Duration::from_millis(200));
    assert_eq!(backoff_delay(4, base, max), Duration::from_millis(800));
    assert_eq!(backoff_delay(5, base, max), max);
    assert_eq!(backoff_delay(30, base, max), max);
}

#[test]
fn open_missing_file_fails_without_retries() {
    let dir = TempDir::new("open-missing");
    let start = std::time::Instant::now();
    let err = open_with_retry(
        &dir.missing_child("nope.txt"),
        5,
        Duration::from_millis(200),
        Duration::from_millis(1_000),
    )
    .unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    // NotFound is not transient, so no backoff sleeps happened.
    assert!(start.elapsed() < Duration::from_millis(200));
}

#[test]
fn prepare_hashes_and_rewinds() {
    let dir = TempDir::new("prepare");
    let bytes = b"the quick brown fox";
    let path = dir.write("doc.txt", bytes);
    let options = normalized_options(&dir.path);

    let mut prepared = prepare_file(&path, &options).unwrap();
    assert_eq!(prepared.len, bytes.len() as u64);
    assert_eq!(prepared.hash, *blake3::hash(bytes).as_bytes());
    assert!(prepared.modified.is_some());

    // The handle comes back rewound and readable end to end.
    let mut reread = Vec::new();
    prepared.file.read_to_end(&mut reread).unwrap();
    assert_eq!(reread, bytes);
}

#[test]
fn prepare_rejects_files_over_the_ceiling() {
    let dir = TempDir::new("prepare-ceiling");
    let path = dir.write("big.bin", &[0u8; 100]);
    let opts = ImportOpts {
        max_file_size: Some(10),
        ..ImportOpts::default()
    };
    let clock = common::FixedClock::at_epoch_secs(1_700_000_000);
    let (options, _) = normalize(&dir.path, &opts, &clock);

    match prepare_file(&path, &options).unwrap_err() {
        PrepareError::TooLarge { actual, limit } => {
            assert_eq!(actual, 100);
            assert_eq!(limit, 10);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn prepare_empty_file() {
    let dir = TempDir::new("prepare-empty");
    let path = dir.write("empty.txt", b"");
    let options = normalized_options(&dir.path);
    let prepared = prepare_file(&path, &options).unwrap();
    assert_eq!(prepared.len, 0);
    assert_eq!(prepared.hash, *blake3::hash(b"").as_bytes());
}

#[test]
fn corruption_signature_matches_known_failures() {
    let corrupt = [
        CatalogError::database("database disk image is malformed"),
        CatalogError::database("write failed").with_detail("SQLITE_CORRUPT (extended code 11)"),
        CatalogError::database("no such table: documents_fts"),
        CatalogError::database("fts5: checksum mismatch, index corrupt"),
        CatalogError::database("query failed").with_detail("fts5 internal error"),
    ];
    for err in &corrupt {
        assert!(is_index_corruption(err), "{err}");
    }
}

#[test]
fn corruption_signature_rejects_other_failures() {
    let benign = [
        CatalogError::database("disk I/O failure"),
        CatalogError::database("no such table: documents_tags"),
        CatalogError::database("database is locked"),
        // Right words, wrong class: only database failures escalate.
        CatalogError::other("database disk image is malformed"),
        CatalogError::conflict("fts5 corrupt"),
    ];
    for err in &benign {
        assert!(!is_index_corruption(err), "{err}");
    }
}

#[test]
fn repair_gate_runs_once_and_shares_success() {
    let catalog = MemoryCatalog::corrupted(true);
    let gate = RepairGate::new();
    assert!(!gate.attempted());

    assert!(gate.attempt(&catalog));
    assert!(gate.attempted());
    assert_eq!(catalog.repair_calls.load(Ordering::Relaxed), 1);

    // Later callers share the outcome without a second repair.
    assert!(gate.attempt(&catalog));
    assert_eq!(catalog.repair_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn repair_gate_runs_once_and_shares_failure() {
    let catalog = MemoryCatalog::corrupted(false);
    let gate = RepairGate::new();

    assert!(!gate.attempt(&catalog));
    assert!(!gate.attempt(&catalog));
    assert!(gate.attempted());
    assert_eq!(catalog.repair_calls.load(Ordering::Relaxed), 1);
}

#[test]
fn normalize_is_pure_for_equal_inputs() {
    let dir = TempDir::new("normalize-pure");
    let clock = common::FixedClock::at_epoch_secs(42);
    let opts = ImportOpts {
        pattern: Some("*.md".into()),
        max_parallelism: Some(3),
        ..ImportOpts::default()
    };
    let (a, wa) = options::normalize(&dir.path, &opts, &clock);
    let (b, wb) = options::normalize(&dir.path, &opts, &clock);
    assert_eq!(a.pattern, b.pattern);
    assert_eq!(a.max_parallelism, b.max_parallelism);
    assert_eq!(a.channel_cap, b.channel_cap);
    assert!(wa.is_empty() && wb.is_empty());
}
