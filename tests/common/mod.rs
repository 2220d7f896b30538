//! Shared test fixtures: temp folders, a fixed clock, and an in-memory
//! catalog fake with injectable failure modes.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shelver::catalog::{
    Catalog, CatalogError, Clock, DocumentRecord, IDENTICAL_CONTENT_MARKER, WriteReceipt,
};

/// Unique scratch folder under the system temp dir, removed on drop.
pub struct TempDir {
    pub path: PathBuf,
}

impl TempDir {
    pub fn new(tag: &str) -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let n = SEQ.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "shelver-test-{tag}-{}-{n}",
            std::process::id()
        ));
        fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    /// Write `bytes` at `rel` (creating parent folders) and return the path.
    pub fn write(&self, rel: &str, bytes: &[u8]) -> PathBuf {
        let p = self.path.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, bytes).unwrap();
        p
    }

    pub fn missing_child(&self, rel: &str) -> PathBuf {
        self.path.join(rel)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Deterministic clock for normalization and event-timestamp tests.
pub struct FixedClock(pub SystemTime);

impl FixedClock {
    pub fn at_epoch_secs(secs: u64) -> Self {
        Self(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

/// In-memory [`Catalog`] fake keyed by content hash. Failure modes are
/// flipped per test; call counters allow asserting what the engine invoked.
#[derive(Default)]
pub struct MemoryCatalog {
    pub docs: Mutex<HashMap<[u8; 32], DocumentRecord>>,
    pub submit_calls: AtomicUsize,
    pub repair_calls: AtomicUsize,
    /// Every submit fails with this error while set.
    pub fail_all: Mutex<Option<CatalogError>>,
    /// Submits fail with a corruption-marked database error while set.
    pub corrupt: AtomicBool,
    /// When false, repair attempts fail and `corrupt` stays set.
    pub repair_ok: AtomicBool,
    /// Every submit returns an identical-content conflict while set.
    pub conflict_identical: AtomicBool,
    /// Per-submit delay in milliseconds, so a test can act while the batch
    /// is still in flight.
    pub submit_delay_ms: AtomicU64,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        let cat = Self::default();
        cat.repair_ok.store(true, Ordering::Relaxed);
        cat
    }

    pub fn corrupted(repair_ok: bool) -> Self {
        let cat = Self::new();
        cat.corrupt.store(true, Ordering::Relaxed);
        cat.repair_ok.store(repair_ok, Ordering::Relaxed);
        cat
    }
}

impl Catalog for MemoryCatalog {
    fn contains_hash(&self, hash: &[u8; 32]) -> Result<bool, CatalogError> {
        Ok(self.docs.lock().unwrap().contains_key(hash))
    }

    fn submit(
        &self,
        doc: &DocumentRecord,
        content: &mut dyn Read,
    ) -> Result<WriteReceipt, CatalogError> {
        self.submit_calls.fetch_add(1, Ordering::Relaxed);
        let delay = self.submit_delay_ms.load(Ordering::Relaxed);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .map_err(|e| CatalogError::other(e.to_string()))?;
        assert_eq!(bytes.len() as u64, doc.content_length);

        if self.corrupt.load(Ordering::Relaxed) {
            return Err(
                CatalogError::database("write failed: database disk image is malformed")
                    .with_detail("SQLITE_CORRUPT (extended code 11)"),
            );
        }
        if let Some(err) = self.fail_all.lock().unwrap().clone() {
            return Err(err);
        }
        if self.conflict_identical.load(Ordering::Relaxed) {
            return Err(CatalogError::conflict(format!(
                "{IDENTICAL_CONTENT_MARKER} already cataloged"
            )));
        }
        self.docs
            .lock()
            .unwrap()
            .insert(doc.content_hash, doc.clone());
        Ok(WriteReceipt {
            created: 1,
            updated: 0,
        })
    }

    fn repair_search_index(&self, force: bool) -> Result<u64, CatalogError> {
        assert!(force, "engine escalation must force the repair");
        self.repair_calls.fetch_add(1, Ordering::Relaxed);
        if self.repair_ok.load(Ordering::Relaxed) {
            self.corrupt.store(false, Ordering::Relaxed);
            Ok(self.docs.lock().unwrap().len() as u64)
        } else {
            Err(CatalogError::database("repair failed: disk unwritable"))
        }
    }
}

/// Default-normalized options for unit tests that need an [`shelver::Options`].
pub fn normalized_options(root: &Path) -> shelver::Options {
    let clock = FixedClock::at_epoch_secs(1_700_000_000);
    shelver::options::normalize(root, &shelver::ImportOpts::default(), &clock).0
}
