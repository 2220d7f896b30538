//! Corruption-Triggered Repair Escalation: recognize search-index corruption
//! in catalog failures and run at most one repair per batch.

use std::sync::Mutex;

use crate::catalog::{Catalog, CatalogError, CatalogErrorKind, SEARCH_INDEX_TABLE};

/// Substrings that mark a database failure as search-index corruption.
const MALFORMED_MARKER: &str = "malformed";
const CORRUPT_CODE_MARKER: &str = "sqlite_corrupt";
const NO_SUCH_TABLE_MARKER: &str = "no such table";
const FTS_MARKER: &str = "fts5";

/// Does this failure look like the known class of search-index corruption?
///
/// The error must be in the database class, and its message or detail must
/// carry one of: the malformed-image indicator, the storage engine's
/// corruption code, "no such table" naming the search-index table, or an FTS
/// error/corrupt marker.
pub fn is_index_corruption(err: &CatalogError) -> bool {
    if err.kind != CatalogErrorKind::Database {
        return false;
    }
    let mut text = err.message.to_lowercase();
    if let Some(detail) = &err.detail {
        text.push('\n');
        text.push_str(&detail.to_lowercase());
    }
    text.contains(MALFORMED_MARKER)
        || text.contains(CORRUPT_CODE_MARKER)
        || (text.contains(NO_SUCH_TABLE_MARKER) && text.contains(SEARCH_INDEX_TABLE))
        || (text.contains(FTS_MARKER) && (text.contains("corrupt") || text.contains("error")))
}

#[derive(Debug, Default)]
struct RepairState {
    attempted: bool,
    succeeded: bool,
}

/// One-shot repair gate shared by all workers of a batch. The first caller
/// runs the repair; everyone else shares its outcome. Strictly single-shot,
/// not a retry policy.
#[derive(Debug, Default)]
pub struct RepairGate {
    state: Mutex<RepairState>,
}

impl RepairGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the forced repair if nobody has yet; return whether the (single)
    /// repair attempt succeeded. Holding the lock across the repair call keeps
    /// concurrent failures from racing a second attempt.
    pub fn attempt(&self, catalog: &dyn Catalog) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.attempted {
            return state.succeeded;
        }
        state.attempted = true;
        log::warn!("search index corruption detected; attempting one-shot repair");
        match catalog.repair_search_index(true) {
            Ok(reindexed) => {
                log::warn!("search index repaired; {reindexed} documents reindexed");
                state.succeeded = true;
            }
            Err(e) => {
                log::error!("search index repair failed: {e}");
            }
        }
        state.succeeded
    }

    /// Whether a repair has been attempted (regardless of outcome).
    pub fn attempted(&self) -> bool {
        self.state.lock().unwrap().attempted
    }
}
