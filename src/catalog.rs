//! Narrow interfaces the engine consumes: catalog write/query/repair and a
//! clock for deterministic timestamps under test.

pub mod sqlite;

use std::io::Read;
use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

/// Marker the catalog puts into a conflict message when the racing write
/// turned out to be byte-identical content. The submission adapter
/// reclassifies such conflicts as skipped duplicates.
pub const IDENTICAL_CONTENT_MARKER: &str = "identical content";

/// Name of the full-text search index table. Part of the corruption
/// signature the repair escalation looks for.
pub const SEARCH_INDEX_TABLE: &str = "documents_fts";

/// Prepared item handed to the catalog writer: hash, size, path, and
/// normalized metadata. Content bytes travel separately as a reader.
#[derive(Clone, Debug)]
pub struct DocumentRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub content_hash: [u8; 32],
    pub content_length: u64,
    pub author: Option<String>,
    pub created: Option<SystemTime>,
    pub modified: Option<SystemTime>,
    pub read_only: bool,
}

/// Success response from a catalog write.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteReceipt {
    pub created: u32,
    pub updated: u32,
}

/// Coarse failure class reported by the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// A record with conflicting identity already exists.
    Conflict,
    /// The submitted record failed catalog-side validation.
    Validation,
    /// Stored content does not match the submitted hash.
    HashMismatch,
    /// Storage-engine failure. Candidate for repair escalation.
    Database,
    /// Anything else.
    Other,
}

/// A problem with one field of a submitted record.
#[derive(Clone, Debug)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

/// Structured failure from the catalog: class + message + optional technical
/// detail + optional per-field issues.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct CatalogError {
    pub kind: CatalogErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub field_issues: Vec<FieldIssue>,
}

impl CatalogError {
    pub fn new(kind: CatalogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            field_issues: Vec::new(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Database, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Conflict, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Other, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_field_issue(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.field_issues.push(FieldIssue {
            field: field.into(),
            message: message.into(),
        });
        self
    }
}

/// The downstream catalog, reduced to the three capabilities the engine needs.
/// Create-or-update semantics, consistency, and repair internals are the
/// implementation's business.
pub trait Catalog: Send + Sync {
    /// Does a record with this content hash already exist?
    fn contains_hash(&self, hash: &[u8; 32]) -> Result<bool, CatalogError>;

    /// Create or update the record for `doc`, storing `content` bytes.
    fn submit(&self, doc: &DocumentRecord, content: &mut dyn Read)
    -> Result<WriteReceipt, CatalogError>;

    /// Force-verify-and-repair the search index; returns the reindexed count.
    fn repair_search_index(&self, force: bool) -> Result<u64, CatalogError>;
}

/// Clock capability so every engine timestamp is injectable under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock [`Clock`] used outside tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
