//! SQLite-backed document catalog with an FTS5 search index.
//!
//! This is the catalog the CLI imports into. The engine only ever sees it
//! through the [`Catalog`] trait; the corruption signatures the repair
//! escalation matches (`SQLITE_CORRUPT`, "database disk image is malformed",
//! missing `documents_fts`) originate here.

use std::io::Read;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::{
    Catalog, CatalogError, CatalogErrorKind, DocumentRecord, IDENTICAL_CONTENT_MARKER,
    SEARCH_INDEX_TABLE, WriteReceipt,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    hash BLOB NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    author TEXT,
    created_ns INTEGER,
    modified_ns INTEGER,
    read_only INTEGER NOT NULL DEFAULT 0,
    content BLOB
);
CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(path);
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(file_name, author, path);
"#;

/// Document catalog stored in a single SQLite file. One connection guarded by
/// a mutex; the engine serializes writes anyway.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

/// Enable WAL and apply schema to an open connection (idempotent).
fn apply_wal_and_schema(conn: &Connection) -> Result<()> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(
        r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        "#,
    )
    .context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(())
}

impl SqliteCatalog {
    /// Open or create the catalog DB and ensure schema + WAL.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("open catalog database")?;
        apply_wal_and_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory catalog with the same schema (tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory catalog")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of cataloged documents.
    pub fn document_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .context("count documents")?;
        Ok(n.max(0) as u64)
    }
}

fn system_time_to_ns(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Map a rusqlite failure to a structured catalog error, preserving the
/// driver message and surfacing the corruption code when present.
fn db_error(context: &str, e: rusqlite::Error) -> CatalogError {
    let detail = match &e {
        rusqlite::Error::SqliteFailure(f, _) => {
            if f.code == rusqlite::ErrorCode::DatabaseCorrupt {
                Some(format!("SQLITE_CORRUPT (extended code {})", f.extended_code))
            } else {
                Some(format!("{:?} (extended code {})", f.code, f.extended_code))
            }
        }
        _ => None,
    };
    let mut err = CatalogError::database(format!("{context}: {e}"));
    if let Some(d) = detail {
        err = err.with_detail(d);
    }
    err
}

fn is_hash_constraint(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, Some(msg)) => {
            f.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("documents.hash")
        }
        _ => false,
    }
}

impl Catalog for SqliteCatalog {
    fn contains_hash(&self, hash: &[u8; 32]) -> Result<bool, CatalogError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE hash = ?1)",
            [hash.as_slice()],
            |row| row.get::<_, bool>(0),
        )
        .map_err(|e| db_error("query content hash", e))
    }

    fn submit(
        &self,
        doc: &DocumentRecord,
        content: &mut dyn Read,
    ) -> Result<WriteReceipt, CatalogError> {
        let mut bytes = Vec::with_capacity(doc.content_length.min(1 << 20) as usize);
        content
            .read_to_end(&mut bytes)
            .map_err(|e| CatalogError::other(format!("read submitted content: {e}")))?;
        if *blake3::hash(&bytes).as_bytes() != doc.content_hash {
            return Err(CatalogError::new(
                CatalogErrorKind::HashMismatch,
                "submitted content does not match its declared hash",
            )
            .with_field_issue("content_hash", "hash recomputed over received bytes differs"));
        }

        let conn = self.conn.lock().unwrap();
        let path_str = doc.path.to_string_lossy();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM documents WHERE path = ?1",
                [path_str.as_ref()],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(db_error("query document by path", other)),
            })?;

        let created_ns = doc.created.map(system_time_to_ns);
        let modified_ns = doc.modified.map(system_time_to_ns);

        let receipt = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE documents SET file_name = ?1, hash = ?2, size = ?3, author = ?4, \
                     created_ns = ?5, modified_ns = ?6, read_only = ?7, content = ?8 WHERE id = ?9",
                    rusqlite::params![
                        doc.file_name,
                        doc.content_hash.as_slice(),
                        doc.content_length as i64,
                        doc.author,
                        created_ns,
                        modified_ns,
                        doc.read_only,
                        bytes,
                        id,
                    ],
                )
                .map_err(|e| {
                    if is_hash_constraint(&e) {
                        CatalogError::conflict(format!(
                            "{IDENTICAL_CONTENT_MARKER} already cataloged under another path"
                        ))
                    } else {
                        db_error("update document", e)
                    }
                })?;
                conn.execute(
                    &format!("DELETE FROM {SEARCH_INDEX_TABLE} WHERE rowid = ?1"),
                    [id],
                )
                .map_err(|e| db_error("remove stale search index entry", e))?;
                conn.execute(
                    &format!(
                        "INSERT INTO {SEARCH_INDEX_TABLE} (rowid, file_name, author, path) \
                         VALUES (?1, ?2, ?3, ?4)"
                    ),
                    rusqlite::params![id, doc.file_name, doc.author, path_str.as_ref()],
                )
                .map_err(|e| db_error("index updated document", e))?;
                WriteReceipt {
                    created: 0,
                    updated: 1,
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO documents \
                     (path, file_name, hash, size, author, created_ns, modified_ns, read_only, content) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        path_str.as_ref(),
                        doc.file_name,
                        doc.content_hash.as_slice(),
                        doc.content_length as i64,
                        doc.author,
                        created_ns,
                        modified_ns,
                        doc.read_only,
                        bytes,
                    ],
                )
                .map_err(|e| {
                    if is_hash_constraint(&e) {
                        CatalogError::conflict(format!(
                            "{IDENTICAL_CONTENT_MARKER} already cataloged"
                        ))
                    } else {
                        db_error("insert document", e)
                    }
                })?;
                let id = conn.last_insert_rowid();
                conn.execute(
                    &format!(
                        "INSERT INTO {SEARCH_INDEX_TABLE} (rowid, file_name, author, path) \
                         VALUES (?1, ?2, ?3, ?4)"
                    ),
                    rusqlite::params![id, doc.file_name, doc.author, path_str.as_ref()],
                )
                .map_err(|e| db_error("index new document", e))?;
                WriteReceipt {
                    created: 1,
                    updated: 0,
                }
            }
        };
        Ok(receipt)
    }

    fn repair_search_index(&self, force: bool) -> Result<u64, CatalogError> {
        let conn = self.conn.lock().unwrap();
        if !force {
            // Verify-only: FTS5 integrity-check command errors on corruption.
            return match conn.execute_batch(&format!(
                "INSERT INTO {SEARCH_INDEX_TABLE}({SEARCH_INDEX_TABLE}) VALUES('integrity-check')"
            )) {
                Ok(()) => Ok(0),
                Err(e) => Err(db_error("search index integrity check", e)),
            };
        }
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {SEARCH_INDEX_TABLE};\
             CREATE VIRTUAL TABLE {SEARCH_INDEX_TABLE} USING fts5(file_name, author, path);"
        ))
        .map_err(|e| db_error("recreate search index", e))?;
        let reindexed = conn
            .execute(
                &format!(
                    "INSERT INTO {SEARCH_INDEX_TABLE} (rowid, file_name, author, path) \
                     SELECT id, file_name, author, path FROM documents"
                ),
                [],
            )
            .map_err(|e| db_error("rebuild search index", e))?;
        log::debug!("search index rebuilt: {reindexed} documents reindexed");
        Ok(reindexed as u64)
    }
}
