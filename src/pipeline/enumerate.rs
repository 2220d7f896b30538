//! File Enumerator: iterative explicit-stack traversal collecting candidate
//! files plus non-fatal diagnostics.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::Clock;
use crate::errors::{ErrorCode, ImportError};
use crate::types::Options;
use crate::utils::pattern::glob_match;

/// Outcome of walking the import root: every candidate file plus the
/// directory-level problems that did not abort the walk.
#[derive(Debug, Default)]
pub struct Enumeration {
    /// Sorted candidate paths.
    pub candidates: Vec<PathBuf>,
    /// Non-fatal per-directory diagnostics (subtrees skipped).
    pub diagnostics: Vec<ImportError>,
}

/// Key for the visited-directory set. Case-insensitive on Windows,
/// case-sensitive elsewhere.
fn visit_key(path: &Path) -> String {
    let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let key = canon.to_string_lossy().into_owned();
    #[cfg(windows)]
    let key = key.to_lowercase();
    key
}

/// Walk `root` collecting files matching the normalized pattern.
///
/// Never recurses: directories wait on an explicit stack. Reparse points
/// (symlinks) and already-visited directories are skipped. A listing failure
/// below the root records a diagnostic and skips that subtree; at the root it
/// is fatal and returned as `Err`.
pub fn enumerate_folder(
    root: &Path,
    options: &Options,
    clock: &dyn Clock,
    cancel: &AtomicBool,
) -> Result<Enumeration, ImportError> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(ImportError::new(
                root,
                ErrorCode::FolderNotFound,
                "import path is not a folder",
                clock.now(),
            )
            .with_suggestion("point the import at a folder, not a file"));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ImportError::new(
                root,
                ErrorCode::FolderNotFound,
                "import folder does not exist",
                clock.now(),
            )
            .with_suggestion("check the folder path and that the drive is connected")
            .with_detail(e.to_string()));
        }
        Err(e) => {
            return Err(ImportError::new(
                root,
                ErrorCode::EnumerationFailed,
                format!("cannot read import folder: {e}"),
                clock.now(),
            )
            .with_detail(e.to_string()));
        }
    }

    let mut result = Enumeration::default();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(visit_key(root));
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => {
                return Err(ImportError::new(
                    root,
                    ErrorCode::EnumerationFailed,
                    format!("cannot list import folder: {e}"),
                    clock.now(),
                )
                .with_detail(e.to_string()));
            }
            Err(e) => {
                log::warn!("skipping {}: {e}", dir.display());
                result.diagnostics.push(
                    ImportError::new(
                        &dir,
                        ErrorCode::DirectoryEnumerationFailed,
                        format!("cannot list folder, subtree skipped: {e}"),
                        clock.now(),
                    )
                    .with_detail(e.to_string()),
                );
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.diagnostics.push(
                        ImportError::new(
                            &dir,
                            ErrorCode::DirectoryEnumerationFailed,
                            format!("unreadable directory entry: {e}"),
                            clock.now(),
                        )
                        .with_detail(e.to_string()),
                    );
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(e) => {
                    result.diagnostics.push(
                        ImportError::new(
                            entry.path(),
                            ErrorCode::DirectoryEnumerationFailed,
                            format!("cannot read entry type: {e}"),
                            clock.now(),
                        )
                        .with_detail(e.to_string()),
                    );
                    continue;
                }
            };
            // Reparse points are never followed, for files or directories.
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_file() {
                let name = entry.file_name();
                if glob_match(&options.pattern, &name.to_string_lossy()) {
                    result.candidates.push(entry.path());
                }
            } else if file_type.is_dir() && options.recursive {
                let path = entry.path();
                if visited.insert(visit_key(&path)) {
                    stack.push(path);
                }
            }
        }
    }

    result.candidates.sort();
    log::debug!(
        "enumerated {} candidates under {} ({} diagnostics)",
        result.candidates.len(),
        root.display(),
        result.diagnostics.len()
    );
    Ok(result)
}
