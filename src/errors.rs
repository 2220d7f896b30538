//! Structured per-file and batch-level import errors.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

/// Stable machine-readable classification of an import error. Serialized in
/// snake_case; part of the JSON output contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    FolderNotFound,
    InvalidSearchPattern,
    EnumerationFailed,
    DirectoryEnumerationFailed,
    FileTooLarge,
    ContentHashMismatch,
    /// Reserved for the serialized error contract. The engine reports skips
    /// through `FileCompleted { skipped: true }` events, never as errors.
    ImportSkipped,
    Canceled,
    DatabaseError,
    UnexpectedError,
}

/// One recorded import problem: where, what, and when, plus an optional
/// user-facing suggestion and technical detail.
#[derive(Clone, Debug, Serialize)]
pub struct ImportError {
    /// File or folder the error applies to; the import root for batch-level
    /// errors.
    pub path: PathBuf,
    pub code: ErrorCode,
    pub message: String,
    /// Actionable hint shown to the user, when one exists.
    pub suggestion: Option<String>,
    /// Technical detail (driver codes, OS error text) kept out of the
    /// user-facing message.
    pub detail: Option<String>,
    pub time: SystemTime,
}

impl ImportError {
    pub fn new(
        path: impl Into<PathBuf>,
        code: ErrorCode,
        message: impl Into<String>,
        time: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
            suggestion: None,
            detail: None,
            time,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.as_os_str().is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path.display(), self.message)
        }
    }
}
