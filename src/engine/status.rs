//! Batch Outcome Aggregator: the terminal status state machine.

use crate::types::ImportStatus;

/// Final batch counters fed to [`classify_batch`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchTally {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Classify a finished batch. Pure function; rules apply in order,
/// first match wins.
///
/// 1. A fatal error was recorded -> `FatalError`.
/// 2. The batch was canceled -> `PartialSuccess`.
/// 3. Nothing to do and nothing went wrong -> `Success`.
/// 4. Some files never reached a terminal state -> `PartialSuccess`.
/// 5. No failures -> `Success`, unless enumeration diagnostics exist
///    alongside other errors -> `PartialSuccess`.
/// 6. Everything that terminated failed -> `Failure`.
/// 7. Anything else -> `PartialSuccess`.
pub fn classify_batch(
    tally: &BatchTally,
    fatal_encountered: bool,
    cancellation_encountered: bool,
    enumeration_diagnostics: bool,
    other_errors: bool,
) -> ImportStatus {
    if fatal_encountered {
        return ImportStatus::FatalError;
    }
    if cancellation_encountered {
        return ImportStatus::PartialSuccess;
    }
    if tally.total == 0 && !enumeration_diagnostics && !other_errors {
        return ImportStatus::Success;
    }
    if tally.succeeded + tally.failed + tally.skipped < tally.total {
        return ImportStatus::PartialSuccess;
    }
    if tally.failed == 0 {
        if enumeration_diagnostics && other_errors {
            return ImportStatus::PartialSuccess;
        }
        return ImportStatus::Success;
    }
    if tally.succeeded == 0 && tally.skipped == 0 {
        return ImportStatus::Failure;
    }
    ImportStatus::PartialSuccess
}
