//! Per-file engine stages: content reading/hashing, catalog submission,
//! repair escalation, and batch status classification.

pub mod reader;
pub mod repair;
pub mod status;
pub mod submit;

pub use reader::{PrepareError, PreparedFile, backoff_delay, open_with_retry, prepare_file};
pub use repair::{RepairGate, is_index_corruption};
pub use status::{BatchTally, classify_batch};
pub use submit::Submitter;
