//! Two-tier bounded pipeline: enumeration feeds preparation workers, which
//! feed the single sequential submitter, all publishing to one event stream.

pub mod context;
pub mod enumerate;
pub mod monitor;
pub mod orchestrator;
pub mod prepare;

pub use context::{BatchContext, BatchCounters, CounterSnapshot, ReadPermit, ReadPermits};
pub use enumerate::{Enumeration, enumerate_folder};
pub use monitor::QueueMonitor;
pub use prepare::{PreparedOutcome, spawn_prepare_workers};
