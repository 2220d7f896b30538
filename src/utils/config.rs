//! Application configuration constants.
//! Tuning and thresholds in one place.

// ---- Inter-stage channels ----

/// Bounds for the path and prepared channels joining the pipeline tiers.
/// Capacity scales with preparation parallelism but is clamped so a huge
/// parallelism setting cannot grow memory unboundedly.
pub struct ChannelCaps;

impl ChannelCaps {
    /// Channel slots per preparation worker.
    pub const PER_WORKER: usize = 4;
    /// Minimum channel capacity.
    pub const MIN: usize = 8;
    /// Maximum channel capacity regardless of parallelism.
    pub const MAX: usize = 256;
    /// Capacity of the progress event channel drained by the caller.
    pub const EVENTS: usize = 1024;
}

// ---- Queue monitor ----

/// Occupancy thresholds for the prepared-item queue monitor.
pub struct QueueMonitorConsts;

impl QueueMonitorConsts {
    /// High-water mark as a percentage of capacity; crossing it is logged once.
    pub const HIGH_WATER_PERCENT: usize = 80;
    /// Producer-side delay in milliseconds when the queue is nearly full,
    /// giving the submission tier room to catch up.
    pub const NEAR_FULL_DELAY_MS: u64 = 5;
}

// ---- Option floors ----

/// Lower bounds applied during option normalization.
pub struct OptionFloors;

impl OptionFloors {
    /// Read buffer never shrinks below this (bytes). 4 KB.
    pub const READ_BUFFER: usize = 4 * 1024;
    /// Submission batch never shrinks below this.
    pub const BATCH: usize = 1;
}
