//! Queue occupancy monitor for the prepared-item channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::utils::config::QueueMonitorConsts;

/// Watches prepared-queue occupancy from the producer side. Logs once when
/// occupancy crosses the high-water mark and delays producers slightly when
/// the queue is nearly full so the submission tier can catch up. The channel
/// itself still blocks (never drops) when full.
#[derive(Debug)]
pub struct QueueMonitor {
    capacity: usize,
    high_water: usize,
    high_water_logged: AtomicBool,
    near_full_delay: Duration,
}

impl QueueMonitor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            high_water: capacity * QueueMonitorConsts::HIGH_WATER_PERCENT / 100,
            high_water_logged: AtomicBool::new(false),
            near_full_delay: Duration::from_millis(QueueMonitorConsts::NEAR_FULL_DELAY_MS),
        }
    }

    /// Call with the queue length observed just before enqueueing.
    pub fn before_send(&self, occupancy: usize) {
        if occupancy >= self.high_water && !self.high_water_logged.swap(true, Ordering::Relaxed) {
            log::debug!(
                "prepared queue at {occupancy}/{} (high-water mark); submission is behind",
                self.capacity
            );
        }
        if occupancy + 1 >= self.capacity {
            std::thread::sleep(self.near_full_delay);
        }
    }
}
