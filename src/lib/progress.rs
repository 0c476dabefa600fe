//! Progress tracking for the streaming passes and the worker pool.
//!
//! The tracker keeps an atomic record count and logs when the count crosses
//! interval boundaries, so the driver thread and all workers can share one
//! tracker without coordination.

use std::sync::atomic::{AtomicU64, Ordering};

use log::info;

/// Thread-safe record counter that logs at interval boundaries.
pub struct ProgressTracker {
    /// Progress is logged when the count crosses multiples of this.
    interval: u64,
    /// Message prefix for log output.
    message: String,
    /// Records counted so far.
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with a default interval of 1,000,000 records.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 1_000_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` records and logs once per interval boundary
    /// crossed. Safe to call from multiple threads.
    pub fn add(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;
        for crossed in (prev / self.interval + 1)..=(new_count / self.interval) {
            info!("{} {}", self.message, crossed * self.interval);
        }
    }

    /// Logs the final count unless it landed exactly on an interval (in
    /// which case [`add`](Self::add) already reported it).
    pub fn log_final(&self) {
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 && count % self.interval != 0 {
            info!("{} {} (complete)", self.message, count);
        }
    }

    /// The current record count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
