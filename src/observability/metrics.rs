//! Execution counters
//!
//! Counters only, monotonic, relaxed atomics. Shared by every run on an
//! executor, including runs on other threads.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    runs_started: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,
    /// Records read from a source
    records_scanned: AtomicU64,
    /// Records that passed every condition
    records_qualifying: AtomicU64,
    /// Records excluded by an evaluation error
    records_excluded: AtomicU64,
    capacity_errors: AtomicU64,
    cancellations: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_completed(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_capacity_errors(&self) {
        self.capacity_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds one run's record counts
    pub fn add_records(&self, scanned: u64, qualifying: u64, excluded: u64) {
        self.records_scanned.fetch_add(scanned, Ordering::Relaxed);
        self.records_qualifying.fetch_add(qualifying, Ordering::Relaxed);
        self.records_excluded.fetch_add(excluded, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            records_scanned: self.records_scanned.load(Ordering::Relaxed),
            records_qualifying: self.records_qualifying.load(Ordering::Relaxed),
            records_excluded: self.records_excluded.load(Ordering::Relaxed),
            capacity_errors: self.capacity_errors.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub records_scanned: u64,
    pub records_qualifying: u64,
    pub records_excluded: u64,
    pub capacity_errors: u64,
    pub cancellations: u64,
}
