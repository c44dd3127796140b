//! Pool statistics
//!
//! Counters shared by every pool so callers and tests can check that all
//! borrows were returned.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for a single pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Values created because the pool was empty
    pub total_created: AtomicUsize,
    /// Values handed out
    pub total_acquired: AtomicUsize,
    /// Values put back and kept idle
    pub total_returned: AtomicUsize,
    /// Values put back but dropped (pool full or value oversized)
    pub total_discarded: AtomicUsize,
}

impl PoolStats {
    /// Create new pool stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value creation
    pub fn record_created(&self) {
        self.total_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value acquisition
    pub fn record_acquired(&self) {
        self.total_acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value kept for reuse
    pub fn record_returned(&self) {
        self.total_returned.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value dropped on return
    pub fn record_discarded(&self) {
        self.total_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current stats snapshot
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            total_created: self.total_created.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub total_created: usize,
    pub total_acquired: usize,
    pub total_returned: usize,
    pub total_discarded: usize,
}

impl PoolStatsSnapshot {
    /// Values currently borrowed and not yet given back
    pub fn in_use(&self) -> usize {
        self.total_acquired
            .saturating_sub(self.total_returned + self.total_discarded)
    }
}
