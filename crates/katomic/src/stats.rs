//! Lock table acquisition counters (feature `stats`).
//!
//! Counters are bumped inside the critical section, after the slot is held,
//! with relaxed ordering: they are diagnostics, not synchronization.

use core::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct LockStats {
    acquisitions: AtomicUsize,
    contended: AtomicUsize,
}

impl LockStats {
    pub(crate) const fn new() -> Self {
        Self {
            acquisitions: AtomicUsize::new(0),
            contended: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn record(&self, contended: bool) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        if contended {
            self.contended.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&self) {
        self.acquisitions.store(0, Ordering::Relaxed);
        self.contended.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of a table's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Slots acquired since creation or the last reset.
    pub acquisitions: usize,
    /// Acquisitions that found the slot held by another context at least
    /// once before getting it. Spurious compare-and-swap failures are not
    /// counted.
    pub contended: usize,
}

impl StatsSnapshot {
    /// More than one acquisition in eight had to spin.
    pub fn is_hot(&self) -> bool {
        self.contended.saturating_mul(8) > self.acquisitions
    }
}
