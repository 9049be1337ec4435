//! Locker observability counters.
//!
//! Always-on atomic counters for escalations, global-mode acquisitions,
//! failed bounded waits and lenient unlocks. They are advisory only and use
//! relaxed ordering.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct LockerCounters {
    escalations: AtomicU64,
    exclusive_acquisitions: AtomicU64,
    try_lock_timeouts: AtomicU64,
    ignored_unlocks: AtomicU64,
}

impl LockerCounters {
    #[inline]
    pub(crate) fn record_escalation(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_exclusive(&self) {
        self.exclusive_acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_timeout(&self) {
        self.try_lock_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_ignored_unlock(&self) {
        self.ignored_unlocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockerStats {
        LockerStats {
            escalations: self.escalations.load(Ordering::Relaxed),
            exclusive_acquisitions: self.exclusive_acquisitions.load(Ordering::Relaxed),
            try_lock_timeouts: self.try_lock_timeouts.load(Ordering::Relaxed),
            ignored_unlocks: self.ignored_unlocks.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of locker counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockerStats {
    /// Lock requests answered with the global exclusive side because the
    /// requesting thread was over the escalation threshold.
    pub escalations: u64,
    /// Explicit `lock_exclusive` acquisitions.
    pub exclusive_acquisitions: u64,
    /// `try_lock` calls that gave up at their deadline.
    pub try_lock_timeouts: u64,
    /// `unlock` calls that found nothing held for the key.
    pub ignored_unlocks: u64,
}
