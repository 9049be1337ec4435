//! Keyed reentrant entity locker.
//!
//! # Protocol
//!
//! Every per-key request first takes the shared side of the global gate,
//! then decides under one short critical section which handle it must wait
//! on, then waits outside that critical section:
//!
//! ```text
//! lock(k):   gate.shared ─▶ [registry: choose handle] ─▶ handle.acquire
//! unlock(k): [registry: release held handle] ─▶ gate.release_shared
//! ```
//!
//! A thread whose outstanding per-key lock count exceeds the escalation
//! threshold is handed the gate's exclusive side for its next new key.
//! Threads converging on the same handle simply contend on it; the handle
//! itself provides mutual exclusion.
//!
//! # Deadlock avoidance
//!
//! Nothing is detected. Acquire multiple keys in one fixed order (sorted
//! keys work). Two threads escalating at the same time while each still
//! holds per-key locks wait on each other forever. The same happens when a
//! thread blocks on a key held by a thread that then escalates: the waiter
//! keeps its shared side of the gate and the escalation waits for it.

mod guard;
mod registry;

pub use guard::{EntityGuard, ExclusiveGuard};

use std::hash::Hash;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::LockerConfig;
use crate::error::Result;
use crate::metrics::{LockerCounters, LockerStats};
use crate::sync::GlobalGate;
use registry::{Assignment, Registry};

/// Reentrant exclusive locks over entities addressed by key `K`, plus a
/// global exclusive mode covering every key.
///
/// Every successful [`lock`](Self::lock) or [`try_lock`](Self::try_lock)
/// must be paired with exactly one [`unlock`](Self::unlock) on the same
/// thread. The guard-returning variants do the pairing on drop.
///
/// # Example
///
/// ```rust
/// use entity_locker::EntityLocker;
///
/// let locker = EntityLocker::new();
/// locker.lock(&"account-42");
/// // exclusive access to account 42
/// locker.unlock(&"account-42");
///
/// let _guard = locker.lock_guard("account-7");
/// ```
pub struct EntityLocker<K> {
    registry: Mutex<Registry<K>>,
    gate: GlobalGate,
    escalation_threshold: usize,
    counters: LockerCounters,
}

impl<K: Eq + Hash + Clone> EntityLocker<K> {
    /// Creates a locker that never escalates.
    #[must_use]
    pub fn new() -> Self {
        Self::build(LockerConfig::default().effective_threshold())
    }

    /// Creates a locker escalating once a thread holds more than
    /// `threshold` per-key locks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreshold`](crate::Error::InvalidThreshold)
    /// if `threshold < 2`.
    pub fn with_escalation_threshold(threshold: usize) -> Result<Self> {
        Self::from_config(&LockerConfig::with_escalation_threshold(threshold))
    }

    /// Creates a locker from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreshold`](crate::Error::InvalidThreshold)
    /// if the configured threshold is below the minimum.
    pub fn from_config(config: &LockerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config.effective_threshold()))
    }

    fn build(escalation_threshold: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            gate: GlobalGate::new(),
            escalation_threshold,
            counters: LockerCounters::default(),
        }
    }

    /// Acquires the lock on `key`, blocking until it is available.
    ///
    /// Reentrant: a thread already holding `key` returns immediately and
    /// owes one more [`unlock`](Self::unlock).
    pub fn lock(&self, key: &K) {
        self.gate.acquire_shared();
        let assignment = self.assign(key);
        let acquired = self.acquire(&assignment, None);
        debug_assert!(acquired, "unbounded acquisition cannot time out");
    }

    /// Acquires the lock on `key`, giving up after `timeout`.
    ///
    /// Returns `true` if the lock is now held. On `false` nothing is held
    /// and no [`unlock`](Self::unlock) is owed.
    pub fn try_lock(&self, key: &K, timeout: Duration) -> bool {
        // Overflowing deadlines wait forever.
        let deadline = Instant::now().checked_add(timeout);
        if !self.gate.acquire_shared_until(deadline) {
            self.counters.record_timeout();
            tracing::trace!(?timeout, "try_lock timed out waiting for global mode to end");
            return false;
        }

        let assignment = self.assign(key);
        if self.acquire(&assignment, deadline) {
            return true;
        }

        let me = thread::current().id();
        self.registry.lock().rollback(key, me, &assignment);
        self.gate.release_shared();
        self.counters.record_timeout();
        tracing::trace!(?timeout, "try_lock timed out waiting for key");
        false
    }

    /// Releases one level of the lock the calling thread holds on `key`.
    ///
    /// Does nothing if the calling thread holds nothing for `key`.
    pub fn unlock(&self, key: &K) {
        let me = thread::current().id();
        let released = self.registry.lock().release(key, me, &self.gate);
        if released {
            self.gate.release_shared();
        } else {
            self.counters.record_ignored_unlock();
        }
    }

    /// Acquires exclusive access to every key.
    ///
    /// Waits until all per-key work of other threads has been released,
    /// then blocks new per-key work from other threads until
    /// [`unlock_exclusive`](Self::unlock_exclusive).
    pub fn lock_exclusive(&self) {
        self.gate.acquire_exclusive();
        self.registry.lock().exclusive_depth += 1;
        self.counters.record_exclusive();
        tracing::debug!("global exclusive mode entered");
    }

    /// Releases exclusive access taken by [`lock_exclusive`](Self::lock_exclusive).
    ///
    /// Clears the lock registry and every thread's escalation count. Entries
    /// the calling thread still holds survive so their `unlock` stays valid.
    pub fn unlock_exclusive(&self) {
        let mut registry = self.registry.lock();
        if registry.exclusive_depth == 0 || !self.gate.is_exclusive_held_by_current_thread() {
            drop(registry);
            tracing::warn!("unlock_exclusive called without a matching lock_exclusive");
            return;
        }

        registry.exclusive_depth -= 1;
        let dropped_keys = registry.reset();
        let remaining = self.gate.release_exclusive();
        drop(registry);
        tracing::debug!(dropped_keys, ?remaining, "global exclusive mode released");
    }

    /// Like [`lock`](Self::lock), returning a guard that unlocks on drop.
    pub fn lock_guard(&self, key: K) -> EntityGuard<'_, K> {
        self.lock(&key);
        EntityGuard::new(self, key)
    }

    /// Like [`try_lock`](Self::try_lock), returning a guard that unlocks on
    /// drop.
    pub fn try_lock_guard(&self, key: K, timeout: Duration) -> Option<EntityGuard<'_, K>> {
        self.try_lock(&key, timeout)
            .then(|| EntityGuard::new(self, key))
    }

    /// Like [`lock_exclusive`](Self::lock_exclusive), returning a guard that
    /// calls [`unlock_exclusive`](Self::unlock_exclusive) on drop.
    pub fn exclusive_guard(&self) -> ExclusiveGuard<'_, K> {
        self.lock_exclusive();
        ExclusiveGuard::new(self)
    }

    /// Threshold above which a thread's next new key escalates.
    #[must_use]
    pub fn escalation_threshold(&self) -> usize {
        self.escalation_threshold
    }

    /// Number of per-key locks currently cached in the registry.
    #[must_use]
    pub fn registered_keys(&self) -> usize {
        self.registry.lock().registered_keys()
    }

    /// Per-key locks the calling thread holds (counted once per key).
    #[must_use]
    pub fn outstanding_locks(&self) -> usize {
        self.registry.lock().outstanding(thread::current().id())
    }

    /// Returns `true` if the calling thread holds `key`, per-key or through
    /// escalation.
    #[must_use]
    pub fn is_held_by_current_thread(&self, key: &K) -> bool {
        self.registry.lock().holds(key, thread::current().id())
    }

    /// Returns `true` while any thread is in global exclusive mode or
    /// escalated.
    #[must_use]
    pub fn is_exclusive_held(&self) -> bool {
        self.gate.is_exclusive_held()
    }

    /// Evicts cached per-key locks nobody holds or waits for.
    ///
    /// Ordinary unlocks keep their entry for reuse; call this when the key
    /// domain keeps growing. Returns the number of entries evicted.
    pub fn prune_idle(&self) -> usize {
        let evicted = self.registry.lock().prune_idle();
        tracing::debug!(evicted, "pruned idle entity locks");
        evicted
    }

    /// Snapshot of the locker counters.
    #[must_use]
    pub fn stats(&self) -> LockerStats {
        self.counters.snapshot()
    }

    fn assign(&self, key: &K) -> Assignment {
        let me = thread::current().id();
        let mut registry = self.registry.lock();
        let assignment = registry.assign(key, me, self.escalation_threshold);
        if matches!(assignment, Assignment::Escalate) {
            let outstanding = registry.outstanding(me);
            drop(registry);
            self.counters.record_escalation();
            tracing::debug!(
                outstanding,
                threshold = self.escalation_threshold,
                "lock escalated to global exclusive mode"
            );
        }
        assignment
    }

    fn acquire(&self, assignment: &Assignment, deadline: Option<Instant>) -> bool {
        match assignment {
            Assignment::ReenterKey(lock) | Assignment::Key(lock) => lock.acquire_until(deadline),
            Assignment::ReenterGlobal | Assignment::Escalate => {
                self.gate.acquire_exclusive_until(deadline)
            }
        }
    }
}

impl<K: Eq + Hash + Clone> Default for EntityLocker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for EntityLocker<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityLocker")
            .field("escalation_threshold", &self.escalation_threshold)
            .field("stats", &self.counters.snapshot())
            .finish_non_exhaustive()
    }
}

// Compile-time check: EntityLocker must be Send + Sync for shareable keys
#[allow(dead_code)]
const _: fn() = || {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<EntityLocker<u64>>();
    assert_send_sync::<EntityLocker<String>>();
};
