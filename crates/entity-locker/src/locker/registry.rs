//! Lock registry and per-thread escalation bookkeeping.
//!
//! Everything here runs under the locker's single internal mutex. The
//! registry decides which handle a request must block on; it never blocks
//! itself.

use std::hash::Hash;
use std::sync::Arc;
use std::thread::ThreadId;

use rustc_hash::FxHashMap;

use crate::sync::{GlobalGate, ReentrantKeyLock};

/// Handle chosen for one `lock`/`try_lock` request.
#[derive(Debug)]
pub(crate) enum Assignment {
    /// Caller already holds this per-key lock.
    ReenterKey(Arc<ReentrantKeyLock>),
    /// Caller already holds the key through the global exclusive side.
    ReenterGlobal,
    /// Per-key lock newly counted against the caller.
    Key(Arc<ReentrantKeyLock>),
    /// Caller is over the threshold; the key is served by the global
    /// exclusive side.
    Escalate,
}

/// Per-thread bookkeeping.
#[derive(Debug)]
struct ThreadBook<K> {
    /// Per-key locks assigned and not yet fully released
    outstanding: usize,
    /// Keys this thread holds through the global exclusive side, with depth
    escalated: FxHashMap<K, usize>,
}

impl<K> Default for ThreadBook<K> {
    fn default() -> Self {
        Self {
            outstanding: 0,
            escalated: FxHashMap::default(),
        }
    }
}

impl<K> ThreadBook<K> {
    fn is_idle(&self) -> bool {
        self.outstanding == 0 && self.escalated.is_empty()
    }
}

/// Key to per-key lock cache plus thread bookkeeping.
#[derive(Debug)]
pub(crate) struct Registry<K> {
    locks: FxHashMap<K, Arc<ReentrantKeyLock>>,
    threads: FxHashMap<ThreadId, ThreadBook<K>>,
    /// Exclusive levels taken through `lock_exclusive` by the current
    /// exclusive owner (escalated levels are tracked per key).
    pub(crate) exclusive_depth: usize,
}

impl<K: Eq + Hash + Clone> Registry<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: FxHashMap::default(),
            threads: FxHashMap::default(),
            exclusive_depth: 0,
        }
    }

    /// Chooses the handle `me` must acquire for `key` and records it.
    pub(crate) fn assign(&mut self, key: &K, me: ThreadId, threshold: usize) -> Assignment {
        let book = self.threads.entry(me).or_default();

        if let Some(depth) = book.escalated.get_mut(key) {
            *depth += 1;
            return Assignment::ReenterGlobal;
        }

        let current = self.locks.get(key);
        if let Some(lock) = current.filter(|lock| lock.is_held_by_current_thread()) {
            return Assignment::ReenterKey(Arc::clone(lock));
        }

        if book.outstanding > threshold {
            book.escalated.insert(key.clone(), 1);
            return Assignment::Escalate;
        }

        let lock = match current {
            Some(lock) => Arc::clone(lock),
            None => {
                let lock = Arc::new(ReentrantKeyLock::new());
                self.locks.insert(key.clone(), Arc::clone(&lock));
                lock
            }
        };
        book.outstanding += 1;
        Assignment::Key(lock)
    }

    /// Undoes the bookkeeping of an assignment whose wait failed.
    pub(crate) fn rollback(&mut self, key: &K, me: ThreadId, assignment: &Assignment) {
        match assignment {
            Assignment::Key(_) => self.finish_key(me),
            Assignment::ReenterGlobal | Assignment::Escalate => self.finish_global(key, me),
            Assignment::ReenterKey(_) => {}
        }
    }

    /// Releases one level of whatever `me` holds for `key`.
    ///
    /// Returns `false` if `me` holds nothing for `key`.
    pub(crate) fn release(&mut self, key: &K, me: ThreadId, gate: &GlobalGate) -> bool {
        let escalated = self
            .threads
            .get(&me)
            .is_some_and(|book| book.escalated.contains_key(key));
        if escalated {
            if gate.release_exclusive().is_none() {
                debug_assert!(false, "escalated key recorded without an exclusive hold");
                tracing::error!("escalated key recorded without an exclusive hold");
            }
            self.finish_global(key, me);
            return true;
        }

        let Some(remaining) = self.locks.get(key).and_then(|lock| lock.unlock()) else {
            return false;
        };
        if remaining == 0 {
            self.finish_key(me);
        }
        true
    }

    fn finish_key(&mut self, me: ThreadId) {
        if let Some(book) = self.threads.get_mut(&me) {
            book.outstanding = book.outstanding.saturating_sub(1);
            if book.is_idle() {
                self.threads.remove(&me);
            }
        }
    }

    fn finish_global(&mut self, key: &K, me: ThreadId) {
        if let Some(book) = self.threads.get_mut(&me) {
            if let Some(depth) = book.escalated.get_mut(key) {
                *depth -= 1;
                if *depth == 0 {
                    book.escalated.remove(key);
                }
            }
            if book.is_idle() {
                self.threads.remove(&me);
            }
        }
    }

    /// Drops every entry not currently held. Returns the number of per-key
    /// locks dropped.
    pub(crate) fn reset(&mut self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| lock.is_locked());
        self.threads.retain(|_, book| !book.is_idle());
        before - self.locks.len()
    }

    /// Drops per-key locks that are unlocked and referenced by no request
    /// in flight. Returns the number dropped.
    pub(crate) fn prune_idle(&mut self) -> usize {
        let before = self.locks.len();
        self.locks
            .retain(|_, lock| Arc::strong_count(lock) > 1 || lock.is_locked());
        before - self.locks.len()
    }

    pub(crate) fn registered_keys(&self) -> usize {
        self.locks.len()
    }

    pub(crate) fn outstanding(&self, me: ThreadId) -> usize {
        self.threads.get(&me).map_or(0, |book| book.outstanding)
    }

    pub(crate) fn holds(&self, key: &K, me: ThreadId) -> bool {
        self.threads
            .get(&me)
            .is_some_and(|book| book.escalated.contains_key(key))
            || self
                .locks
                .get(key)
                .is_some_and(|lock| lock.is_held_by_current_thread())
    }
}
