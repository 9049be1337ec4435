//! Two-level reader/writer gate coordinating per-key and global work.
//!
//! The shared side means "per-key work is in flight", the exclusive side
//! means "one thread owns the whole keyspace". Both sides track their
//! owners so that:
//!
//! - the exclusive side is granted once every outstanding shared hold
//!   belongs to the requesting thread (a thread escalating out of its own
//!   per-key work does not wait on itself),
//! - the exclusive owner may take the shared side,
//! - both sides are reentrant.
//!
//! A pending exclusive request holds back shared requests from threads that
//! do not hold the shared side yet, so the drain it waits for terminates.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::thread::{self, ThreadId};
use std::time::Instant;

#[derive(Debug, Default)]
struct GateState {
    /// Shared holds per thread; entries are removed at zero
    shared: FxHashMap<ThreadId, usize>,
    /// Sum over `shared`
    shared_total: usize,
    /// Exclusive owner and its hold depth
    exclusive: Option<(ThreadId, usize)>,
    /// Threads blocked in an exclusive acquisition
    exclusive_waiters: usize,
}

impl GateState {
    fn shared_held_by(&self, me: ThreadId) -> usize {
        self.shared.get(&me).copied().unwrap_or(0)
    }

    fn can_share(&self, me: ThreadId) -> bool {
        match self.exclusive {
            Some((owner, _)) => owner == me,
            None => self.exclusive_waiters == 0 || self.shared.contains_key(&me),
        }
    }

    fn can_exclude(&self, me: ThreadId) -> bool {
        match self.exclusive {
            Some((owner, _)) => owner == me,
            None => self.shared_total == self.shared_held_by(me),
        }
    }
}

/// Reentrant, owner-aware reader/writer gate.
#[derive(Debug, Default)]
pub struct GlobalGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl GlobalGate {
    /// Creates an idle gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes one shared hold, blocking while another thread is exclusive.
    pub fn acquire_shared(&self) {
        let acquired = self.acquire_shared_until(None);
        debug_assert!(acquired, "unbounded acquisition cannot time out");
    }

    /// Takes one shared hold, waiting no later than `deadline` (`None`
    /// waits forever). Returns `true` on success.
    pub fn acquire_shared_until(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        while !state.can_share(me) {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out()
                        && !state.can_share(me)
                    {
                        return false;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
        *state.shared.entry(me).or_insert(0) += 1;
        state.shared_total += 1;
        true
    }

    /// Releases one shared hold of the calling thread.
    ///
    /// Returns `false` if the calling thread holds none.
    pub fn release_shared(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let Some(count) = state.shared.get_mut(&me) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            state.shared.remove(&me);
        }
        state.shared_total -= 1;
        let wake = state.exclusive_waiters > 0;
        drop(state);
        if wake {
            self.changed.notify_all();
        }
        true
    }

    /// Takes one exclusive hold, blocking until every other thread has
    /// released the shared and exclusive sides.
    pub fn acquire_exclusive(&self) {
        let acquired = self.acquire_exclusive_until(None);
        debug_assert!(acquired, "unbounded acquisition cannot time out");
    }

    /// Takes one exclusive hold, waiting no later than `deadline` (`None`
    /// waits forever). Returns `true` on success.
    pub fn acquire_exclusive_until(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if !state.can_exclude(me) {
            state.exclusive_waiters += 1;
            while !state.can_exclude(me) {
                let timed_out = match deadline {
                    Some(deadline) => self.changed.wait_until(&mut state, deadline).timed_out(),
                    None => {
                        self.changed.wait(&mut state);
                        false
                    }
                };
                if timed_out && !state.can_exclude(me) {
                    state.exclusive_waiters -= 1;
                    let wake = state.exclusive_waiters == 0;
                    drop(state);
                    if wake {
                        // Shared requests held back by this waiter may proceed.
                        self.changed.notify_all();
                    }
                    return false;
                }
            }
            state.exclusive_waiters -= 1;
        }
        state.exclusive = match state.exclusive {
            Some((owner, depth)) => Some((owner, depth + 1)),
            None => Some((me, 1)),
        };
        true
    }

    /// Releases one exclusive hold of the calling thread.
    ///
    /// Returns the remaining depth, or `None` if the calling thread is not
    /// the exclusive owner.
    pub fn release_exclusive(&self) -> Option<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let remaining = match state.exclusive {
            Some((owner, depth)) if owner == me => depth - 1,
            _ => return None,
        };
        if remaining == 0 {
            state.exclusive = None;
            drop(state);
            self.changed.notify_all();
        } else {
            state.exclusive = Some((me, remaining));
        }
        Some(remaining)
    }

    /// Returns `true` if the calling thread owns the exclusive side.
    #[must_use]
    pub fn is_exclusive_held_by_current_thread(&self) -> bool {
        let me = thread::current().id();
        matches!(self.state.lock().exclusive, Some((owner, _)) if owner == me)
    }

    /// Returns `true` if any thread owns the exclusive side.
    #[must_use]
    pub fn is_exclusive_held(&self) -> bool {
        self.state.lock().exclusive.is_some()
    }

    /// Shared holds of the calling thread.
    #[must_use]
    pub fn shared_held_by_current_thread(&self) -> usize {
        self.state.lock().shared_held_by(thread::current().id())
    }

    /// Shared holds across all threads.
    #[must_use]
    pub fn shared_total(&self) -> usize {
        self.state.lock().shared_total
    }
}
