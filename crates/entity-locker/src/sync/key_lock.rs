//! Owner-aware reentrant mutex backing a single entity key.
//!
//! The lock is an explicit state machine rather than a wrapped
//! `ReentrantMutex`, so the locker can ask precise ownership questions
//! ("is this request a reentrant one?") without holding a guard.
//!
//! ```text
//! Unlocked ──acquire(t)──▶ Locked(t, 1)
//! Locked(t, d) ──acquire(t)──▶ Locked(t, d + 1)
//! Locked(t, d) ──release(t)──▶ Locked(t, d - 1) | Unlocked when d = 1
//! ```

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Observable state of a [`ReentrantKeyLock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLockState {
    /// Nobody holds the lock.
    Unlocked,
    /// Held by `owner`, acquired `depth` times without release.
    Locked {
        /// Thread holding the lock
        owner: ThreadId,
        /// Hold depth, always >= 1
        depth: usize,
    },
}

impl KeyLockState {
    /// Takes the lock for `me` if it is free or already ours.
    fn try_enter(&mut self, me: ThreadId) -> bool {
        match self {
            Self::Unlocked => {
                *self = Self::Locked { owner: me, depth: 1 };
                true
            }
            Self::Locked { owner, depth } if *owner == me => {
                *depth += 1;
                true
            }
            Self::Locked { .. } => false,
        }
    }
}

/// Reentrant exclusive lock scoped to one entity key.
///
/// Acquisition by a thread other than the owner blocks until the owner has
/// released every level it acquired. Release must happen on the owning
/// thread; a release attempt by any other thread is refused.
pub struct ReentrantKeyLock {
    state: Mutex<KeyLockState>,
    released: Condvar,
}

impl ReentrantKeyLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(KeyLockState::Unlocked),
            released: Condvar::new(),
        }
    }

    /// Acquires the lock, blocking until it is available.
    pub fn lock(&self) {
        let acquired = self.acquire_until(None);
        debug_assert!(acquired, "unbounded acquisition cannot time out");
    }

    /// Acquires the lock, waiting no later than `deadline`.
    ///
    /// Returns `true` if the lock is now held by the calling thread.
    pub fn try_lock_until(&self, deadline: Instant) -> bool {
        self.acquire_until(Some(deadline))
    }

    /// `None` waits forever.
    pub(crate) fn acquire_until(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            if state.try_enter(me) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut state, deadline).timed_out() {
                        // Last chance: the release may have raced the timeout.
                        return state.try_enter(me);
                    }
                }
                None => self.released.wait(&mut state),
            }
        }
    }

    /// Releases one level held by the calling thread.
    ///
    /// Returns the remaining depth, or `None` if the calling thread does not
    /// hold the lock (nothing is changed in that case).
    pub fn unlock(&self) -> Option<usize> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match *state {
            KeyLockState::Locked { owner, depth } if owner == me => {
                if depth == 1 {
                    *state = KeyLockState::Unlocked;
                    drop(state);
                    self.released.notify_one();
                    Some(0)
                } else {
                    *state = KeyLockState::Locked {
                        owner,
                        depth: depth - 1,
                    };
                    Some(depth - 1)
                }
            }
            _ => None,
        }
    }

    /// Returns `true` if the calling thread holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.hold_count() > 0
    }

    /// Number of unreleased acquisitions by the calling thread.
    #[must_use]
    pub fn hold_count(&self) -> usize {
        let me = thread::current().id();
        match *self.state.lock() {
            KeyLockState::Locked { owner, depth } if owner == me => depth,
            _ => 0,
        }
    }

    /// Returns `true` if any thread holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        matches!(*self.state.lock(), KeyLockState::Locked { .. })
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> KeyLockState {
        *self.state.lock()
    }
}

impl Default for ReentrantKeyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReentrantKeyLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReentrantKeyLock")
            .field("state", &self.state())
            .finish()
    }
}
