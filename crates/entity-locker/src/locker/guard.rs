//! RAII guards releasing locker holds on drop.

use std::hash::Hash;
use std::marker::PhantomData;

use super::EntityLocker;

/// Holds one level of the lock on a key; unlocks it on drop.
///
/// Not `Send`: the release must run on the thread that acquired the lock.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct EntityGuard<'a, K: Eq + Hash + Clone> {
    locker: &'a EntityLocker<K>,
    key: K,
    _not_send: PhantomData<*const ()>,
}

impl<'a, K: Eq + Hash + Clone> EntityGuard<'a, K> {
    pub(super) fn new(locker: &'a EntityLocker<K>, key: K) -> Self {
        Self {
            locker,
            key,
            _not_send: PhantomData,
        }
    }

    /// Key this guard holds.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for EntityGuard<'_, K> {
    fn drop(&mut self) {
        self.locker.unlock(&self.key);
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> std::fmt::Debug for EntityGuard<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGuard").field("key", &self.key).finish()
    }
}

/// Holds one level of global exclusive mode; releases it on drop.
#[must_use = "exclusive mode ends as soon as the guard is dropped"]
pub struct ExclusiveGuard<'a, K: Eq + Hash + Clone> {
    locker: &'a EntityLocker<K>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, K: Eq + Hash + Clone> ExclusiveGuard<'a, K> {
    pub(super) fn new(locker: &'a EntityLocker<K>) -> Self {
        Self {
            locker,
            _not_send: PhantomData,
        }
    }
}

impl<K: Eq + Hash + Clone> Drop for ExclusiveGuard<'_, K> {
    fn drop(&mut self) {
        self.locker.unlock_exclusive();
    }
}

impl<K: Eq + Hash + Clone> std::fmt::Debug for ExclusiveGuard<'_, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveGuard").finish_non_exhaustive()
    }
}
