//! Shared utilities for the stress suite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Barrier, Once};
use std::thread;

use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Runs `actors` closures in parallel, releasing them together, and returns
/// their results in actor order.
pub fn run_actors<T, F>(actors: usize, actor: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let start = Barrier::new(actors);
    thread::scope(|s| {
        let handles: Vec<_> = (0..actors)
            .map(|id| {
                let start = &start;
                let actor = &actor;
                s.spawn(move || {
                    start.wait();
                    actor(id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("actor panicked"))
            .collect()
    })
}

/// Increment split into a separate load and store, so that two unguarded
/// callers can lose an update or observe the same value.
pub fn racy_increment(cell: &AtomicU64) -> u64 {
    let next = cell.load(Ordering::Relaxed) + 1;
    thread::yield_now();
    cell.store(next, Ordering::Relaxed);
    next
}

/// Asserts that `observed` is exactly a permutation of `1..=n`.
pub fn assert_permutation(mut observed: Vec<u64>, n: u64) {
    observed.sort_unstable();
    let expected: Vec<u64> = (1..=n).collect();
    assert_eq!(observed, expected, "observed values must be a permutation of 1..={n}");
}
