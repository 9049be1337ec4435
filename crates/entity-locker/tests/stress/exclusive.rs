//! Global exclusive mode against concurrent per-key work.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use entity_locker::EntityLocker;

use crate::helpers::{init_tracing, run_actors};

#[test]
fn lock_exclusive_waits_for_in_flight_work() {
    init_tracing();
    let locker = EntityLocker::new();
    let released = AtomicBool::new(false);
    let (locked_tx, locked_rx) = mpsc::channel();

    thread::scope(|s| {
        s.spawn(|| {
            locker.lock(&"busy");
            locked_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(30));
            released.store(true, Ordering::SeqCst);
            locker.unlock(&"busy");
        });

        locked_rx.recv().unwrap();
        locker.lock_exclusive();
        assert!(
            released.load(Ordering::SeqCst),
            "exclusive mode granted while per-key work was in flight"
        );
        locker.unlock_exclusive();
    });
}

#[test]
fn global_sections_never_overlap_per_key_sections() {
    init_tracing();
    let locker = EntityLocker::new();
    let in_global = AtomicBool::new(false);
    let in_per_key = AtomicU64::new(0);

    run_actors(6, |id| {
        if id < 2 {
            for _ in 0..50 {
                let _guard = locker.exclusive_guard();
                in_global.store(true, Ordering::SeqCst);
                assert_eq!(in_per_key.load(Ordering::SeqCst), 0);
                thread::yield_now();
                in_global.store(false, Ordering::SeqCst);
            }
        } else {
            for round in 0..200_u32 {
                let _guard = locker.lock_guard(round % 16);
                in_per_key.fetch_add(1, Ordering::SeqCst);
                assert!(!in_global.load(Ordering::SeqCst));
                in_per_key.fetch_sub(1, Ordering::SeqCst);
            }
        }
    });

    assert_eq!(locker.stats().exclusive_acquisitions, 100);
}

#[test]
fn unlock_exclusive_resets_every_key() {
    init_tracing();
    let locker = EntityLocker::with_escalation_threshold(4).unwrap();

    run_actors(4, |id| {
        for key in 0..8_u32 {
            let key = key + u32::try_from(id).unwrap() * 100;
            locker.lock(&key);
            locker.unlock(&key);
        }
    });
    assert_eq!(locker.registered_keys(), 32);

    locker.lock_exclusive();
    locker.unlock_exclusive();

    assert_eq!(locker.registered_keys(), 0);
    assert_eq!(locker.outstanding_locks(), 0);

    // Keys behave as never locked: fresh locks are created on demand.
    locker.lock(&0);
    assert_eq!(locker.registered_keys(), 1);
    assert_eq!(locker.outstanding_locks(), 1);
    locker.unlock(&0);
}

#[test]
fn blocked_try_lock_gives_up_during_global_mode() {
    init_tracing();
    let locker = EntityLocker::new();
    let _guard = locker.exclusive_guard();

    let results = thread::scope(|s| {
        s.spawn(|| {
            (0..4_u32)
                .map(|key| locker.try_lock(&key, Duration::from_millis(5)))
                .collect::<Vec<_>>()
        })
        .join()
        .unwrap()
    });

    assert!(results.iter().all(|acquired| !acquired));
    assert_eq!(locker.stats().try_lock_timeouts, 4);
}
