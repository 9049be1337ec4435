//! Escalated threads exclude all per-key work of other threads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use entity_locker::EntityLocker;

use crate::helpers::{init_tracing, racy_increment, run_actors};

/// Keys only the escalating actor touches.
const PRIVATE_KEYS: [u32; 4] = [1000, 1001, 1002, 1003];

#[test]
fn escalated_section_never_overlaps_per_key_work() {
    init_tracing();
    let locker = EntityLocker::with_escalation_threshold(2).unwrap();
    let in_global = AtomicBool::new(false);
    let in_per_key = AtomicU64::new(0);
    let counter = AtomicU64::new(0);
    let rounds = 50;

    run_actors(5, |id| {
        if id == 0 {
            for _ in 0..rounds {
                // Sorted acquisition; the last key crosses the threshold.
                for key in &PRIVATE_KEYS {
                    locker.lock(key);
                }
                in_global.store(true, Ordering::SeqCst);
                assert_eq!(
                    in_per_key.load(Ordering::SeqCst),
                    0,
                    "per-key work still in flight after escalation"
                );
                thread::sleep(Duration::from_micros(100));
                in_global.store(false, Ordering::SeqCst);
                for key in PRIVATE_KEYS.iter().rev() {
                    locker.unlock(key);
                }
            }
        } else {
            for _ in 0..200 {
                let key = u32::try_from(id).unwrap();
                locker.lock(&key);
                in_per_key.fetch_add(1, Ordering::SeqCst);
                assert!(
                    !in_global.load(Ordering::SeqCst),
                    "per-key section overlapped an escalated one"
                );
                racy_increment(&counter);
                in_per_key.fetch_sub(1, Ordering::SeqCst);
                locker.unlock(&key);
            }
        }
    });

    assert_eq!(locker.stats().escalations, rounds);
    assert_eq!(counter.load(Ordering::SeqCst), 4 * 200);
    assert!(!locker.is_exclusive_held());
}

#[test]
fn escalation_count_drops_back_after_release() {
    init_tracing();
    let locker = EntityLocker::with_escalation_threshold(2).unwrap();

    for round in 0..3_u64 {
        for key in 0..6_u32 {
            locker.lock(&key);
        }
        // Keys 0..=2 are per-key, 3..=5 escalated.
        assert_eq!(locker.outstanding_locks(), 3);
        assert!(locker.is_exclusive_held());
        for key in (0..6_u32).rev() {
            locker.unlock(&key);
        }
        assert_eq!(locker.outstanding_locks(), 0);
        assert!(!locker.is_exclusive_held());
        assert_eq!(locker.stats().escalations, 3 * (round + 1));
    }
}

#[test]
fn escalation_counts_are_per_thread() {
    init_tracing();
    let locker = EntityLocker::with_escalation_threshold(2).unwrap();

    let escalated = run_actors(3, |id| {
        let base = u32::try_from(id).unwrap() * 10;
        for key in base..base + 3 {
            locker.lock(&key);
        }
        let escalated = locker.is_exclusive_held();
        for key in (base..base + 3).rev() {
            locker.unlock(&key);
        }
        escalated
    });

    assert!(escalated.iter().all(|e| !e), "three keys each stay within threshold");
    assert_eq!(locker.stats().escalations, 0);
}
