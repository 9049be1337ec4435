//! Concurrency stress suite for the entity locker.
//!
//! Parallel actors drive a shared locker and check that the observed
//! outcomes are consistent with mutual exclusion, reentrancy, escalation
//! and global exclusivity. Set `RUST_LOG=entity_locker=debug` to see the
//! locker's own tracing while the suite runs.

mod escalation;
mod exclusive;
mod helpers;
