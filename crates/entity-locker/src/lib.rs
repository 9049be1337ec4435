//! # entity-locker
//!
//! Keyed, reentrant mutual exclusion for in-process entities.
//!
//! [`EntityLocker`] hands out exclusive locks on individual entities
//! addressed by any hashable key, plus a global exclusive mode that blocks
//! every per-key operation. A thread holding too many per-key locks at once
//! is escalated: its next new key is served by the global exclusive lock,
//! bounding the bookkeeping one thread can accumulate.
//!
//! ## Features
//!
//! - **Reentrant**: a thread may lock a key it already holds; it owes one
//!   unlock per lock.
//! - **Global mode**: [`EntityLocker::lock_exclusive`] waits for all in-flight
//!   per-key work, then excludes it.
//! - **Escalation**: configurable threshold, disabled by default.
//! - **Bounded waits**: [`EntityLocker::try_lock`] never leaves state behind
//!   when it gives up.
//!
//! ## Quick Start
//!
//! ```rust
//! use entity_locker::EntityLocker;
//! use std::time::Duration;
//!
//! fn main() -> Result<(), entity_locker::Error> {
//!     let locker = EntityLocker::with_escalation_threshold(64)?;
//!
//!     // Lock several keys in sorted order to stay deadlock free.
//!     let mut keys = vec![7_u64, 3, 5];
//!     keys.sort_unstable();
//!     for key in &keys {
//!         locker.lock(key);
//!     }
//!     for key in keys.iter().rev() {
//!         locker.unlock(key);
//!     }
//!
//!     if let Some(_guard) = locker.try_lock_guard(3, Duration::from_millis(10)) {
//!         // key 3 held until the guard drops
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::doc_markdown, clippy::uninlined_format_args))]

pub mod config;
pub mod error;
mod locker;
pub mod metrics;
pub mod sync;

pub use config::LockerConfig;
pub use error::{Error, Result, MIN_ESCALATION_THRESHOLD};
pub use locker::{EntityGuard, EntityLocker, ExclusiveGuard};
pub use metrics::LockerStats;
