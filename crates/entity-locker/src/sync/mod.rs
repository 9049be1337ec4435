//! Blocking primitives the locker is assembled from.
//!
//! - `key_lock`: reentrant per-key mutex with explicit ownership state
//! - `global_gate`: owner-aware reader/writer gate for global mode

mod global_gate;
mod key_lock;

pub use global_gate::GlobalGate;
pub use key_lock::{KeyLockState, ReentrantKeyLock};
