//! Timer engine: countdown timers, sequential queues and step timers.
//!
//! All operations are synchronous. Running countdowns are driven by one
//! tokio task per timer, so `start` must be called from inside a runtime.
//!
//! Observers are invoked synchronously, in transition order. User-driven
//! transitions call them with the transition lock held; completion is
//! reported after the countdown task has released it. An observer must not
//! call back into the component that emitted the event.

pub mod clock;
pub mod error;
pub mod queue;
pub mod step;
pub mod timer;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use error::{EngineError, SnapshotError};
pub use queue::{QueueCallback, TimerQueue};
pub use step::{CurrentStep, StepCallback, StepTimer};
pub use timer::{Timer, TimerCallback, TICK_INTERVAL};

/// Locks a mutex, recovering the data if a previous holder panicked.
///
/// State behind these locks is committed in single assignments, so a
/// panicking observer cannot leave it half-written.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Generates a fresh opaque identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
