//! Completion notifications.
//!
//! Timers and step timers call a [`Notifier`] exactly once when they
//! finish. This module provides:
//!
//! - The [`Notifier`] trait
//! - [`SystemNotifier`] for console, sound and desktop delivery
//! - [`MockNotifier`] for tests

pub mod config;
pub mod error;
pub mod system;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::warn;

pub use config::NotificationConfig;
pub use error::NotificationError;
pub use system::SystemNotifier;

/// Receives completion notifications.
///
/// `deliver` is called from inside completion handling, so it must not
/// block for long. Failures are the implementation's business: log them
/// and return.
pub trait Notifier: Send + Sync {
    fn deliver(&self, title: &str, message: &str);
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Notifier that records deliveries.
#[derive(Debug, Default)]
pub struct MockNotifier {
    deliveries: Mutex<Vec<(String, String)>>,
    failures: AtomicUsize,
    should_fail: AtomicBool,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent deliveries fail (and not be recorded).
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn get_deliveries(&self) -> Vec<(String, String)> {
        self.deliveries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn delivery_count(&self) -> usize {
        self.get_deliveries().len()
    }

    /// Number of deliveries that failed while `should_fail` was set.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl Notifier for MockNotifier {
    fn deliver(&self, title: &str, message: &str) {
        if self.should_fail.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            warn!(title, "mock notification failure");
            return;
        }
        self.deliveries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((title.to_string(), message.to_string()));
    }
}
