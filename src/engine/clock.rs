//! Wall-clock source for timer bookkeeping.
//!
//! Timestamps are epoch seconds as `f64`, matching the snapshot format.
//! Readings are anchored to a monotonic [`Instant`] taken on first use, so
//! a system clock adjustment while the process runs does not stretch or
//! shrink a countdown.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static ANCHOR: OnceLock<(Instant, f64)> = OnceLock::new();

/// Returns the current time in epoch seconds.
pub fn now() -> f64 {
    let (instant, epoch) = ANCHOR.get_or_init(|| (Instant::now(), system_now()));
    epoch + instant.elapsed().as_secs_f64()
}

fn system_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
