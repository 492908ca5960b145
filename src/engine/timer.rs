//! Countdown timer.
//!
//! This module provides the single-countdown primitive:
//! - State transitions (Ready → Running ⇄ Paused → Completed / Cancelled)
//! - Pause accounting that shifts the end time by the time spent paused
//! - A background tokio task polling every [`TICK_INTERVAL`] while running
//! - Observer callback and completion notification

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::error::SnapshotError;
use super::{clock, lock, new_id};
use crate::notification::Notifier;
use crate::types::{TimerEvent, TimerSnapshot, TimerStatus};

/// Poll period of the background countdown task.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Observer invoked on every timer status change.
pub type TimerCallback = Arc<dyn Fn(&TimerEvent) + Send + Sync>;

// ============================================================================
// Countdown
// ============================================================================

/// Mutable timing state of a timer.
#[derive(Debug, Clone, Copy, Default)]
struct Countdown {
    status: TimerStatus,
    started_at: f64,
    ends_at: f64,
    paused_at: f64,
    paused_accum: f64,
    /// Bumped on every launch so a stale task can tell it was superseded
    generation: u64,
}

impl Countdown {
    /// Remaining seconds with sub-second precision.
    fn remaining_at(&self, duration: u64, now: f64) -> f64 {
        match self.status {
            TimerStatus::Ready => duration as f64,
            TimerStatus::Completed | TimerStatus::Cancelled => 0.0,
            TimerStatus::Paused => (self.ends_at - self.paused_at).max(0.0),
            TimerStatus::Running => (self.ends_at - now).max(0.0),
        }
    }
}

/// Completion percentage for a countdown of `duration` seconds.
pub(crate) fn progress_of(duration: u64, remaining: f64) -> f64 {
    if duration == 0 {
        return 100.0;
    }
    let duration = duration as f64;
    ((duration - remaining) / duration * 100.0).clamp(0.0, 100.0)
}

/// Slack allowed when comparing persisted timestamps.
const TIME_EPSILON: f64 = 1e-3;

/// Whole seconds shown to users, rounded up.
fn whole_seconds(remaining: f64) -> u64 {
    remaining.ceil() as u64
}

/// Outcome of one background poll.
enum Tick {
    Counting,
    Stopped,
    Finished,
}

// ============================================================================
// Shared
// ============================================================================

struct TimerInner {
    countdown: Countdown,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    id: String,
    subject_id: String,
    subject_name: String,
    duration: u64,
    /// Held across a transition and its callback
    transition: Mutex<()>,
    inner: Mutex<TimerInner>,
    observer: Mutex<Option<TimerCallback>>,
    notifier: Mutex<Option<Arc<dyn Notifier>>>,
}

impl Shared {
    fn emit(&self, status: TimerStatus) {
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(&TimerEvent {
                timer_id: self.id.clone(),
                status,
            });
        }
    }

    /// Checks the deadline and commits completion when it has passed.
    fn poll(&self, generation: u64) -> Tick {
        let _transition = lock(&self.transition);
        let mut inner = lock(&self.inner);
        let countdown = &mut inner.countdown;
        if countdown.generation != generation || countdown.status != TimerStatus::Running {
            return Tick::Stopped;
        }
        if countdown.remaining_at(self.duration, clock::now()) > 0.0 {
            return Tick::Counting;
        }
        countdown.status = TimerStatus::Completed;
        inner.task = None;
        Tick::Finished
    }

    /// Fires the completion callback and notification.
    ///
    /// Runs without the timer's locks held: Completed is terminal, so no
    /// later transition can overtake this callback.
    fn finish(&self) {
        info!(timer_id = %self.id, subject = %self.subject_name, "timer completed");
        self.emit(TimerStatus::Completed);

        let notifier = lock(&self.notifier).clone();
        if let Some(notifier) = notifier {
            notifier.deliver("Timer complete", &format!("{} is ready!", self.subject_name));
        }
    }
}

async fn run_countdown(shared: Weak<Shared>, generation: u64) {
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Every handle dropped: nobody is left to observe the countdown.
        let Some(shared) = shared.upgrade() else {
            break;
        };
        match shared.poll(generation) {
            Tick::Counting => {}
            Tick::Stopped => break,
            Tick::Finished => {
                shared.finish();
                break;
            }
        }
    }
}

fn launch(shared: &Arc<Shared>, runtime: &Handle, inner: &mut TimerInner) {
    inner.countdown.generation += 1;
    if let Some(task) = inner.task.take() {
        task.abort();
    }
    inner.task = Some(runtime.spawn(run_countdown(
        Arc::downgrade(shared),
        inner.countdown.generation,
    )));
}

// ============================================================================
// Timer
// ============================================================================

/// A single countdown with explicit states.
///
/// All methods take `&self`; the timer is safe to drive from several
/// threads while its background task runs.
pub struct Timer {
    shared: Arc<Shared>,
}

impl Timer {
    /// Creates a READY timer for the given subject.
    pub fn new(
        subject_id: impl Into<String>,
        subject_name: impl Into<String>,
        duration: u64,
    ) -> Self {
        Self::from_parts(
            new_id(),
            subject_id.into(),
            subject_name.into(),
            duration,
            Countdown::default(),
        )
    }

    fn from_parts(
        id: String,
        subject_id: String,
        subject_name: String,
        duration: u64,
        countdown: Countdown,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                subject_id,
                subject_name,
                duration,
                transition: Mutex::new(()),
                inner: Mutex::new(TimerInner {
                    countdown,
                    task: None,
                }),
                observer: Mutex::new(None),
                notifier: Mutex::new(None),
            }),
        }
    }

    /// Sets the observer, builder style.
    #[must_use]
    pub fn with_callback(self, callback: TimerCallback) -> Self {
        self.set_callback(Some(callback));
        self
    }

    /// Sets the notifier used on completion, builder style.
    #[must_use]
    pub fn with_notifier(self, notifier: Arc<dyn Notifier>) -> Self {
        self.set_notifier(Some(notifier));
        self
    }

    /// Replaces the observer.
    pub fn set_callback(&self, callback: Option<TimerCallback>) {
        *lock(&self.shared.observer) = callback;
    }

    /// Replaces the completion notifier.
    pub fn set_notifier(&self, notifier: Option<Arc<dyn Notifier>>) {
        *lock(&self.shared.notifier) = notifier;
    }

    /// Another handle to the same timer.
    pub(crate) fn share(&self) -> Timer {
        Timer {
            shared: Arc::clone(&self.shared),
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Starts a READY timer or continues a PAUSED one.
    ///
    /// Returns false without side effects from any other state, or when no
    /// tokio runtime is available to run the countdown.
    pub fn start(&self) -> bool {
        let shared = &self.shared;
        let _transition = lock(&shared.transition);
        let Ok(runtime) = Handle::try_current() else {
            warn!(timer_id = %shared.id, "cannot start timer outside of a tokio runtime");
            return false;
        };

        {
            let mut inner = lock(&shared.inner);
            let now = clock::now();
            let countdown = &mut inner.countdown;
            match countdown.status {
                TimerStatus::Ready => {
                    countdown.started_at = now;
                    countdown.ends_at = now + shared.duration as f64;
                    countdown.paused_at = 0.0;
                    countdown.paused_accum = 0.0;
                }
                TimerStatus::Paused => {
                    let paused_for = (now - countdown.paused_at).max(0.0);
                    countdown.paused_accum += paused_for;
                    countdown.ends_at += paused_for;
                }
                _ => return false,
            }
            countdown.status = TimerStatus::Running;
            launch(shared, &runtime, &mut inner);
        }

        debug!(timer_id = %shared.id, "timer running");
        shared.emit(TimerStatus::Running);
        true
    }

    /// Freezes a RUNNING countdown.
    pub fn pause(&self) -> bool {
        let shared = &self.shared;
        let _transition = lock(&shared.transition);
        {
            let mut inner = lock(&shared.inner);
            if inner.countdown.status != TimerStatus::Running {
                return false;
            }
            inner.countdown.paused_at = clock::now();
            inner.countdown.status = TimerStatus::Paused;
            if let Some(task) = inner.task.take() {
                task.abort();
            }
        }

        debug!(timer_id = %shared.id, "timer paused");
        shared.emit(TimerStatus::Paused);
        true
    }

    /// Continues a PAUSED countdown. Fails from any other state.
    pub fn resume(&self) -> bool {
        if self.status() != TimerStatus::Paused {
            return false;
        }
        self.start()
    }

    /// Aborts the countdown from READY, RUNNING or PAUSED.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let _transition = lock(&shared.transition);
        {
            let mut inner = lock(&shared.inner);
            if inner.countdown.status.is_terminal() {
                return false;
            }
            inner.countdown.status = TimerStatus::Cancelled;
            if let Some(task) = inner.task.take() {
                task.abort();
            }
        }

        debug!(timer_id = %shared.id, "timer cancelled");
        shared.emit(TimerStatus::Cancelled);
        true
    }

    /// Puts the timer back to READY without notifying the observer.
    pub(crate) fn reset(&self) {
        let _transition = lock(&self.shared.transition);
        let mut inner = lock(&self.shared.inner);
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.countdown = Countdown {
            generation: inner.countdown.generation + 1,
            ..Countdown::default()
        };
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.shared.subject_id
    }

    #[must_use]
    pub fn subject_name(&self) -> &str {
        &self.shared.subject_name
    }

    /// Total countdown length in seconds.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.shared.duration
    }

    #[must_use]
    pub fn status(&self) -> TimerStatus {
        lock(&self.shared.inner).countdown.status
    }

    /// Remaining seconds with sub-second precision.
    pub(crate) fn remaining_secs(&self) -> f64 {
        lock(&self.shared.inner)
            .countdown
            .remaining_at(self.shared.duration, clock::now())
    }

    /// Remaining whole seconds, rounded up.
    #[must_use]
    pub fn remaining_time(&self) -> u64 {
        whole_seconds(self.remaining_secs())
    }

    /// Completion percentage in `[0, 100]`.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        progress_of(self.shared.duration, self.remaining_secs())
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Captures the current state for persistence.
    #[must_use]
    pub fn to_snapshot(&self) -> TimerSnapshot {
        let shared = &self.shared;
        let countdown = lock(&shared.inner).countdown;
        let remaining = countdown.remaining_at(shared.duration, clock::now());

        TimerSnapshot {
            timer_id: shared.id.clone(),
            product_id: shared.subject_id.clone(),
            product_name: shared.subject_name.clone(),
            duration: shared.duration,
            start_time: countdown.started_at,
            end_time: countdown.ends_at,
            paused_time: countdown.paused_at,
            elapsed_pause_time: countdown.paused_accum,
            status: countdown.status,
            remaining_time: whole_seconds(remaining),
            progress: progress_of(shared.duration, remaining),
        }
    }

    /// Rebuilds a timer from a snapshot.
    ///
    /// A RUNNING snapshot whose end time has passed comes back COMPLETED
    /// without a background task and without a completion callback. A
    /// RUNNING snapshot still in the future resumes counting towards the
    /// stored end time, which requires a tokio runtime.
    pub(crate) fn from_snapshot(
        snapshot: TimerSnapshot,
        callback: Option<TimerCallback>,
    ) -> Result<Timer, SnapshotError> {
        let times = [
            snapshot.start_time,
            snapshot.end_time,
            snapshot.paused_time,
            snapshot.elapsed_pause_time,
        ];
        if times.iter().any(|t| !t.is_finite()) {
            return Err(SnapshotError::Invalid(format!(
                "timer {} has a non-finite timestamp",
                snapshot.timer_id
            )));
        }
        if snapshot.status.is_active() && snapshot.end_time < snapshot.start_time {
            return Err(SnapshotError::Invalid(format!(
                "timer {} ends before it starts",
                snapshot.timer_id
            )));
        }
        if snapshot.status == TimerStatus::Paused {
            let paused_within = snapshot.start_time <= snapshot.paused_time + TIME_EPSILON
                && snapshot.paused_time <= snapshot.end_time + TIME_EPSILON;
            let left = snapshot.end_time - snapshot.paused_time;
            let allowed = snapshot.duration as f64 + snapshot.elapsed_pause_time;
            if !paused_within || left > allowed + TIME_EPSILON {
                return Err(SnapshotError::Invalid(format!(
                    "timer {} was paused at {} outside {}..{}",
                    snapshot.timer_id,
                    snapshot.paused_time,
                    snapshot.start_time,
                    snapshot.end_time
                )));
            }
        }

        let mut countdown = Countdown {
            status: snapshot.status,
            started_at: snapshot.start_time,
            ends_at: snapshot.end_time,
            paused_at: snapshot.paused_time,
            paused_accum: snapshot.elapsed_pause_time,
            generation: 0,
        };

        let mut runtime = None;
        if countdown.status == TimerStatus::Running {
            if clock::now() > countdown.ends_at {
                info!(timer_id = %snapshot.timer_id, "restored timer already past its end time");
                countdown.status = TimerStatus::Completed;
            } else {
                runtime = Some(
                    Handle::try_current()
                        .map_err(|_| SnapshotError::NoRuntime(snapshot.timer_id.clone()))?,
                );
            }
        }

        let timer = Timer::from_parts(
            snapshot.timer_id,
            snapshot.product_id,
            snapshot.product_name,
            snapshot.duration,
            countdown,
        );
        timer.set_callback(callback);

        if let Some(runtime) = runtime {
            let mut inner = lock(&timer.shared.inner);
            launch(&timer.shared, &runtime, &mut inner);
        }
        Ok(timer)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.shared.id)
            .field("subject_name", &self.shared.subject_name)
            .field("duration", &self.shared.duration)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MockNotifier;

    fn recording_timer(duration: u64) -> (Timer, Arc<Mutex<Vec<TimerStatus>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let timer = Timer::new("kimchi-jjigae", "Kimchi Jjigae", duration).with_callback(
            Arc::new(move |event: &TimerEvent| sink.lock().unwrap().push(event.status)),
        );
        (timer, events)
    }

    // ------------------------------------------------------------------------
    // Pure helpers
    // ------------------------------------------------------------------------

    mod helper_tests {
        use super::*;

        #[test]
        fn test_progress_of() {
            assert_eq!(progress_of(100, 100.0), 0.0);
            assert_eq!(progress_of(100, 25.0), 75.0);
            assert_eq!(progress_of(100, 0.0), 100.0);
            assert_eq!(progress_of(0, 0.0), 100.0);
            assert_eq!(progress_of(10, 20.0), 0.0);
        }

        #[test]
        fn test_whole_seconds_rounds_up() {
            assert_eq!(whole_seconds(0.0), 0);
            assert_eq!(whole_seconds(0.01), 1);
            assert_eq!(whole_seconds(1.0), 1);
            assert_eq!(whole_seconds(59.2), 60);
        }

        #[test]
        fn test_remaining_paused_uses_pause_instant() {
            let countdown = Countdown {
                status: TimerStatus::Paused,
                started_at: 100.0,
                ends_at: 160.0,
                paused_at: 130.0,
                ..Countdown::default()
            };
            assert_eq!(countdown.remaining_at(60, 10_000.0), 30.0);
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    mod transition_tests {
        use super::*;

        #[test]
        fn test_new_timer_is_ready() {
            let timer = Timer::new("bulgogi", "Bulgogi", 300);
            assert_eq!(timer.status(), TimerStatus::Ready);
            assert_eq!(timer.remaining_time(), 300);
            assert_eq!(timer.progress_percentage(), 0.0);
            assert_eq!(timer.subject_id(), "bulgogi");
            assert_eq!(timer.subject_name(), "Bulgogi");
            assert_eq!(timer.duration(), 300);
        }

        #[test]
        fn test_ids_are_unique() {
            let a = Timer::new("p", "P", 1);
            let b = Timer::new("p", "P", 1);
            assert_ne!(a.id(), b.id());
        }

        #[test]
        fn test_start_without_runtime_fails() {
            let (timer, events) = recording_timer(10);
            assert!(!timer.start());
            assert_eq!(timer.status(), TimerStatus::Ready);
            assert!(events.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_start() {
            let (timer, events) = recording_timer(10);

            assert!(timer.start());
            assert_eq!(timer.status(), TimerStatus::Running);
            assert_eq!(timer.remaining_time(), 10);
            assert_eq!(*events.lock().unwrap(), vec![TimerStatus::Running]);

            // Second start is rejected
            assert!(!timer.start());
            assert_eq!(events.lock().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_pause_and_resume_preserve_remaining() {
            let (timer, events) = recording_timer(60);
            timer.start();

            assert!(timer.pause());
            let remaining = timer.remaining_time();
            tokio::time::sleep(Duration::from_millis(300)).await;
            assert_eq!(timer.remaining_time(), remaining);

            assert!(timer.resume());
            assert_eq!(timer.status(), TimerStatus::Running);
            assert_eq!(timer.remaining_time(), remaining);

            assert_eq!(
                *events.lock().unwrap(),
                vec![
                    TimerStatus::Running,
                    TimerStatus::Paused,
                    TimerStatus::Running
                ]
            );
        }

        #[tokio::test]
        async fn test_pause_not_running() {
            let (timer, _) = recording_timer(60);
            assert!(!timer.pause());
            assert!(!timer.resume());

            timer.start();
            timer.pause();
            assert!(!timer.pause());
        }

        #[tokio::test]
        async fn test_pause_shifts_end_time() {
            let timer = Timer::new("p", "P", 60);
            timer.start();
            let before = timer.to_snapshot();

            timer.pause();
            tokio::time::sleep(Duration::from_millis(200)).await;
            timer.resume();

            let after = timer.to_snapshot();
            assert!(after.elapsed_pause_time >= 0.19);
            assert!(after.end_time - before.end_time >= 0.19);
            assert_eq!(after.start_time, before.start_time);
        }

        #[tokio::test]
        async fn test_cancel_twice() {
            let (timer, events) = recording_timer(60);
            timer.start();

            assert!(timer.cancel());
            assert!(!timer.cancel());
            assert_eq!(timer.status(), TimerStatus::Cancelled);
            assert_eq!(timer.remaining_time(), 0);
            assert_eq!(
                *events.lock().unwrap(),
                vec![TimerStatus::Running, TimerStatus::Cancelled]
            );
        }

        #[test]
        fn test_cancel_ready() {
            let timer = Timer::new("p", "P", 60);
            assert!(timer.cancel());
            assert!(!timer.start());
        }

        #[tokio::test]
        async fn test_reset_returns_to_ready_silently() {
            let (timer, events) = recording_timer(60);
            timer.start();
            timer.cancel();
            timer.reset();

            assert_eq!(timer.status(), TimerStatus::Ready);
            assert_eq!(timer.remaining_time(), 60);
            assert_eq!(events.lock().unwrap().len(), 2);
        }
    }

    // ------------------------------------------------------------------------
    // Background countdown
    // ------------------------------------------------------------------------

    mod countdown_tests {
        use super::*;

        #[tokio::test]
        async fn test_zero_duration_completes_on_next_tick() {
            let (timer, events) = recording_timer(0);
            timer.start();
            tokio::time::sleep(Duration::from_millis(300)).await;

            assert_eq!(timer.status(), TimerStatus::Completed);
            assert_eq!(timer.progress_percentage(), 100.0);
            assert_eq!(
                *events.lock().unwrap(),
                vec![TimerStatus::Running, TimerStatus::Completed]
            );
        }

        #[tokio::test]
        async fn test_completion_fires_once_and_notifies() {
            let notifier = Arc::new(MockNotifier::new());
            let (timer, events) = recording_timer(1);
            let timer = timer.with_notifier(notifier.clone());

            timer.start();
            tokio::time::sleep(Duration::from_millis(1500)).await;

            assert_eq!(timer.status(), TimerStatus::Completed);
            assert_eq!(timer.remaining_time(), 0);
            assert_eq!(
                *events.lock().unwrap(),
                vec![TimerStatus::Running, TimerStatus::Completed]
            );
            assert_eq!(
                notifier.get_deliveries(),
                vec![(
                    "Timer complete".to_string(),
                    "Kimchi Jjigae is ready!".to_string()
                )]
            );
        }

        #[tokio::test]
        async fn test_remaining_shows_one_until_the_end() {
            let timer = Timer::new("p", "P", 1);
            timer.start();
            tokio::time::sleep(Duration::from_millis(500)).await;
            assert_eq!(timer.remaining_time(), 1);
        }

        #[tokio::test]
        async fn test_paused_timer_does_not_complete() {
            let (timer, events) = recording_timer(1);
            timer.start();
            timer.pause();
            tokio::time::sleep(Duration::from_millis(1300)).await;

            assert_eq!(timer.status(), TimerStatus::Paused);
            assert_eq!(events.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_cancelled_timer_does_not_complete() {
            let notifier = Arc::new(MockNotifier::new());
            let (timer, events) = recording_timer(0);
            let timer = timer.with_notifier(notifier.clone());
            timer.start();
            timer.cancel();
            tokio::time::sleep(Duration::from_millis(300)).await;

            assert_eq!(timer.status(), TimerStatus::Cancelled);
            assert_eq!(
                *events.lock().unwrap(),
                vec![TimerStatus::Running, TimerStatus::Cancelled]
            );
            assert_eq!(notifier.delivery_count(), 0);
        }

        #[tokio::test]
        async fn test_progress_monotonic_and_exact_at_completion() {
            let timer = Timer::new("p", "P", 1);
            timer.start();

            let mut last = timer.progress_percentage();
            for _ in 0..6 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let progress = timer.progress_percentage();
                assert!(progress >= last);
                last = progress;
            }

            tokio::time::sleep(Duration::from_millis(900)).await;
            assert_eq!(timer.status(), TimerStatus::Completed);
            assert_eq!(timer.progress_percentage(), 100.0);
        }
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    mod snapshot_tests {
        use super::*;

        fn running_snapshot(end_offset: f64) -> TimerSnapshot {
            let now = clock::now();
            TimerSnapshot {
                timer_id: "restored".to_string(),
                product_id: "japchae".to_string(),
                product_name: "Japchae".to_string(),
                duration: 10,
                start_time: now - 10.0 + end_offset,
                end_time: now + end_offset,
                paused_time: 0.0,
                elapsed_pause_time: 0.0,
                status: TimerStatus::Running,
                remaining_time: 0,
                progress: 0.0,
            }
        }

        #[tokio::test]
        async fn test_round_trip_preserves_identity_for_all_statuses() {
            let ready = Timer::new("a", "A", 30);
            let running = Timer::new("b", "B", 30);
            running.start();
            let paused = Timer::new("c", "C", 30);
            paused.start();
            paused.pause();
            let cancelled = Timer::new("d", "D", 30);
            cancelled.cancel();
            let completed = Timer::new("e", "E", 0);
            completed.start();
            tokio::time::sleep(Duration::from_millis(300)).await;

            for timer in [&ready, &running, &paused, &cancelled, &completed] {
                let snapshot = timer.to_snapshot();
                let restored = Timer::from_snapshot(snapshot.clone(), None).unwrap();
                assert_eq!(restored.id(), timer.id());
                assert_eq!(restored.subject_id(), timer.subject_id());
                assert_eq!(restored.duration(), timer.duration());
                assert_eq!(restored.status(), timer.status());
            }
        }

        #[test]
        fn test_snapshot_derived_fields() {
            let timer = Timer::new("a", "A", 30);
            let snapshot = timer.to_snapshot();
            assert_eq!(snapshot.status, TimerStatus::Ready);
            assert_eq!(snapshot.remaining_time, 30);
            assert_eq!(snapshot.progress, 0.0);
        }

        #[test]
        fn test_past_running_snapshot_restores_completed() {
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            let callback: TimerCallback =
                Arc::new(move |event: &TimerEvent| sink.lock().unwrap().push(event.status));

            // No runtime needed: nothing is launched
            let timer = Timer::from_snapshot(running_snapshot(-5.0), Some(callback)).unwrap();
            assert_eq!(timer.status(), TimerStatus::Completed);
            assert_eq!(timer.remaining_time(), 0);
            assert!(events.lock().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_future_running_snapshot_rearms_countdown() {
            let events = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&events);
            let callback: TimerCallback =
                Arc::new(move |event: &TimerEvent| sink.lock().unwrap().push(event.status));

            let timer = Timer::from_snapshot(running_snapshot(0.3), Some(callback)).unwrap();
            assert_eq!(timer.status(), TimerStatus::Running);

            tokio::time::sleep(Duration::from_millis(700)).await;
            assert_eq!(timer.status(), TimerStatus::Completed);
            assert_eq!(*events.lock().unwrap(), vec![TimerStatus::Completed]);
        }

        #[test]
        fn test_running_snapshot_without_runtime() {
            let result = Timer::from_snapshot(running_snapshot(30.0), None);
            assert!(matches!(result, Err(SnapshotError::NoRuntime(id)) if id == "restored"));
        }

        #[test]
        fn test_inconsistent_snapshot_rejected() {
            let mut snapshot = running_snapshot(30.0);
            snapshot.status = TimerStatus::Paused;
            snapshot.end_time = snapshot.start_time - 1.0;
            let result = Timer::from_snapshot(snapshot, None);
            assert!(matches!(result, Err(SnapshotError::Invalid(_))));
        }

        #[test]
        fn test_paused_snapshot_keeps_remaining() {
            let mut snapshot = running_snapshot(30.0);
            snapshot.status = TimerStatus::Paused;
            snapshot.start_time = 1_000.0;
            snapshot.end_time = 1_012.0;
            snapshot.paused_time = 1_004.0;
            snapshot.elapsed_pause_time = 2.0;

            let timer = Timer::from_snapshot(snapshot, None).unwrap();
            assert_eq!(timer.status(), TimerStatus::Paused);
            assert_eq!(timer.remaining_time(), 8);
        }

        #[test]
        fn test_paused_time_out_of_range_rejected() {
            let mut snapshot = running_snapshot(30.0);
            snapshot.status = TimerStatus::Paused;
            snapshot.paused_time = 0.0;
            let result = Timer::from_snapshot(snapshot.clone(), None);
            assert!(matches!(result, Err(SnapshotError::Invalid(_))));

            // Paused after the end
            snapshot.paused_time = snapshot.end_time + 5.0;
            let result = Timer::from_snapshot(snapshot.clone(), None);
            assert!(matches!(result, Err(SnapshotError::Invalid(_))));

            // More time left than the countdown ever had
            snapshot.start_time = 1_000.0;
            snapshot.end_time = 1_030.0;
            snapshot.paused_time = 1_001.0;
            snapshot.elapsed_pause_time = 0.0;
            let result = Timer::from_snapshot(snapshot, None);
            assert!(matches!(result, Err(SnapshotError::Invalid(_))));
        }
    }
}
