//! Sequential timer queue.
//!
//! A queue owns an ordered list of timers and runs them one at a time.
//! When the active timer completes, the queue starts the next one; after
//! the last timer the queue itself completes.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::error::SnapshotError;
use super::timer::{Timer, TimerCallback};
use super::{lock, new_id};
use crate::types::{
    index_to_wire, QueueEvent, QueueSnapshot, TimerEvent, TimerSnapshot, TimerStatus,
};

/// Observer invoked on queue transitions and forwarded timer events.
pub type QueueCallback = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

// ============================================================================
// Shared
// ============================================================================

struct QueueState {
    status: TimerStatus,
    current_index: Option<usize>,
    timers: Vec<Timer>,
}

impl QueueState {
    fn current(&self) -> Option<&Timer> {
        self.current_index.and_then(|index| self.timers.get(index))
    }

    fn position(&self, timer_id: &str) -> Option<usize> {
        self.timers.iter().position(|timer| timer.id() == timer_id)
    }
}

struct Shared {
    id: String,
    name: String,
    /// Serializes queue operations, including auto-advance
    ops: Mutex<()>,
    state: Mutex<QueueState>,
    observer: Mutex<Option<QueueCallback>>,
}

impl Shared {
    fn emit(&self, status: TimerStatus, current_index: Option<usize>, timer: Option<TimerEvent>) {
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(&QueueEvent {
                queue_id: self.id.clone(),
                status,
                current_index,
                timer,
            });
        }
    }

    /// Observer installed on every owned timer.
    fn timer_handler(shared: &Arc<Shared>) -> TimerCallback {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        Arc::new(move |event: &TimerEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.on_timer_event(event);
            }
        })
    }

    fn on_timer_event(&self, event: &TimerEvent) {
        if event.status == TimerStatus::Completed {
            let _ops = lock(&self.ops);
            let advance = {
                let state = lock(&self.state);
                state.status == TimerStatus::Running
                    && state.current().is_some_and(|timer| timer.id() == event.timer_id)
            };
            if advance {
                self.start_next();
            }
            self.forward(event);
        } else {
            self.forward(event);
        }
    }

    fn forward(&self, event: &TimerEvent) {
        let (status, current_index) = {
            let state = lock(&self.state);
            (state.status, state.current_index)
        };
        self.emit(status, current_index, Some(event.clone()));
    }

    /// Advances to the next startable timer, completing the queue past the end.
    ///
    /// Callers hold `ops`.
    fn start_next(&self) -> bool {
        loop {
            let next = {
                let mut state = lock(&self.state);
                let index = state.current_index.map_or(0, |i| i + 1);
                if index >= state.timers.len() {
                    state.current_index = None;
                    state.status = TimerStatus::Completed;
                    None
                } else {
                    state.current_index = Some(index);
                    state.status = TimerStatus::Running;
                    Some(state.timers[index].share())
                }
            };

            let Some(timer) = next else {
                info!(queue_id = %self.id, name = %self.name, "timer queue completed");
                self.emit(TimerStatus::Completed, None, None);
                return false;
            };

            if timer.status().is_terminal() {
                debug!(queue_id = %self.id, timer_id = %timer.id(), "skipping finished timer");
                continue;
            }
            return timer.start();
        }
    }

    fn current_timer(&self) -> Option<Timer> {
        lock(&self.state).current().map(Timer::share)
    }

    fn all_timers(&self) -> Vec<Timer> {
        lock(&self.state).timers.iter().map(Timer::share).collect()
    }
}

// ============================================================================
// TimerQueue
// ============================================================================

/// An ordered list of timers run one at a time.
pub struct TimerQueue {
    shared: Arc<Shared>,
}

impl TimerQueue {
    /// Creates an empty READY queue.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_state(
            new_id(),
            name.into(),
            QueueState {
                status: TimerStatus::Ready,
                current_index: None,
                timers: Vec::new(),
            },
        )
    }

    fn with_state(id: String, name: String, state: QueueState) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                name,
                ops: Mutex::new(()),
                state: Mutex::new(state),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Sets the observer, builder style.
    #[must_use]
    pub fn with_callback(self, callback: QueueCallback) -> Self {
        self.set_callback(Some(callback));
        self
    }

    /// Replaces the observer.
    pub fn set_callback(&self, callback: Option<QueueCallback>) {
        *lock(&self.shared.observer) = callback;
    }

    // ------------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------------

    /// Appends a timer and takes over its observer slot.
    pub fn add_timer(&self, timer: Timer) {
        let _ops = lock(&self.shared.ops);
        timer.set_callback(Some(Shared::timer_handler(&self.shared)));
        debug!(queue_id = %self.shared.id, timer_id = %timer.id(), "timer added to queue");
        lock(&self.shared.state).timers.push(timer);
    }

    /// Creates a READY timer, appends it and returns its id.
    pub fn add_timer_from_spec(
        &self,
        subject_id: impl Into<String>,
        subject_name: impl Into<String>,
        duration: u64,
    ) -> String {
        let timer = Timer::new(subject_id, subject_name, duration);
        let id = timer.id().to_string();
        self.add_timer(timer);
        id
    }

    /// Removes a timer by id.
    ///
    /// Removing the active timer cancels it and moves on to the timer that
    /// followed it. A queue left without timers completes.
    pub fn remove_timer(&self, timer_id: &str) -> bool {
        let shared = &self.shared;
        let _ops = lock(&shared.ops);

        let (timer, was_current) = {
            let state = lock(&shared.state);
            let Some(position) = state.position(timer_id) else {
                return false;
            };
            (
                state.timers[position].share(),
                state.current_index == Some(position),
            )
        };

        if was_current && timer.status().is_active() {
            timer.cancel();
        }
        timer.set_callback(None);

        let (advance, emptied) = {
            let mut state = lock(&shared.state);
            let Some(position) = state.position(timer_id) else {
                return false;
            };
            state.timers.remove(position);

            let mut advance = false;
            match state.current_index {
                Some(current) if current == position => {
                    advance = state.status.is_active();
                    state.current_index = if advance { position.checked_sub(1) } else { None };
                }
                Some(current) if current > position => {
                    state.current_index = Some(current - 1);
                }
                _ => {}
            }
            (advance, state.timers.is_empty())
        };
        debug!(queue_id = %shared.id, timer_id, "timer removed from queue");

        if advance {
            shared.start_next();
        } else if emptied {
            {
                let mut state = lock(&shared.state);
                state.status = TimerStatus::Completed;
                state.current_index = None;
            }
            shared.emit(TimerStatus::Completed, None, None);
        }
        true
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Starts the queue from its first timer.
    ///
    /// A COMPLETED or CANCELLED queue restarts with every timer reset to
    /// READY. A PAUSED queue is resumed. Fails when already RUNNING, when
    /// empty, or outside a tokio runtime.
    pub fn start(&self) -> bool {
        if self.status() == TimerStatus::Paused {
            return self.resume();
        }

        let shared = &self.shared;
        let _ops = lock(&shared.ops);
        if Handle::try_current().is_err() {
            warn!(queue_id = %shared.id, "cannot start queue outside of a tokio runtime");
            return false;
        }

        let restart = {
            let mut state = lock(&shared.state);
            if state.timers.is_empty() || state.status == TimerStatus::Running {
                return false;
            }
            let restart = state.status.is_terminal();
            if restart {
                state.current_index = None;
            }
            state.status = TimerStatus::Running;
            restart
        };
        if restart {
            for timer in shared.all_timers() {
                timer.reset();
            }
        }

        debug!(queue_id = %shared.id, restart, "timer queue running");
        shared.emit(TimerStatus::Running, None, None);
        shared.start_next();
        true
    }

    /// Pauses the active timer.
    pub fn pause(&self) -> bool {
        self.transition_current(TimerStatus::Running, TimerStatus::Paused, Timer::pause)
    }

    /// Resumes the active timer.
    pub fn resume(&self) -> bool {
        self.transition_current(TimerStatus::Paused, TimerStatus::Running, Timer::resume)
    }

    fn transition_current(
        &self,
        from: TimerStatus,
        to: TimerStatus,
        apply: fn(&Timer) -> bool,
    ) -> bool {
        let shared = &self.shared;
        let _ops = lock(&shared.ops);
        let Some(current) = shared.current_timer() else {
            return false;
        };
        if self.status() != from || !apply(&current) {
            return false;
        }

        let current_index = {
            let mut state = lock(&shared.state);
            state.status = to;
            state.current_index
        };
        debug!(queue_id = %shared.id, status = %to, "timer queue transition");
        shared.emit(
            to,
            current_index,
            Some(TimerEvent {
                timer_id: current.id().to_string(),
                status: to,
            }),
        );
        true
    }

    /// Cancels the active timer and starts the next one.
    pub fn skip_current(&self) -> bool {
        let shared = &self.shared;
        let _ops = lock(&shared.ops);
        if Handle::try_current().is_err() {
            warn!(queue_id = %shared.id, "cannot skip outside of a tokio runtime");
            return false;
        }
        let Some(current) = shared.current_timer() else {
            return false;
        };
        current.cancel();
        debug!(queue_id = %shared.id, timer_id = %current.id(), "timer skipped");
        shared.start_next()
    }

    /// Cancels the active timer and the queue.
    ///
    /// Fails only when the queue is already COMPLETED or CANCELLED.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let _ops = lock(&shared.ops);
        if self.status().is_terminal() {
            return false;
        }
        if let Some(current) = shared.current_timer() {
            current.cancel();
        }
        {
            let mut state = lock(&shared.state);
            state.status = TimerStatus::Cancelled;
            state.current_index = None;
        }
        debug!(queue_id = %shared.id, "timer queue cancelled");
        shared.emit(TimerStatus::Cancelled, None, None);
        true
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn status(&self) -> TimerStatus {
        lock(&self.shared.state).status
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        lock(&self.shared.state).current_index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.shared.state).timers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the active timer, if any.
    #[must_use]
    pub fn current_timer(&self) -> Option<TimerSnapshot> {
        self.shared.current_timer().map(|timer| timer.to_snapshot())
    }

    /// Snapshots of every timer, in order.
    #[must_use]
    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.shared
            .all_timers()
            .iter()
            .map(Timer::to_snapshot)
            .collect()
    }

    /// Remaining whole seconds of the active timer, 0 when idle.
    #[must_use]
    pub fn remaining_time(&self) -> u64 {
        self.shared
            .current_timer()
            .map_or(0, |timer| timer.remaining_time())
    }

    /// Remaining whole seconds of the active timer and every timer after it.
    ///
    /// A queue that has not started counts all of its timers.
    #[must_use]
    pub fn total_remaining_time(&self) -> u64 {
        let (status, current_index, timers) = self.view();
        let first = match (current_index, status) {
            (Some(index), _) => index,
            (None, TimerStatus::Ready) => 0,
            (None, _) => return 0,
        };
        timers[first..].iter().map(Timer::remaining_time).sum()
    }

    /// Completion percentage over the whole queue.
    ///
    /// Timers before the active one count as fully consumed, including
    /// skipped ones.
    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        let (status, current_index, timers) = self.view();
        let total: u64 = timers.iter().map(Timer::duration).sum();
        if total == 0 {
            return 0.0;
        }

        let done = match current_index {
            Some(index) => {
                let before: u64 = timers[..index].iter().map(Timer::duration).sum();
                let current = &timers[index];
                before as f64 + (current.duration() as f64 - current.remaining_secs()).max(0.0)
            }
            None if status == TimerStatus::Completed => total as f64,
            None => 0.0,
        };
        (done / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    fn view(&self) -> (TimerStatus, Option<usize>, Vec<Timer>) {
        let state = lock(&self.shared.state);
        (
            state.status,
            state.current_index,
            state.timers.iter().map(Timer::share).collect(),
        )
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    /// Captures the queue and its timers for persistence.
    #[must_use]
    pub fn to_snapshot(&self) -> QueueSnapshot {
        let (status, current_index, timers) = self.view();
        QueueSnapshot {
            queue_id: self.shared.id.clone(),
            name: self.shared.name.clone(),
            current_index: index_to_wire(current_index),
            status,
            timers: timers.iter().map(Timer::to_snapshot).collect(),
            total_remaining_time: self.total_remaining_time(),
            progress: self.progress_percentage(),
        }
    }

    /// Rebuilds a queue and its timers from a snapshot.
    ///
    /// A RUNNING queue whose active timer finished while persisted moves on
    /// to the next timer; if none is left it is marked COMPLETED without a
    /// callback.
    pub(crate) fn from_snapshot(
        snapshot: QueueSnapshot,
        callback: Option<QueueCallback>,
    ) -> Result<TimerQueue, SnapshotError> {
        let current_index = match snapshot.current_index {
            -1 => None,
            index if index >= 0 && (index as usize) < snapshot.timers.len() => {
                Some(index as usize)
            }
            index => {
                return Err(SnapshotError::Invalid(format!(
                    "queue {} has current_index {} for {} timers",
                    snapshot.queue_id,
                    index,
                    snapshot.timers.len()
                )))
            }
        };
        if snapshot.status.is_active() != current_index.is_some() {
            return Err(SnapshotError::Invalid(format!(
                "queue {} is {} with current_index {}",
                snapshot.queue_id, snapshot.status, snapshot.current_index
            )));
        }
        check_timer_statuses(&snapshot, current_index)?;

        let queue = TimerQueue::with_state(
            snapshot.queue_id,
            snapshot.name,
            QueueState {
                status: snapshot.status,
                current_index,
                timers: Vec::with_capacity(snapshot.timers.len()),
            },
        );
        queue.set_callback(callback);

        {
            let shared = &queue.shared;
            // Restored countdowns may complete before the list is filled; their
            // handlers wait on `ops` until it is.
            let _ops = lock(&shared.ops);
            for timer_snapshot in snapshot.timers {
                let timer =
                    Timer::from_snapshot(timer_snapshot, Some(Shared::timer_handler(shared)))?;
                lock(&shared.state).timers.push(timer);
            }

            let stalled = {
                let state = lock(&shared.state);
                state.status == TimerStatus::Running
                    && state
                        .current()
                        .is_some_and(|timer| timer.status() == TimerStatus::Completed)
            };
            if stalled {
                info!(queue_id = %shared.id, "restored queue advancing past a finished timer");
                catch_up(shared)?;
            }
        }
        Ok(queue)
    }
}

/// Rejects snapshots whose timer statuses contradict the queue's.
///
/// Only the timer at `current_index` may be active, and it must match the
/// queue: RUNNING or PAUSED alike, or COMPLETED under a RUNNING queue that
/// still has to move on.
fn check_timer_statuses(
    snapshot: &QueueSnapshot,
    current_index: Option<usize>,
) -> Result<(), SnapshotError> {
    for (index, timer) in snapshot.timers.iter().enumerate() {
        let consistent = if Some(index) == current_index {
            timer.status == snapshot.status
                || (snapshot.status == TimerStatus::Running
                    && timer.status == TimerStatus::Completed)
        } else {
            !timer.status.is_active()
        };
        if !consistent {
            return Err(SnapshotError::Invalid(format!(
                "queue {} is {} but timer {} ({}) is {}",
                snapshot.queue_id, snapshot.status, index, timer.timer_id, timer.status
            )));
        }
    }
    Ok(())
}

/// Moves a restored queue past a timer that finished while it was persisted.
fn catch_up(shared: &Shared) -> Result<(), SnapshotError> {
    let has_next = {
        let state = lock(&shared.state);
        state.current_index.map_or(0, |i| i + 1) < state.timers.len()
    };
    if !has_next {
        let mut state = lock(&shared.state);
        state.current_index = None;
        state.status = TimerStatus::Completed;
        return Ok(());
    }
    if Handle::try_current().is_err() {
        return Err(SnapshotError::NoRuntime(shared.id.clone()));
    }
    shared.start_next();
    Ok(())
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.shared.state);
        f.debug_struct("TimerQueue")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("status", &state.status)
            .field("current_index", &state.current_index)
            .field("timers", &state.timers)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
