//! Step timer: a cooking process made of ordered timed steps.
//!
//! Each step becomes one timer in an owned [`TimerQueue`]. The step timer
//! translates queue events into step-aware [`StepEvent`]s and notifies
//! once when the last step finishes.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use super::error::{EngineError, SnapshotError};
use super::queue::{QueueCallback, TimerQueue};
use super::{lock, new_id};
use crate::notification::Notifier;
use crate::types::{index_to_wire, QueueEvent, StepEvent, StepTimerSnapshot, TimerStatus};

/// Observer invoked on step transitions.
pub type StepCallback = Arc<dyn Fn(&StepEvent) + Send + Sync>;

/// The active step and its remaining time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentStep {
    pub index: Option<usize>,
    pub description: String,
    /// Remaining whole seconds of this step
    pub remaining: u64,
}

/// Subject name given to the timer of step `index` (0-based).
fn step_subject_name(process: &str, index: usize, description: &str) -> String {
    format!("{process} — step {}: {description}", index + 1)
}

// ============================================================================
// Shared
// ============================================================================

struct Shared {
    id: String,
    subject_id: String,
    subject_name: String,
    steps: Vec<(String, u64)>,
    current_step: Mutex<Option<usize>>,
    observer: Mutex<Option<StepCallback>>,
    notifier: Mutex<Option<Arc<dyn Notifier>>>,
}

impl Shared {
    fn description(&self, step: Option<usize>) -> String {
        step.and_then(|index| self.steps.get(index))
            .map(|(description, _)| description.clone())
            .unwrap_or_default()
    }

    fn emit(&self, step: Option<usize>, status: TimerStatus) {
        let observer = lock(&self.observer).clone();
        if let Some(observer) = observer {
            observer(&StepEvent {
                step_timer_id: self.id.clone(),
                step,
                description: self.description(step),
                status,
            });
        }
    }

    fn queue_handler(shared: &Arc<Shared>) -> QueueCallback {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        Arc::new(move |event: &QueueEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.on_queue_event(event);
            }
        })
    }

    fn on_queue_event(&self, event: &QueueEvent) {
        match &event.timer {
            Some(timer) if timer.status == TimerStatus::Running => {
                let Some(index) = event.current_index.filter(|&i| i < self.steps.len()) else {
                    return;
                };
                let changed = lock(&self.current_step).replace(index) != Some(index);
                if changed {
                    debug!(step_timer_id = %self.id, step = index, "step started");
                    self.emit(Some(index), TimerStatus::Running);
                }
            }
            None if event.status == TimerStatus::Completed => self.complete(),
            _ => {}
        }
    }

    /// Fires completion once per run.
    fn complete(&self) {
        if lock(&self.current_step).take().is_none() {
            return;
        }
        info!(step_timer_id = %self.id, process = %self.subject_name, "all steps completed");
        self.emit(None, TimerStatus::Completed);

        let notifier = lock(&self.notifier).clone();
        if let Some(notifier) = notifier {
            notifier.deliver(
                "Cooking complete",
                &format!(
                    "{} — all {} steps are done!",
                    self.subject_name,
                    self.steps.len()
                ),
            );
        }
    }
}

// ============================================================================
// StepTimer
// ============================================================================

/// A named cooking process run step by step.
pub struct StepTimer {
    shared: Arc<Shared>,
    queue: TimerQueue,
}

impl StepTimer {
    /// Builds a step timer with one queued timer per step.
    pub fn new<I, D>(
        subject_id: impl Into<String>,
        subject_name: impl Into<String>,
        steps: I,
    ) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (D, u64)>,
        D: Into<String>,
    {
        let subject_id = subject_id.into();
        let subject_name = subject_name.into();
        let steps: Vec<(String, u64)> = steps
            .into_iter()
            .map(|(description, duration)| (description.into(), duration))
            .collect();
        if steps.is_empty() {
            return Err(EngineError::NoSteps(subject_name));
        }

        let shared = Arc::new(Shared {
            id: new_id(),
            subject_id,
            subject_name,
            steps,
            current_step: Mutex::new(None),
            observer: Mutex::new(None),
            notifier: Mutex::new(None),
        });

        let queue = TimerQueue::new(shared.subject_name.clone())
            .with_callback(Shared::queue_handler(&shared));
        for (index, (description, duration)) in shared.steps.iter().enumerate() {
            queue.add_timer_from_spec(
                shared.subject_id.clone(),
                step_subject_name(&shared.subject_name, index, description),
                *duration,
            );
        }

        Ok(Self { shared, queue })
    }

    /// Sets the observer, builder style.
    #[must_use]
    pub fn with_callback(self, callback: StepCallback) -> Self {
        self.set_callback(Some(callback));
        self
    }

    /// Sets the notifier used when the last step finishes, builder style.
    #[must_use]
    pub fn with_notifier(self, notifier: Arc<dyn Notifier>) -> Self {
        self.set_notifier(Some(notifier));
        self
    }

    pub fn set_callback(&self, callback: Option<StepCallback>) {
        *lock(&self.shared.observer) = callback;
    }

    pub fn set_notifier(&self, notifier: Option<Arc<dyn Notifier>>) {
        *lock(&self.shared.notifier) = notifier;
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Starts the first step.
    ///
    /// The step-0 RUNNING event is emitted before this returns. A finished
    /// process starts over; a paused one is resumed.
    pub fn start(&self) -> bool {
        if self.queue.status() == TimerStatus::Paused {
            return self.resume();
        }
        if self.queue.status() == TimerStatus::Running {
            return false;
        }

        let previous = lock(&self.shared.current_step).take();
        if !self.queue.start() {
            *lock(&self.shared.current_step) = previous;
            return false;
        }
        true
    }

    pub fn pause(&self) -> bool {
        self.transition(TimerQueue::pause, TimerStatus::Paused)
    }

    pub fn resume(&self) -> bool {
        self.transition(TimerQueue::resume, TimerStatus::Running)
    }

    fn transition(&self, apply: fn(&TimerQueue) -> bool, status: TimerStatus) -> bool {
        if !apply(&self.queue) {
            return false;
        }
        let step = *lock(&self.shared.current_step);
        self.shared.emit(step, status);
        true
    }

    /// Abandons the process.
    pub fn cancel(&self) -> bool {
        let cancelled = self.queue.cancel();
        *lock(&self.shared.current_step) = None;
        if cancelled {
            debug!(step_timer_id = %self.shared.id, "step timer cancelled");
            self.shared.emit(None, TimerStatus::Cancelled);
        }
        cancelled
    }

    /// Ends the active step early and starts the next one.
    ///
    /// Skipping the last step completes the process. Returns false when no
    /// step is active.
    pub fn skip_step(&self) -> bool {
        if !self.queue.status().is_active() {
            return false;
        }
        if self.queue.skip_current() {
            return true;
        }
        if self.queue.status() == TimerStatus::Completed {
            self.shared.complete();
            return true;
        }
        false
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

    #[must_use]
    pub fn steps(&self) -> &[(String, u64)] {
        &self.shared.steps
    }

    /// The active step, or an empty [`CurrentStep`] when idle.
    #[must_use]
    pub fn current_step(&self) -> CurrentStep {
        let index = *lock(&self.shared.current_step);
        match index {
            Some(index) => CurrentStep {
                index: Some(index),
                description: self.shared.description(Some(index)),
                remaining: self.queue.remaining_time(),
            },
            None => CurrentStep::default(),
        }
    }

    /// Sum of every step's duration in seconds.
    #[must_use]
    pub fn total_duration(&self) -> u64 {
        self.shared.steps.iter().map(|(_, duration)| duration).sum()
    }

    #[must_use]
    pub fn remaining_time(&self) -> u64 {
        self.queue.total_remaining_time()
    }

    #[must_use]
    pub fn progress_percentage(&self) -> f64 {
        self.queue.progress_percentage()
    }

    #[must_use]
    pub fn status(&self) -> TimerStatus {
        self.queue.status()
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn to_snapshot(&self) -> StepTimerSnapshot {
        let shared = &self.shared;
        StepTimerSnapshot {
            step_timer_id: shared.id.clone(),
            product_id: shared.subject_id.clone(),
            product_name: shared.subject_name.clone(),
            steps: shared.steps.clone(),
            current_step: index_to_wire(*lock(&shared.current_step)),
            timer_queue: self.queue.to_snapshot(),
            total_duration: self.total_duration(),
            remaining_time: self.remaining_time(),
            progress: self.progress_percentage(),
        }
    }

    /// Rebuilds a step timer and its queue from a snapshot.
    pub(crate) fn from_snapshot(
        snapshot: StepTimerSnapshot,
        callback: Option<StepCallback>,
    ) -> Result<StepTimer, SnapshotError> {
        let id = snapshot.step_timer_id;
        if snapshot.steps.is_empty() {
            return Err(SnapshotError::Invalid(format!("step timer {id} has no steps")));
        }
        if snapshot.steps.len() != snapshot.timer_queue.timers.len() {
            return Err(SnapshotError::Invalid(format!(
                "step timer {id} has {} steps but {} timers",
                snapshot.steps.len(),
                snapshot.timer_queue.timers.len()
            )));
        }
        let mismatch = snapshot
            .steps
            .iter()
            .zip(&snapshot.timer_queue.timers)
            .position(|((_, seconds), timer)| *seconds != timer.duration);
        if let Some(index) = mismatch {
            return Err(SnapshotError::Invalid(format!(
                "step timer {id} step {index} lasts {}s but its timer lasts {}s",
                snapshot.steps[index].1, snapshot.timer_queue.timers[index].duration
            )));
        }
        let current_step = match snapshot.current_step {
            -1 => None,
            index if index >= 0 && (index as usize) < snapshot.steps.len() => {
                Some(index as usize)
            }
            index => {
                return Err(SnapshotError::Invalid(format!(
                    "step timer {id} has current_step {index}"
                )))
            }
        };

        let shared = Arc::new(Shared {
            id,
            subject_id: snapshot.product_id,
            subject_name: snapshot.product_name,
            steps: snapshot.steps,
            current_step: Mutex::new(current_step),
            observer: Mutex::new(callback),
            notifier: Mutex::new(None),
        });
        let queue =
            TimerQueue::from_snapshot(snapshot.timer_queue, Some(Shared::queue_handler(&shared)))?;

        // The queue may have moved on while it was persisted
        *lock(&shared.current_step) = queue.current_index();

        Ok(Self { shared, queue })
    }
}

impl fmt::Debug for StepTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepTimer")
            .field("id", &self.shared.id)
            .field("subject_name", &self.shared.subject_name)
            .field("steps", &self.shared.steps)
            .field("current_step", &*lock(&self.shared.current_step))
            .field("queue", &self.queue)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
