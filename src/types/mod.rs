//! Core data types for the cooking timer engine.
//!
//! This module defines the data structures shared by every layer:
//! - Timer status values and the state machine predicates
//! - Status events emitted by timers, queues and step timers
//! - Serializable snapshots used for persistence

use serde::{Deserialize, Serialize};

// ============================================================================
// TimerStatus
// ============================================================================

/// Lifecycle state of a timer, a queue or a step timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    /// Created, not started yet
    #[default]
    Ready,
    /// Counting down
    Running,
    /// Countdown frozen
    Paused,
    /// Countdown reached zero
    Completed,
    /// Aborted before reaching zero
    Cancelled,
}

impl TimerStatus {
    /// Returns the string representation used in snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Ready => "ready",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
            TimerStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if no operation may leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerStatus::Completed | TimerStatus::Cancelled)
    }

    /// Returns true if a countdown has been started and not finished.
    pub fn is_active(&self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Events
// ============================================================================

/// Status change of a single timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    /// Timer that changed
    pub timer_id: String,
    /// New status of that timer
    pub status: TimerStatus,
}

/// Status change observed by a timer queue.
///
/// Queue-level transitions carry `timer: None`. Events forwarded from the
/// queue's timers carry the originating [`TimerEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEvent {
    /// Queue that emitted the event
    pub queue_id: String,
    /// Aggregate queue status at emission time
    pub status: TimerStatus,
    /// Index of the active timer at emission time
    pub current_index: Option<usize>,
    /// Forwarded timer event, if any
    pub timer: Option<TimerEvent>,
}

/// Step-aware status change emitted by a step timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    /// Step timer that emitted the event
    pub step_timer_id: String,
    /// Active step index, `None` once cancelled or completed
    pub step: Option<usize>,
    /// Description of the active step, empty when `step` is `None`
    pub description: String,
    /// New status
    pub status: TimerStatus,
}

// ============================================================================
// Snapshots
// ============================================================================

/// Persisted form of a timer.
///
/// `remaining_time` and `progress` are derived at save time and ignored on
/// reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub timer_id: String,
    pub product_id: String,
    pub product_name: String,
    /// Total seconds
    pub duration: u64,
    /// Epoch seconds
    pub start_time: f64,
    /// Epoch seconds
    pub end_time: f64,
    /// Epoch seconds of the last pause
    pub paused_time: f64,
    /// Total seconds spent paused
    pub elapsed_pause_time: f64,
    pub status: TimerStatus,
    #[serde(default)]
    pub remaining_time: u64,
    #[serde(default)]
    pub progress: f64,
}

/// Persisted form of a timer queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_id: String,
    pub name: String,
    /// `-1` when no timer is active
    pub current_index: i64,
    pub status: TimerStatus,
    pub timers: Vec<TimerSnapshot>,
    #[serde(default)]
    pub total_remaining_time: u64,
    #[serde(default)]
    pub progress: f64,
}

/// Persisted form of a step timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTimerSnapshot {
    pub step_timer_id: String,
    pub product_id: String,
    pub product_name: String,
    /// `(description, seconds)` pairs, serialized as two-element arrays
    pub steps: Vec<(String, u64)>,
    /// `-1` when no step is active
    pub current_step: i64,
    pub timer_queue: QueueSnapshot,
    #[serde(default)]
    pub total_duration: u64,
    #[serde(default)]
    pub remaining_time: u64,
    #[serde(default)]
    pub progress: f64,
}

/// Converts an optional index to the `-1 = none` snapshot encoding.
pub(crate) fn index_to_wire(index: Option<usize>) -> i64 {
    index.map_or(-1, |i| i as i64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod timer_status_tests {
        use super::*;

        #[test]
        fn test_default_is_ready() {
            assert_eq!(TimerStatus::default(), TimerStatus::Ready);
        }

        #[test]
        fn test_as_str_matches_serde() {
            for status in [
                TimerStatus::Ready,
                TimerStatus::Running,
                TimerStatus::Paused,
                TimerStatus::Completed,
                TimerStatus::Cancelled,
            ] {
                let json = serde_json::to_string(&status).unwrap();
                assert_eq!(json, format!("\"{}\"", status.as_str()));
            }
        }

        #[test]
        fn test_terminal_and_active() {
            assert!(TimerStatus::Completed.is_terminal());
            assert!(TimerStatus::Cancelled.is_terminal());
            assert!(!TimerStatus::Paused.is_terminal());

            assert!(TimerStatus::Running.is_active());
            assert!(TimerStatus::Paused.is_active());
            assert!(!TimerStatus::Ready.is_active());
        }

        #[test]
        fn test_unknown_status_rejected() {
            let result: Result<TimerStatus, _> = serde_json::from_str("\"boiling\"");
            assert!(result.is_err());
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_steps_serialize_as_pairs() {
            let snapshot = StepTimerSnapshot {
                step_timer_id: "st".to_string(),
                product_id: "ramyun".to_string(),
                product_name: "Ramyun".to_string(),
                steps: vec![("boil water".to_string(), 60)],
                current_step: -1,
                timer_queue: QueueSnapshot {
                    queue_id: "q".to_string(),
                    name: "Ramyun".to_string(),
                    current_index: -1,
                    status: TimerStatus::Ready,
                    timers: Vec::new(),
                    total_remaining_time: 0,
                    progress: 0.0,
                },
                total_duration: 60,
                remaining_time: 60,
                progress: 0.0,
            };

            let json = serde_json::to_value(&snapshot).unwrap();
            assert_eq!(json["steps"], serde_json::json!([["boil water", 60]]));
            assert_eq!(json["current_step"], -1);
        }

        #[test]
        fn test_derived_fields_optional() {
            let json = r#"{
                "timer_id": "t1",
                "product_id": "p1",
                "product_name": "Mandu",
                "duration": 300,
                "start_time": 0.0,
                "end_time": 0.0,
                "paused_time": 0.0,
                "elapsed_pause_time": 0.0,
                "status": "ready"
            }"#;
            let snapshot: TimerSnapshot = serde_json::from_str(json).unwrap();
            assert_eq!(snapshot.duration, 300);
            assert_eq!(snapshot.remaining_time, 0);
        }

        #[test]
        fn test_missing_required_field_rejected() {
            let json = r#"{"timer_id": "t1", "product_id": "p1", "status": "ready"}"#;
            let result: Result<TimerSnapshot, _> = serde_json::from_str(json);
            assert!(result.is_err());
        }

        #[test]
        fn test_index_to_wire() {
            assert_eq!(index_to_wire(None), -1);
            assert_eq!(index_to_wire(Some(3)), 3);
        }
    }
}
