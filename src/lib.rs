//! Cook Timer Library
//!
//! Countdown timers for cooking. It includes:
//! - Timer engine: single timers, ordered queues and multi-step processes
//! - Snapshots and persistence through a pluggable store
//! - Completion notifications (console, sound, desktop)
//! - Settings loading
//! - CLI command parsing and display utilities

pub mod cli;
pub mod config;
pub mod engine;
pub mod notification;
pub mod storage;
pub mod types;

// Re-export commonly used types for convenience
pub use config::{Settings, SettingsError};
pub use engine::{
    CurrentStep, EngineError, QueueCallback, SnapshotError, StepCallback, StepTimer, Timer,
    TimerCallback, TimerQueue, TICK_INTERVAL,
};
pub use notification::{MockNotifier, NotificationConfig, NotificationError, Notifier, SystemNotifier};
pub use storage::{
    JsonFileStore, Loaded, MemoryStore, SavedRecord, SnapshotKind, StoreError, TimerStorage,
    TimerStore,
};
pub use types::{
    QueueEvent, QueueSnapshot, StepEvent, StepTimerSnapshot, TimerEvent, TimerSnapshot,
    TimerStatus,
};
