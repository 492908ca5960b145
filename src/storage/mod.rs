//! Persistence of timers, queues and step timers.
//!
//! A [`TimerStore`] holds raw JSON snapshots grouped by [`SnapshotKind`].
//! [`TimerStorage`] sits on top of a store and is the only way to turn
//! persisted records back into live engine objects.

pub mod error;
pub mod file;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{
    lock, QueueCallback, SnapshotError, StepCallback, StepTimer, Timer, TimerCallback, TimerQueue,
};
use crate::types::{QueueSnapshot, StepTimerSnapshot, TimerSnapshot, TimerStatus};

pub use error::StoreError;
pub use file::JsonFileStore;

// ============================================================================
// SnapshotKind
// ============================================================================

/// Record group inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Timer,
    Queue,
    StepTimer,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 3] = [
        SnapshotKind::Timer,
        SnapshotKind::Queue,
        SnapshotKind::StepTimer,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Timer => "timer",
            SnapshotKind::Queue => "queue",
            SnapshotKind::StepTimer => "step_timer",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TimerStore
// ============================================================================

/// Keyed storage for raw snapshots.
pub trait TimerStore: Send + Sync {
    /// Inserts or replaces a record.
    fn save(&self, kind: SnapshotKind, id: &str, snapshot: Value) -> Result<(), StoreError>;

    fn load(&self, kind: SnapshotKind, id: &str) -> Result<Option<Value>, StoreError>;

    fn load_all(&self, kind: SnapshotKind) -> Result<BTreeMap<String, Value>, StoreError>;

    /// Removes a record, returning whether it existed.
    fn delete(&self, kind: SnapshotKind, id: &str) -> Result<bool, StoreError>;
}

/// Every record of a store, grouped by kind.
///
/// This is also the on-disk document of [`JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreData {
    #[serde(default)]
    timer: BTreeMap<String, Value>,
    #[serde(default)]
    queue: BTreeMap<String, Value>,
    #[serde(default)]
    step_timer: BTreeMap<String, Value>,
}

impl StoreData {
    pub(crate) fn bucket(&self, kind: SnapshotKind) -> &BTreeMap<String, Value> {
        match kind {
            SnapshotKind::Timer => &self.timer,
            SnapshotKind::Queue => &self.queue,
            SnapshotKind::StepTimer => &self.step_timer,
        }
    }

    pub(crate) fn bucket_mut(&mut self, kind: SnapshotKind) -> &mut BTreeMap<String, Value> {
        match kind {
            SnapshotKind::Timer => &mut self.timer,
            SnapshotKind::Queue => &mut self.queue,
            SnapshotKind::StepTimer => &mut self.step_timer,
        }
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerStore for MemoryStore {
    fn save(&self, kind: SnapshotKind, id: &str, snapshot: Value) -> Result<(), StoreError> {
        lock(&self.data)
            .bucket_mut(kind)
            .insert(id.to_string(), snapshot);
        Ok(())
    }

    fn load(&self, kind: SnapshotKind, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(lock(&self.data).bucket(kind).get(id).cloned())
    }

    fn load_all(&self, kind: SnapshotKind) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(lock(&self.data).bucket(kind).clone())
    }

    fn delete(&self, kind: SnapshotKind, id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.data).bucket_mut(kind).remove(id).is_some())
    }
}

// ============================================================================
// TimerStorage
// ============================================================================

/// Result of loading every record of one kind.
#[derive(Debug)]
pub struct Loaded<T> {
    /// Successfully restored objects by id
    pub items: BTreeMap<String, T>,
    /// Records that could not be restored
    pub rejected: Vec<(String, SnapshotError)>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }
}

/// Summary of one stored record, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRecord {
    pub kind: SnapshotKind,
    pub id: String,
    pub name: String,
    pub status: TimerStatus,
    /// Remaining seconds when the record was saved
    pub remaining: u64,
}

/// Saves and restores engine objects through a [`TimerStore`].
#[derive(Debug)]
pub struct TimerStorage<S> {
    store: S,
}

impl<S: TimerStore> TimerStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn save<T: Serialize>(
        &self,
        kind: SnapshotKind,
        id: &str,
        snapshot: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(snapshot).map_err(StoreError::Serialize)?;
        self.store.save(kind, id, value)?;
        info!(%kind, id, "snapshot saved");
        Ok(())
    }

    fn load_with<T>(
        &self,
        kind: SnapshotKind,
        id: &str,
        restore: impl FnOnce(Value) -> Result<T, SnapshotError>,
    ) -> Result<Option<T>, StoreError> {
        match self.store.load(kind, id)? {
            Some(value) => Ok(Some(restore(value)?)),
            None => Ok(None),
        }
    }

    fn load_all_with<T>(
        &self,
        kind: SnapshotKind,
        restore: impl Fn(Value) -> Result<T, SnapshotError>,
    ) -> Result<Loaded<T>, StoreError> {
        let mut loaded = Loaded::default();
        for (id, value) in self.store.load_all(kind)? {
            match restore(value) {
                Ok(item) => {
                    loaded.items.insert(id, item);
                }
                Err(e) => {
                    warn!(%kind, %id, error = %e, "rejected stored record");
                    loaded.rejected.push((id, e));
                }
            }
        }
        Ok(loaded)
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    pub fn save_timer(&self, timer: &Timer) -> Result<(), StoreError> {
        self.save(SnapshotKind::Timer, timer.id(), &timer.to_snapshot())
    }

    /// Restores a timer, attaching `callback` as its observer.
    pub fn load_timer(
        &self,
        id: &str,
        callback: Option<TimerCallback>,
    ) -> Result<Option<Timer>, StoreError> {
        self.load_with(SnapshotKind::Timer, id, |value| {
            Timer::from_snapshot(serde_json::from_value(value)?, callback)
        })
    }

    pub fn load_all_timers(
        &self,
        callback: Option<TimerCallback>,
    ) -> Result<Loaded<Timer>, StoreError> {
        self.load_all_with(SnapshotKind::Timer, |value| {
            Timer::from_snapshot(serde_json::from_value(value)?, callback.clone())
        })
    }

    pub fn delete_timer(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(SnapshotKind::Timer, id)
    }

    // ------------------------------------------------------------------------
    // Queues
    // ------------------------------------------------------------------------

    pub fn save_queue(&self, queue: &TimerQueue) -> Result<(), StoreError> {
        self.save(SnapshotKind::Queue, queue.id(), &queue.to_snapshot())
    }

    pub fn load_queue(
        &self,
        id: &str,
        callback: Option<QueueCallback>,
    ) -> Result<Option<TimerQueue>, StoreError> {
        self.load_with(SnapshotKind::Queue, id, |value| {
            TimerQueue::from_snapshot(serde_json::from_value(value)?, callback)
        })
    }

    pub fn load_all_queues(
        &self,
        callback: Option<QueueCallback>,
    ) -> Result<Loaded<TimerQueue>, StoreError> {
        self.load_all_with(SnapshotKind::Queue, |value| {
            TimerQueue::from_snapshot(serde_json::from_value(value)?, callback.clone())
        })
    }

    pub fn delete_queue(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(SnapshotKind::Queue, id)
    }

    // ------------------------------------------------------------------------
    // Step timers
    // ------------------------------------------------------------------------

    pub fn save_step_timer(&self, step_timer: &StepTimer) -> Result<(), StoreError> {
        self.save(
            SnapshotKind::StepTimer,
            step_timer.id(),
            &step_timer.to_snapshot(),
        )
    }

    pub fn load_step_timer(
        &self,
        id: &str,
        callback: Option<StepCallback>,
    ) -> Result<Option<StepTimer>, StoreError> {
        self.load_with(SnapshotKind::StepTimer, id, |value| {
            StepTimer::from_snapshot(serde_json::from_value(value)?, callback)
        })
    }

    pub fn load_all_step_timers(
        &self,
        callback: Option<StepCallback>,
    ) -> Result<Loaded<StepTimer>, StoreError> {
        self.load_all_with(SnapshotKind::StepTimer, |value| {
            StepTimer::from_snapshot(serde_json::from_value(value)?, callback.clone())
        })
    }

    pub fn delete_step_timer(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(SnapshotKind::StepTimer, id)
    }

    // ------------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------------

    /// Summarizes every stored record without restoring it.
    pub fn records(&self) -> Result<Loaded<SavedRecord>, StoreError> {
        let mut all = Loaded::default();
        for kind in SnapshotKind::ALL {
            let loaded = self.load_all_with(kind, |value| summarize(kind, value))?;
            all.items.extend(loaded.items);
            all.rejected.extend(loaded.rejected);
        }
        Ok(all)
    }
}

fn summarize(kind: SnapshotKind, value: Value) -> Result<SavedRecord, SnapshotError> {
    let record = match kind {
        SnapshotKind::Timer => {
            let s: TimerSnapshot = serde_json::from_value(value)?;
            SavedRecord {
                kind,
                id: s.timer_id,
                name: s.product_name,
                status: s.status,
                remaining: s.remaining_time,
            }
        }
        SnapshotKind::Queue => {
            let s: QueueSnapshot = serde_json::from_value(value)?;
            SavedRecord {
                kind,
                id: s.queue_id,
                name: s.name,
                status: s.status,
                remaining: s.total_remaining_time,
            }
        }
        SnapshotKind::StepTimer => {
            let s: StepTimerSnapshot = serde_json::from_value(value)?;
            SavedRecord {
                kind,
                id: s.step_timer_id,
                name: s.product_name,
                status: s.timer_queue.status,
                remaining: s.remaining_time,
            }
        }
    };
    Ok(record)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage() -> TimerStorage<MemoryStore> {
        TimerStorage::new(MemoryStore::new())
    }

    mod kind_tests {
        use super::*;

        #[test]
        fn test_kind_names() {
            for kind in SnapshotKind::ALL {
                let json = serde_json::to_string(&kind).unwrap();
                assert_eq!(json, format!("\"{}\"", kind.as_str()));
            }
            assert_eq!(SnapshotKind::StepTimer.to_string(), "step_timer");
        }
    }

    mod memory_store_tests {
        use super::*;

        #[test]
        fn test_save_load_delete() {
            let store = MemoryStore::new();
            store
                .save(SnapshotKind::Timer, "t1", json!({"a": 1}))
                .unwrap();

            assert_eq!(
                store.load(SnapshotKind::Timer, "t1").unwrap(),
                Some(json!({"a": 1}))
            );
            assert_eq!(store.load(SnapshotKind::Queue, "t1").unwrap(), None);
            assert_eq!(store.load_all(SnapshotKind::Timer).unwrap().len(), 1);

            assert!(store.delete(SnapshotKind::Timer, "t1").unwrap());
            assert!(!store.delete(SnapshotKind::Timer, "t1").unwrap());
        }
    }

    mod timer_storage_tests {
        use super::*;

        #[test]
        fn test_timer_round_trip() {
            let storage = storage();
            let timer = Timer::new("galbi", "Galbi", 600);
            storage.save_timer(&timer).unwrap();

            let restored = storage.load_timer(timer.id(), None).unwrap().unwrap();
            assert_eq!(restored.id(), timer.id());
            assert_eq!(restored.subject_name(), "Galbi");
            assert_eq!(restored.status(), TimerStatus::Ready);

            assert!(storage.delete_timer(timer.id()).unwrap());
            assert!(storage.load_timer(timer.id(), None).unwrap().is_none());
        }

        #[test]
        fn test_malformed_record_is_snapshot_error() {
            let storage = storage();
            storage
                .store()
                .save(SnapshotKind::Timer, "bad", json!({"timer_id": "bad", "status": "boiling"}))
                .unwrap();

            let err = storage.load_timer("bad", None).unwrap_err();
            assert!(matches!(
                err,
                StoreError::Snapshot(SnapshotError::Malformed(_))
            ));
        }

        #[test]
        fn test_load_all_reports_rejected_records() {
            let storage = storage();
            let good = Timer::new("galbi", "Galbi", 600);
            storage.save_timer(&good).unwrap();
            storage
                .store()
                .save(SnapshotKind::Timer, "bad", json!({"timer_id": "bad"}))
                .unwrap();

            let loaded = storage.load_all_timers(None).unwrap();
            assert_eq!(loaded.items.len(), 1);
            assert!(loaded.items.contains_key(good.id()));
            assert_eq!(loaded.rejected.len(), 1);
            assert_eq!(loaded.rejected[0].0, "bad");
        }

        #[test]
        fn test_step_timer_and_queue_round_trip() {
            let storage = storage();
            let step_timer = StepTimer::new(
                "ramyun",
                "Ramyun",
                [("boil water", 180), ("add noodles", 240)],
            )
            .unwrap();
            storage.save_step_timer(&step_timer).unwrap();

            let queue = TimerQueue::new("Banchan");
            queue.add_timer_from_spec("kongnamul", "Kongnamul", 300);
            storage.save_queue(&queue).unwrap();

            let restored = storage
                .load_step_timer(step_timer.id(), None)
                .unwrap()
                .unwrap();
            assert_eq!(restored.total_duration(), 420);
            assert_eq!(restored.steps(), step_timer.steps());

            let restored = storage.load_queue(queue.id(), None).unwrap().unwrap();
            assert_eq!(restored.len(), 1);
            assert_eq!(storage.load_all_queues(None).unwrap().items.len(), 1);
            assert_eq!(storage.load_all_step_timers(None).unwrap().items.len(), 1);

            assert!(storage.delete_queue(queue.id()).unwrap());
            assert!(storage.delete_step_timer(step_timer.id()).unwrap());
        }

        #[test]
        fn test_records_summarize_every_kind() {
            let storage = storage();
            let timer = Timer::new("galbi", "Galbi", 600);
            storage.save_timer(&timer).unwrap();
            let step_timer =
                StepTimer::new("ramyun", "Ramyun", [("boil water", 180)]).unwrap();
            storage.save_step_timer(&step_timer).unwrap();

            let records = storage.records().unwrap();
            assert!(records.rejected.is_empty());
            let record = &records.items[timer.id()];
            assert_eq!(record.kind, SnapshotKind::Timer);
            assert_eq!(record.name, "Galbi");
            assert_eq!(record.remaining, 600);
            assert_eq!(records.items[step_timer.id()].remaining, 180);
        }
    }
}
