//! JSON file store.
//!
//! All records live in one pretty-printed `timers.json` document inside
//! the storage directory:
//!
//! ```json
//! { "timer": { "<id>": {..} }, "queue": {}, "step_timer": {} }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use super::error::StoreError;
use super::{SnapshotKind, StoreData, TimerStore};
use crate::engine::lock;

/// File name of the store document.
pub const STORE_FILE_NAME: &str = "timers.json";

/// Store persisted as a single JSON file.
///
/// Writes go to a temporary file that is then renamed over the document,
/// so a crash mid-write leaves the previous version intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens (and creates if needed) the store in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        Ok(Self {
            path: dir.join(STORE_FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the store document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreData, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreData::default()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(StoreData::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, data: &StoreData) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(data).map_err(StoreError::Serialize)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "store written");
        Ok(())
    }
}

impl TimerStore for JsonFileStore {
    fn save(&self, kind: SnapshotKind, id: &str, snapshot: Value) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let mut data = self.read()?;
        data.bucket_mut(kind).insert(id.to_string(), snapshot);
        self.write(&data)
    }

    fn load(&self, kind: SnapshotKind, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read()?.bucket(kind).get(id).cloned())
    }

    fn load_all(&self, kind: SnapshotKind) -> Result<BTreeMap<String, Value>, StoreError> {
        let mut data = self.read()?;
        Ok(std::mem::take(data.bucket_mut(kind)))
    }

    fn delete(&self, kind: SnapshotKind, id: &str) -> Result<bool, StoreError> {
        let _guard = lock(&self.write_lock);
        let mut data = self.read()?;
        if data.bucket_mut(kind).remove(id).is_none() {
            return Ok(false);
        }
        self.write(&data)?;
        Ok(true)
    }
}
