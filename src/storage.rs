//! Durable key-value slots and the task snapshot stored in them.
//!
//! Each slot holds one serialized blob addressed by a fixed key:
//!
//! ```text
//! <data dir>/
//!   config.toml                 # optional settings
//!   taskmaster_tasks.json       # versioned task snapshot
//!   taskmaster_tasks.json.lock  # advisory lock for the snapshot
//!   ui-storage.json             # UI preferences (dark mode)
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{self, DEFAULT_LOCK_TIMEOUT_MS};
use crate::task::{Task, CATEGORY_MAX_LEN, DESCRIPTION_MAX_LEN, TITLE_MAX_LEN};

/// Default slot key for the task collection
pub const TASKS_KEY: &str = "taskmaster_tasks";

/// Default slot key for UI preferences
pub const PREFERENCES_KEY: &str = "ui-storage";

/// Schema tag written into every task snapshot
pub const TASKS_SCHEMA_VERSION: &str = "taskmaster.tasks.v1";

const SLOT_EXTENSION: &str = "json";

/// A durable key-value store holding one text blob per key.
pub trait Storage: fmt::Debug {
    /// Read the blob at `key`; `Ok(None)` if nothing was ever written.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob at `key`.
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// Slots stored as `<key>.json` files under a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    lock_timeout_ms: u64,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Path of the file backing `key`
    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{SLOT_EXTENSION}"))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        lock::read_locked_str(self.slot_path(key), self.lock_timeout_ms)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        lock::write_atomic_locked(self.slot_path(key), value.as_bytes(), self.lock_timeout_ms)
    }
}

/// In-process slots. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slots: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw blob at `key`, bypassing the trait.
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots
            .lock()
            .ok()
            .and_then(|slots| slots.get(key).cloned())
    }

    /// Overwrite a slot directly, e.g. to plant a corrupt payload.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(key.to_string(), value.into());
        }
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| Error::OperationFailed("memory storage poisoned".to_string()))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::OperationFailed(format!(
                "write to '{key}' rejected"
            )));
        }
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::OperationFailed("memory storage poisoned".to_string()))?;
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// On-disk form of the task collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub schema_version: String,
    pub saved_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
}

impl TaskSnapshot {
    pub fn new(tasks: Vec<Task>, saved_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            saved_at,
            tasks,
        }
    }

    /// Decode a stored blob, rejecting anything that is not a well-formed
    /// snapshot of the current schema.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| Error::PersistenceRead(format!("malformed payload: {err}")))?;

        if value.is_array() {
            return Err(Error::PersistenceRead(
                "unversioned task list (legacy format)".to_string(),
            ));
        }

        let version = value
            .get("schemaVersion")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| Error::PersistenceRead("missing schemaVersion".to_string()))?;
        if version != TASKS_SCHEMA_VERSION {
            return Err(Error::PersistenceRead(format!(
                "unsupported schema version '{version}'"
            )));
        }

        let snapshot: TaskSnapshot = serde_json::from_value(value)
            .map_err(|err| Error::PersistenceRead(format!("invalid task record: {err}")))?;
        snapshot.check_records()?;
        Ok(snapshot)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check_records(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(Error::PersistenceRead(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
            if !task.is_consistent() {
                return Err(Error::PersistenceRead(format!(
                    "task '{}' has completed flag out of sync with status '{}'",
                    task.id,
                    task.status()
                )));
            }
            if let Some(problem) = field_problem(task) {
                return Err(Error::PersistenceRead(format!(
                    "task '{}' {problem}",
                    task.id
                )));
            }
        }
        Ok(())
    }
}

fn field_problem(task: &Task) -> Option<&'static str> {
    let too_long = |value: &Option<String>, max: usize| {
        value
            .as_deref()
            .is_some_and(|value| value.chars().count() > max)
    };

    if task.id.trim().is_empty() {
        Some("has an empty id")
    } else if task.title.trim().is_empty() {
        Some("has an empty title")
    } else if task.title.chars().count() > TITLE_MAX_LEN {
        Some("has a title over the length limit")
    } else if too_long(&task.description, DESCRIPTION_MAX_LEN) {
        Some("has a description over the length limit")
    } else if too_long(&task.category, CATEGORY_MAX_LEN) {
        Some("has a category over the length limit")
    } else if task.updated_at < task.created_at {
        Some("was updated before it was created")
    } else {
        None
    }
}

/// Loads and saves the whole task collection in a single slot.
#[derive(Debug, Clone)]
pub struct TaskRepository {
    storage: Arc<dyn Storage>,
    key: String,
}

impl TaskRepository {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Repository on the default [`TASKS_KEY`] slot.
    pub fn with_default_key(storage: Arc<dyn Storage>) -> Self {
        Self::new(storage, TASKS_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored collection. `Ok(None)` means nothing was saved yet;
    /// every read or decode problem is a [`Error::PersistenceRead`].
    pub fn load(&self) -> Result<Option<Vec<Task>>> {
        let raw = self
            .storage
            .read(&self.key)
            .map_err(|err| Error::PersistenceRead(err.to_string()))?;
        match raw {
            Some(raw) => Ok(Some(TaskSnapshot::decode(&raw)?.tasks)),
            None => Ok(None),
        }
    }

    /// Write the full collection, in order.
    pub fn save(&self, tasks: &[Task], saved_at: DateTime<Utc>) -> Result<()> {
        let payload = TaskSnapshot::new(tasks.to_vec(), saved_at)
            .encode()
            .map_err(|err| Error::PersistenceWrite(err.to_string()))?;
        self.storage
            .write(&self.key, &payload)
            .map_err(|err| Error::PersistenceWrite(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPriority, TaskStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn sample_tasks() -> Vec<Task> {
        let mut done = Task::new("task_b", "File taxes", TaskPriority::High, now());
        done.set_status(TaskStatus::Completed);
        done.description = Some("before april".to_string());
        vec![Task::new("task_a", "Buy milk", TaskPriority::Low, now()), done]
    }

    #[test]
    fn memory_repository_round_trips() {
        let storage = MemoryStorage::new();
        let repository = TaskRepository::with_default_key(Arc::new(storage.clone()));
        assert!(repository.load().expect("load").is_none());

        let tasks = sample_tasks();
        repository.save(&tasks, now()).expect("save");
        assert_eq!(repository.load().expect("load"), Some(tasks));
        assert!(storage.get(TASKS_KEY).is_some());
    }

    #[test]
    fn file_repository_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        let repository = TaskRepository::with_default_key(Arc::new(storage.clone()));

        let tasks = sample_tasks();
        repository.save(&tasks, now()).expect("save");
        assert!(storage.slot_path(TASKS_KEY).exists());
        assert_eq!(repository.load().expect("load"), Some(tasks));
    }

    #[test]
    fn rejects_legacy_array_payload() {
        let storage = MemoryStorage::new();
        let legacy = serde_json::to_string(&sample_tasks()).expect("encode");
        storage.insert(TASKS_KEY, legacy);
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        assert!(matches!(repository.load(), Err(Error::PersistenceRead(_))));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let storage = MemoryStorage::new();
        let mut snapshot = serde_json::to_value(TaskSnapshot::new(sample_tasks(), now())).unwrap();
        snapshot["schemaVersion"] = serde_json::Value::String("taskmaster.tasks.v0".to_string());
        storage.insert(TASKS_KEY, snapshot.to_string());
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        assert!(matches!(repository.load(), Err(Error::PersistenceRead(_))));
    }

    #[test]
    fn rejects_status_completed_mismatch() {
        let storage = MemoryStorage::new();
        let mut snapshot = serde_json::to_value(TaskSnapshot::new(sample_tasks(), now())).unwrap();
        snapshot["tasks"][0]["completed"] = serde_json::Value::Bool(true);
        storage.insert(TASKS_KEY, snapshot.to_string());
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        assert!(matches!(repository.load(), Err(Error::PersistenceRead(_))));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let cases: Vec<(&str, serde_json::Value)> = vec![
            ("id", serde_json::json!("")),
            ("title", serde_json::json!("   ")),
            ("title", serde_json::json!("t".repeat(TITLE_MAX_LEN + 1))),
            ("description", serde_json::json!("d".repeat(DESCRIPTION_MAX_LEN + 1))),
            ("category", serde_json::json!("c".repeat(CATEGORY_MAX_LEN + 1))),
            ("updatedAt", serde_json::json!("2000-01-01T00:00:00Z")),
        ];

        for (field, value) in cases {
            let storage = MemoryStorage::new();
            let mut snapshot =
                serde_json::to_value(TaskSnapshot::new(sample_tasks(), now())).unwrap();
            snapshot["tasks"][0][field] = value;
            storage.insert(TASKS_KEY, snapshot.to_string());
            let repository = TaskRepository::with_default_key(Arc::new(storage));
            assert!(
                matches!(repository.load(), Err(Error::PersistenceRead(_))),
                "{field} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_fields_at_their_limits() {
        let storage = MemoryStorage::new();
        let mut tasks = sample_tasks();
        tasks[0].title = "t".repeat(TITLE_MAX_LEN);
        tasks[0].description = Some("d".repeat(DESCRIPTION_MAX_LEN));
        tasks[0].category = Some("c".repeat(CATEGORY_MAX_LEN));
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        repository.save(&tasks, now()).expect("save");
        assert_eq!(repository.load().expect("load"), Some(tasks));
    }

    #[test]
    fn rejects_garbage() {
        let storage = MemoryStorage::new();
        storage.insert(TASKS_KEY, "{not json");
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        assert!(matches!(repository.load(), Err(Error::PersistenceRead(_))));
    }

    #[test]
    fn write_failures_map_to_persistence_write() {
        let storage = MemoryStorage::new();
        storage.set_fail_writes(true);
        let repository = TaskRepository::with_default_key(Arc::new(storage));
        let result = repository.save(&sample_tasks(), now());
        assert!(matches!(result, Err(Error::PersistenceWrite(_))));
    }
}
