//! Key-value persistence for board layout, task cache and export settings.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::board::{BoardSnapshot, BoardState, TaskIndex};
use crate::sync::todos::{DEFAULT_API_LIMIT, DEFAULT_API_SKIP, FetchParams};

pub const BOARD_STATE: &str = "boardState";
pub const ALL_TASKS: &str = "allTasks";
pub const API_LIMIT: &str = "apiLimit";
pub const CURRENT_SKIP: &str = "currentSkip";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file {0} does not hold a JSON object")]
    NotAnObject(PathBuf),
    #[error("state store is unavailable")]
    Poisoned,
}

/// Host storage contract: read a set of keys, write a set of keys.
/// A `set` either stores every key or fails as a whole.
pub trait StateStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;
    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError>;
}

/// JSON object file, replaced atomically on every write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-merge-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject(self.path.clone())),
        }
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))
    }
}

impl StateStore for FileStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut all = self.read_all()?;
        Ok(keys
            .iter()
            .filter_map(|k| all.remove(*k).map(|v| (k.to_string(), v)))
            .collect())
    }

    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut all = self.read_all()?;
        all.extend(items);
        self.write_all(&all)
    }
}

/// In-process store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    fn set(&self, items: Map<String, Value>) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.extend(items);
        Ok(())
    }
}

/// Saved board and task index, if both exist and the index is non-empty.
/// A snapshot that no longer parses is treated as absent so the board can be reseeded.
pub fn load_board_snapshot<S: StateStore + ?Sized>(
    store: &S,
) -> Result<Option<BoardSnapshot>, StoreError> {
    let mut values = store.get(&[BOARD_STATE, ALL_TASKS])?;
    let (Some(state), Some(tasks)) = (values.remove(BOARD_STATE), values.remove(ALL_TASKS)) else {
        return Ok(None);
    };

    let board_state: BoardState = match serde_json::from_value(state) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Ignoring unreadable saved board state: {}", e);
            return Ok(None);
        }
    };
    let all_tasks: TaskIndex = match serde_json::from_value(tasks) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("Ignoring unreadable saved task index: {}", e);
            return Ok(None);
        }
    };

    if all_tasks.is_empty() {
        return Ok(None);
    }
    Ok(Some(BoardSnapshot {
        board_state,
        all_tasks,
    }))
}

/// Write board state and task index in a single `set`.
pub fn save_board_snapshot<S: StateStore + ?Sized>(
    store: &S,
    snapshot: &BoardSnapshot,
) -> Result<(), StoreError> {
    let mut items = Map::new();
    items.insert(
        BOARD_STATE.to_string(),
        serde_json::to_value(&snapshot.board_state)?,
    );
    items.insert(ALL_TASKS.to_string(), serde_json::to_value(&snapshot.all_tasks)?);
    store.set(items)
}

fn read_u64(values: &Map<String, Value>, key: &str, default: u64) -> u64 {
    match values.get(key) {
        None | Some(Value::Null) => default,
        Some(v) => v.as_u64().unwrap_or_else(|| {
            log::warn!("Stored {} is not a non-negative integer ({}), using {}", key, v, default);
            default
        }),
    }
}

/// Current pagination settings, with defaults for absent keys.
pub fn load_fetch_params<S: StateStore + ?Sized>(store: &S) -> Result<FetchParams, StoreError> {
    let values = store.get(&[CURRENT_SKIP, API_LIMIT])?;
    Ok(FetchParams {
        skip: read_u64(&values, CURRENT_SKIP, DEFAULT_API_SKIP),
        limit: read_u64(&values, API_LIMIT, DEFAULT_API_LIMIT),
    })
}

/// Persist both settings fields, as the options page does.
pub fn save_options<S: StateStore + ?Sized>(store: &S, params: FetchParams) -> Result<(), StoreError> {
    let mut items = Map::new();
    items.insert(API_LIMIT.to_string(), Value::from(params.limit));
    items.insert(CURRENT_SKIP.to_string(), Value::from(params.skip));
    store.set(items)
}

pub fn set_current_skip<S: StateStore + ?Sized>(store: &S, skip: u64) -> Result<(), StoreError> {
    let mut items = Map::new();
    items.insert(CURRENT_SKIP.to_string(), Value::from(skip));
    store.set(items)
}

/// Move the cursor one page past `params`. Returns the new cursor.
pub fn advance_cursor<S: StateStore + ?Sized>(store: &S, params: FetchParams) -> Result<u64, StoreError> {
    let next = params.next().skip;
    set_current_skip(store, next)?;
    Ok(next)
}

/// First-run initialization: write default pagination values for absent keys.
/// Returns true if anything was written.
pub fn initialize_defaults<S: StateStore + ?Sized>(store: &S) -> Result<bool, StoreError> {
    let values = store.get(&[CURRENT_SKIP, API_LIMIT])?;
    let mut items = Map::new();
    if !values.contains_key(CURRENT_SKIP) {
        log::info!("Initializing skip value to {}.", DEFAULT_API_SKIP);
        items.insert(CURRENT_SKIP.to_string(), Value::from(DEFAULT_API_SKIP));
    }
    if !values.contains_key(API_LIMIT) {
        log::info!("Initializing API limit to {}.", DEFAULT_API_LIMIT);
        items.insert(API_LIMIT.to_string(), Value::from(DEFAULT_API_LIMIT));
    }
    if items.is_empty() {
        return Ok(false);
    }
    store.set(items)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(&path);
        let mut items = Map::new();
        items.insert(API_LIMIT.into(), json!(5));
        store.set(items).unwrap();
        set_current_skip(&store, 10).unwrap();

        let reopened = FileStore::new(&path);
        let params = load_fetch_params(&reopened).unwrap();
        assert_eq!(params, FetchParams { skip: 10, limit: 5 });
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn get_returns_only_present_keys() {
        let store = MemoryStore::new();
        set_current_skip(&store, 3).unwrap();
        let values = store.get(&[CURRENT_SKIP, API_LIMIT]).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[CURRENT_SKIP], json!(3));
    }

    #[test]
    fn fetch_params_default_when_absent_or_malformed() {
        let store = MemoryStore::new();
        assert_eq!(load_fetch_params(&store).unwrap(), FetchParams::default());

        let mut items = Map::new();
        items.insert(API_LIMIT.into(), json!("lots"));
        store.set(items).unwrap();
        assert_eq!(load_fetch_params(&store).unwrap().limit, DEFAULT_API_LIMIT);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(store.get(&[API_LIMIT]), Err(StoreError::NotAnObject(_))));
        assert!(store.set(Map::new()).is_err());
    }

    #[test]
    fn empty_task_index_means_no_snapshot() {
        let store = MemoryStore::new();
        save_board_snapshot(&store, &BoardSnapshot::default()).unwrap();
        assert!(load_board_snapshot(&store).unwrap().is_none());
    }

    #[test]
    fn initialize_defaults_keeps_existing_values() {
        let store = MemoryStore::new();
        set_current_skip(&store, 9).unwrap();
        assert!(initialize_defaults(&store).unwrap());
        assert_eq!(
            load_fetch_params(&store).unwrap(),
            FetchParams { skip: 9, limit: DEFAULT_API_LIMIT }
        );
        assert!(!initialize_defaults(&store).unwrap());
    }

    #[test]
    fn advance_cursor_moves_by_page_size() {
        let store = MemoryStore::new();
        let next = advance_cursor(&store, FetchParams { skip: 0, limit: 3 }).unwrap();
        assert_eq!(next, 3);
        assert_eq!(load_fetch_params(&store).unwrap().skip, 3);
    }
}
