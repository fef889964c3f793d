//! Persisted client state: the token pair and the preferred community.
//!
//! Business logic never reaches into ambient storage. Everything goes
//! through the `StateStore` trait so tests run against `MemoryStore` and
//! the CLI persists to a JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

/// Storage key for the access token.
pub const ACCESS_KEY: &str = "access";
/// Storage key for the refresh token.
pub const REFRESH_KEY: &str = "refresh";
/// Storage key for the preferred community id.
pub const COMMUNITY_KEY: &str = "community_id";

pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
    /// Drop every key in one step, so tokens and the community selection
    /// never survive each other across a logout.
    fn clear(&self);
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }

    fn clear(&self) {
        self.values.lock().unwrap().clear();
    }
}

/// File-backed store used by the CLI. The whole map is rewritten through
/// a temp file and rename so a crash never leaves a half-written state.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load(&path);
        debug!(path = %path.display(), entries = values.len(), "state file opened");
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn load(path: &Path) -> BTreeMap<String, String> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring corrupt state file");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    fn persist(&self, values: &BTreeMap<String, String>) {
        let tmp = self.path.with_extension("tmp");
        let write = serde_json::to_vec_pretty(values)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(&tmp, bytes).map_err(|e| e.to_string()))
            .and_then(|_| std::fs::rename(&tmp, &self.path).map_err(|e| e.to_string()));
        if let Err(e) = write {
            warn!(path = %self.path.display(), error = %e, "failed to persist state");
        }
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock().unwrap();
        if values.remove(key).is_some() {
            self.persist(&values);
        }
    }

    fn clear(&self) {
        let mut values = self.values.lock().unwrap();
        values.clear();
        self.persist(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(ACCESS_KEY), None);

        store.set(ACCESS_KEY, "tok-a");
        store.set(REFRESH_KEY, "tok-r");
        store.set(COMMUNITY_KEY, "3");
        assert_eq!(store.get(ACCESS_KEY).as_deref(), Some("tok-a"));

        store.remove(COMMUNITY_KEY);
        assert_eq!(store.get(COMMUNITY_KEY), None);

        store.clear();
        assert_eq!(store.get(ACCESS_KEY), None);
        assert_eq!(store.get(REFRESH_KEY), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = FileStore::open(&path);
            store.set(ACCESS_KEY, "tok-a");
            store.set(COMMUNITY_KEY, "7");
        }

        let store = FileStore::open(&path);
        assert_eq!(store.get(ACCESS_KEY).as_deref(), Some("tok-a"));
        assert_eq!(store.get(COMMUNITY_KEY).as_deref(), Some("7"));

        store.clear();
        let store = FileStore::open(&path);
        assert_eq!(store.get(ACCESS_KEY), None);
    }

    #[test]
    fn corrupt_state_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{{{").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get(ACCESS_KEY), None);
    }
}
