//! Local persistence of the user collections.
//!
//! Four independently keyed JSON arrays are stored: memory notes, goals,
//! history, and reminders. They are loaded once at session start and all
//! four are rewritten after every mutation. A key holding malformed JSON is
//! logged and loaded as empty; it never prevents the session from starting.

use crate::collections::{History, UserCollections};
use crate::error::{Result, ScarError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Storage key for memory notes.
pub const MEMORY_KEY: &str = "scar_memory";
/// Storage key for goals.
pub const GOALS_KEY: &str = "scar_goals";
/// Storage key for utterance history.
pub const HISTORY_KEY: &str = "scar_history";
/// Storage key for reminders.
pub const REMINDERS_KEY: &str = "scar_reminders";

/// Named string values.
pub trait KeyValueStore: Send {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use `dir` as the store root. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The store root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ScarError::Storage(format!("cannot read {key}: {e}"))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Everything persisted locally for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalState {
    /// Collections mirrored to the sync authority.
    pub collections: UserCollections,
    /// Utterance history (local only).
    pub history: History,
}

impl LocalState {
    /// Load all four keys. Missing or malformed keys load as empty.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            collections: UserCollections {
                memory: load_key(store, MEMORY_KEY),
                goals: load_key(store, GOALS_KEY),
                reminders: load_key(store, REMINDERS_KEY),
            },
            history: load_key::<Vec<String>>(store, HISTORY_KEY).into(),
        }
    }

    /// Rewrite all four keys.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any write fails.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(MEMORY_KEY, &serde_json::to_string(&self.collections.memory)?)?;
        store.set(GOALS_KEY, &serde_json::to_string(&self.collections.goals)?)?;
        store.set(HISTORY_KEY, &serde_json::to_string(&self.history)?)?;
        store.set(
            REMINDERS_KEY,
            &serde_json::to_string(&self.collections.reminders)?,
        )?;
        Ok(())
    }
}

fn load_key<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            warn!("failed to read {key} from storage: {e}");
            return T::default();
        }
    };
    // Stored `null` behaves like a missing key.
    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            warn!("failed to load {key} from storage, starting empty: {e}");
            T::default()
        }
    }
}
