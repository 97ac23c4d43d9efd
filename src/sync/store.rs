//! Server-side sync document.

use crate::collections::UserCollections;
use crate::error::{Result, ScarError};
use crate::sync::SyncPayload;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// The persisted `{memory, goals, reminders}` document and its owner.
#[derive(Debug, Clone)]
pub struct SyncStore {
    /// Backing file. `None` keeps the document in memory only.
    path: Option<PathBuf>,
    owner_id: String,
    data: UserCollections,
}

impl SyncStore {
    /// Open the document at `path`.
    ///
    /// A missing file starts empty. An unreadable or malformed file is logged
    /// and also starts empty; it is overwritten by the next accepted sync.
    pub fn open(path: impl Into<PathBuf>, owner_id: impl Into<String>) -> Self {
        let path = path.into();
        let data = load_document(&path);
        Self {
            path: Some(path),
            owner_id: owner_id.into(),
            data,
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(owner_id: impl Into<String>) -> Self {
        Self {
            path: None,
            owner_id: owner_id.into(),
            data: UserCollections::default(),
        }
    }

    /// Current document.
    #[must_use]
    pub fn data(&self) -> &UserCollections {
        &self.data
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace every collection present in `payload`, persist, and return the
    /// merged document.
    ///
    /// # Errors
    ///
    /// Returns [`ScarError::Unauthorized`] when `payload.user_id` is not the
    /// owner, and a storage error when the document cannot be written. In
    /// both cases the stored document is unchanged.
    pub fn apply_sync(&mut self, payload: SyncPayload) -> Result<&UserCollections> {
        if payload.user_id != self.owner_id {
            return Err(ScarError::Unauthorized);
        }

        let mut merged = self.data.clone();
        if let Some(memory) = payload.memory {
            merged.memory = memory;
        }
        if let Some(goals) = payload.goals {
            merged.goals = goals;
        }
        if let Some(reminders) = payload.reminders {
            merged.reminders = reminders;
        }

        self.persist(&merged)?;
        self.data = merged;
        info!(
            memory = self.data.memory.len(),
            goals = self.data.goals.len(),
            reminders = self.data.reminders.len(),
            "sync applied"
        );
        Ok(&self.data)
    }

    fn persist(&self, data: &UserCollections) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(path, content)
            .map_err(|e| ScarError::Storage(format!("cannot write {}: {e}", path.display())))
    }
}

fn load_document(path: &Path) -> UserCollections {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return UserCollections::default(),
        Err(e) => {
            error!("failed to read data file {}: {e}", path.display());
            return UserCollections::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        error!("failed to load data file {}: {e}", path.display());
        UserCollections::default()
    })
}
