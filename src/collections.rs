//! User-owned collections: memory notes, goals, reminders, and utterance history.
//!
//! Goals are addressed by position. Callers must not reorder or delete goals
//! between reading an index and toggling it; no operation here does either.

use crate::error::{Result, ScarError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of utterances kept in [`History`].
pub const HISTORY_CAPACITY: usize = 100;

/// A tracked goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Goal description.
    pub text: String,
    /// Whether the goal is done.
    pub completed: bool,
    /// When the goal was added.
    pub created_at: DateTime<Utc>,
}

/// A stored reminder. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// The full command that created the reminder.
    pub text: String,
    /// When the reminder was created.
    pub time: DateTime<Utc>,
    /// Creation-time identifier in epoch milliseconds, strictly increasing.
    pub id: i64,
}

/// The three collections mirrored to the sync authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserCollections {
    /// Free-form notes, insertion ordered, duplicates allowed.
    pub memory: Vec<String>,
    /// Goals, addressed by index.
    pub goals: Vec<Goal>,
    /// Reminders in creation order.
    pub reminders: Vec<Reminder>,
}

impl UserCollections {
    /// Append a goal. Returns `None` (and changes nothing) for blank text.
    pub fn add_goal(&mut self, text: &str, now: DateTime<Utc>) -> Option<&Goal> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.goals.push(Goal {
            text: text.to_owned(),
            completed: false,
            created_at: now,
        });
        self.goals.last()
    }

    /// Flip `completed` on the goal at `index`, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`ScarError::Storage`] if `index` is out of range.
    pub fn toggle_goal(&mut self, index: usize) -> Result<bool> {
        let count = self.goals.len();
        let goal = self.goals.get_mut(index).ok_or_else(|| {
            ScarError::Storage(format!("no goal at index {index} ({count} goals)"))
        })?;
        goal.completed = !goal.completed;
        Ok(goal.completed)
    }

    /// Append a memory note. Blank notes are ignored and return `false`.
    pub fn remember(&mut self, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() {
            return false;
        }
        self.memory.push(note.to_owned());
        true
    }

    /// Append a reminder whose id is `now` in milliseconds, bumped past the
    /// largest existing id so ids stay unique and increasing.
    pub fn create_reminder(&mut self, text: &str, now: DateTime<Utc>) -> &Reminder {
        let mut id = now.timestamp_millis();
        if let Some(max) = self.reminders.iter().map(|r| r.id).max()
            && id <= max
        {
            id = max + 1;
        }
        self.reminders.push(Reminder {
            text: text.to_owned(),
            time: now,
            id,
        });
        &self.reminders[self.reminders.len() - 1]
    }
}

/// Bounded FIFO of every final utterance heard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct History {
    entries: VecDeque<String>,
}

impl History {
    /// Append an entry, evicting the oldest beyond [`HISTORY_CAPACITY`].
    pub fn push(&mut self, text: impl Into<String>) {
        self.entries.push_back(text.into());
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let skip = self.entries.len().saturating_sub(n);
        self.iter().skip(skip).collect()
    }
}

impl From<Vec<String>> for History {
    fn from(entries: Vec<String>) -> Self {
        let mut history = Self::default();
        for entry in entries {
            history.push(entry);
        }
        history
    }
}

impl From<History> for Vec<String> {
    fn from(history: History) -> Self {
        history.entries.into_iter().collect()
    }
}
