//! Runtime events emitted by the assistant for display surfaces.
//!
//! Subscribers render these however they like; the session never waits on
//! them, and a lagging subscriber only loses its own backlog.

use crate::collections::Reminder;

/// What the assistant is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// Live transcript: interim text while speaking, the final text once
    /// confirmed.
    Transcript {
        /// Text to show.
        text: String,
        /// Whether this is a confirmed transcript.
        is_final: bool,
    },
    /// Status line replacement.
    Status(String),
    /// Response area replacement.
    Response(String),
    /// User-facing notice (permission problems, failures).
    Notice(String),
    /// Spoken output began or ended.
    Speaking {
        /// Whether speech is playing.
        active: bool,
    },
    /// A reminder was created from a command.
    ReminderCreated(Reminder),
    /// A sync round finished.
    Synced {
        /// Whether the authority accepted the collections.
        ok: bool,
    },
}
