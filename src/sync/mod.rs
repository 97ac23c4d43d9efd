//! Last-writer-wins synchronization of user collections with a single-owner
//! remote authority.
//!
//! Every sync is a full-collection overwrite, never a diff. The client sends
//! all three collections; the server replaces each collection present in the
//! payload and leaves absent ones untouched.
//!
//! Sub-modules:
//! - `client`: pushes local collections to `POST /api/sync`.
//! - `store`: the server-side document and the `apply_sync` merge.
//! - `server`: the axum HTTP service.

pub mod client;
pub mod server;
pub mod store;

use crate::collections::{Goal, Reminder, UserCollections};
use serde::{Deserialize, Serialize};

pub use client::SyncClient;
pub use server::SyncServer;
pub use store::SyncStore;

/// The single identity allowed to sync.
pub const OWNER_ID: &str = "owner";

/// Body of `POST /api/sync`.
///
/// Absent (or `null`) collections are left untouched by the server. An
/// absent `userId` is treated as the empty identity and rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    /// Replacement memory notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<String>>,
    /// Replacement goals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<Goal>>,
    /// Replacement reminders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<Reminder>>,
    /// Identity tag.
    #[serde(default)]
    pub user_id: String,
}

impl SyncPayload {
    /// A payload carrying every collection.
    pub fn full(collections: &UserCollections, user_id: impl Into<String>) -> Self {
        Self {
            memory: Some(collections.memory.clone()),
            goals: Some(collections.goals.clone()),
            reminders: Some(collections.reminders.clone()),
            user_id: user_id.into(),
        }
    }
}

/// `200` body of `POST /api/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Always `"synced"`.
    pub status: String,
    /// The merged document after the sync.
    pub data: UserCollections,
}

/// Error body for non-`200` answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error.
    pub error: String,
}
