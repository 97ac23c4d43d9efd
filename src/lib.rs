//! SCAR: a wake-word voice assistant session core with last-writer-wins
//! collection sync.
//!
//! # Architecture
//!
//! Recognizer events flow through a small, synchronous pipeline:
//! Recognizer → Transcript Normalizer → Session State Machine → Command
//! Router → Response Generator + Locale Adapter → display/speak effects
//!
//! - **Session**: a pure `(state, event) -> (state, effects)` transition
//!   function in [`pipeline::session`]; the [`Assistant`] shell executes the
//!   effects
//! - **Collections**: goals, memory notes, reminders, and a bounded history,
//!   persisted locally after every mutation
//! - **Sync**: every mutation pushes full collections to a single-owner
//!   authority (`POST /api/sync`), served by [`sync::SyncServer`]

pub mod collections;
pub mod config;
pub mod error;
pub mod locale;
pub mod pipeline;
pub mod responder;
pub mod runtime;
pub mod scar_dirs;
pub mod storage;
pub mod stt;
pub mod sync;
pub mod tts;

pub use config::ScarConfig;
pub use error::{Result, ScarError};
pub use pipeline::coordinator::Assistant;
pub use runtime::RuntimeEvent;
