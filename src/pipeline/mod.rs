//! Voice session pipeline.
//!
//! Recognizer events flow through the [`transcript`] normalizer into the
//! pure [`session`] state machine; dispatched commands go through the
//! [`router`] and the [`coordinator`] executes every resulting effect.

pub mod coordinator;
pub mod messages;
pub mod router;
pub mod session;
pub mod transcript;
