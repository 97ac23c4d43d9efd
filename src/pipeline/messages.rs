//! Message types passed between the recognizer, session and router.

use crate::locale::Language;
use serde::{Deserialize, Serialize};

/// One result slot delivered by the recognizer.
///
/// A slot carries one or more interpretations, best first. Only the first
/// interpretation is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Candidate transcripts, best first.
    pub alternatives: Vec<String>,
    /// Whether the recognizer has confirmed this slot.
    pub is_final: bool,
}

impl RecognitionResult {
    /// A confirmed slot with a single interpretation.
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: true,
        }
    }

    /// A provisional slot with a single interpretation.
    pub fn interim_text(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![text.into()],
            is_final: false,
        }
    }

    /// The best interpretation, or `""` for an empty slot.
    #[must_use]
    pub fn transcript(&self) -> &str {
        self.alternatives.first().map(String::as_str).unwrap_or("")
    }
}

/// Events emitted by a speech recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// New or revised results. Slots before `result_index` are unchanged
    /// since the previous event and must be skipped.
    Results {
        /// First slot that changed.
        result_index: usize,
        /// All slots of the current recognition pass.
        results: Vec<RecognitionResult>,
    },
    /// The recognizer stopped delivering audio (silence, engine timeout, or
    /// an explicit stop).
    End,
    /// The recognizer reported an error.
    Error(RecognizerErrorKind),
}

/// Error classes reported by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    /// The user or platform refused microphone access.
    PermissionDenied,
    /// Any other recognizer error, with the engine's error code.
    Other(String),
}

impl RecognizerErrorKind {
    /// Map an engine error code to a kind.
    ///
    /// Browser engines report `"not-allowed"` or `"service-not-allowed"`
    /// when the microphone is refused.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" | "permission-denied" => Self::PermissionDenied,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A single normalized utterance produced per recognition pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Lowercased, trimmed transcript.
    pub text: String,
    /// Whether the transcript is confirmed.
    pub is_final: bool,
}

/// How a response is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Displayed and spoken.
    Voice,
    /// Displayed only.
    Text,
}

/// A routed command, consumed immediately by the response path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command text with wake word and text-mode phrase removed.
    pub raw: String,
    /// Delivery mode.
    pub mode: ResponseMode,
    /// Language family detected from the command's script.
    pub language: Language,
}

/// Requests to the running session from outside the recognizer stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Begin listening again after a stop or a failed start.
    Start,
}
