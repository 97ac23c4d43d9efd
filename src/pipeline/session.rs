//! Voice session state machine.
//!
//! Every transition is a pure function of `(state, event)` returning the new
//! state, a list of [`Effect`]s for the shell to execute, and optionally a
//! command to dispatch to the router.
//!
//! ```text
//!            start                 wake word
//!   Idle ───────────▶ Listening ─────────────▶ Active ──┐
//!    ▲                    │                      │  ▲   │ any utterance
//!    └──── stop phrase ───┴──────────────────────┘  └───┘ (sticky)
//! ```
//!
//! The stop phrase is checked before anything else. Once `Active`, the
//! session stays active across utterances that omit the wake word until the
//! stop phrase is heard.

use crate::config::ConversationConfig;
use crate::pipeline::messages::RecognizerErrorKind;
use crate::stt::RecognizerError;

pub(crate) const STATUS_LISTENING: &str = "SCAR is listening...";
pub(crate) const STATUS_STOPPED: &str = "SCAR stopped.";
pub(crate) const RESPONSE_IDLE: &str = "SCAR is idle.";
pub(crate) const NOTICE_MIC_DENIED: &str = "Microphone access denied. Please allow to use SCAR.";
pub(crate) const NOTICE_UNSUPPORTED: &str =
    "Speech recognition is not supported in this environment.";

/// Coarse session phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Recognizer not capturing.
    #[default]
    Idle,
    /// Capturing, waiting for the wake word.
    Listening,
    /// Capturing, wake word heard; every utterance is dispatched.
    Active,
}

/// The whole session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current phase.
    pub phase: SessionPhase,
    /// Whether a response is being voiced right now.
    pub speaking: bool,
}

impl SessionState {
    /// Whether the recognizer should be capturing.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.phase != SessionPhase::Idle
    }

    /// Whether the wake word has been heard since the last stop.
    #[must_use]
    pub fn wake_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }
}

/// Lowercased gate phrases. An empty phrase never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePhrases {
    wake_word: String,
    stop_phrase: String,
}

impl GatePhrases {
    /// Build from explicit phrases.
    pub fn new(wake_word: &str, stop_phrase: &str) -> Self {
        Self {
            wake_word: wake_word.trim().to_lowercase(),
            stop_phrase: stop_phrase.trim().to_lowercase(),
        }
    }

    /// The wake word.
    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    fn has_stop(&self, text: &str) -> bool {
        !self.stop_phrase.is_empty() && text.contains(&self.stop_phrase)
    }

    fn has_wake(&self, text: &str) -> bool {
        !self.wake_word.is_empty() && text.contains(&self.wake_word)
    }

    /// Remove the first occurrence of the wake word and trim.
    fn strip_wake(&self, text: &str) -> String {
        if self.wake_word.is_empty() {
            return text.trim().to_owned();
        }
        text.replacen(&self.wake_word, "", 1).trim().to_owned()
    }
}

impl From<&ConversationConfig> for GatePhrases {
    fn from(config: &ConversationConfig) -> Self {
        Self::new(&config.wake_word, &config.stop_phrase)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User asked to start listening.
    Start,
    /// The recognizer refused to start.
    StartFailed(RecognizerError),
    /// A non-empty final utterance (already lowercased).
    Utterance(String),
    /// The recognizer stopped delivering results.
    RecognizerEnded,
    /// The recognizer reported an error while running.
    RecognizerError(RecognizerErrorKind),
    /// A spoken response began.
    SpeechStarted,
    /// The current spoken response finished, failed, or was cancelled.
    SpeechFinished,
}

/// Side effects requested by a transition, executed in order by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Begin recognizer capture.
    StartRecognizer,
    /// Restart capture after an end-of-stream. Must tolerate an engine that
    /// is already running.
    RestartRecognizer,
    /// Halt capture.
    StopRecognizer,
    /// Cancel any in-flight speech.
    CancelSpeech,
    /// Replace the status line.
    SetStatus(String),
    /// Replace the response area.
    ShowResponse(String),
    /// Show a user-facing notice.
    Notify(String),
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// New session state.
    pub state: SessionState,
    /// Effects to execute, in order.
    pub effects: Vec<Effect>,
    /// Wake-stripped command to hand to the router.
    pub dispatch: Option<String>,
}

impl Transition {
    fn unchanged(state: SessionState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            dispatch: None,
        }
    }

    fn with_effects(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            dispatch: None,
        }
    }
}

/// Compute the next state and effects for `event`.
pub fn transition(state: SessionState, event: &SessionEvent, phrases: &GatePhrases) -> Transition {
    match event {
        SessionEvent::Start => {
            if state.is_listening() {
                return Transition::unchanged(state);
            }
            Transition::with_effects(
                SessionState {
                    phase: SessionPhase::Listening,
                    speaking: false,
                },
                vec![
                    Effect::StartRecognizer,
                    Effect::SetStatus(STATUS_LISTENING.to_owned()),
                ],
            )
        }
        SessionEvent::StartFailed(err) => {
            let notice = match err {
                RecognizerError::PermissionDenied => NOTICE_MIC_DENIED.to_owned(),
                RecognizerError::Unsupported => NOTICE_UNSUPPORTED.to_owned(),
                other => format!("Could not start listening: {other}"),
            };
            Transition::with_effects(
                SessionState::default(),
                vec![
                    Effect::CancelSpeech,
                    Effect::SetStatus(STATUS_STOPPED.to_owned()),
                    Effect::Notify(notice),
                ],
            )
        }
        SessionEvent::Utterance(text) => on_utterance(state, text, phrases),
        SessionEvent::RecognizerEnded => {
            if state.is_listening() {
                Transition::with_effects(state, vec![Effect::RestartRecognizer])
            } else {
                Transition::unchanged(state)
            }
        }
        SessionEvent::RecognizerError(RecognizerErrorKind::PermissionDenied) => {
            Transition::with_effects(state, vec![Effect::Notify(NOTICE_MIC_DENIED.to_owned())])
        }
        SessionEvent::RecognizerError(RecognizerErrorKind::Other(_)) => {
            Transition::unchanged(state)
        }
        SessionEvent::SpeechStarted => {
            if !state.is_listening() {
                return Transition::unchanged(state);
            }
            Transition::unchanged(SessionState {
                speaking: true,
                ..state
            })
        }
        SessionEvent::SpeechFinished => Transition::unchanged(SessionState {
            speaking: false,
            ..state
        }),
    }
}

fn on_utterance(state: SessionState, text: &str, phrases: &GatePhrases) -> Transition {
    if !state.is_listening() {
        return Transition::unchanged(state);
    }

    if phrases.has_stop(text) {
        return Transition::with_effects(
            SessionState::default(),
            vec![
                Effect::StopRecognizer,
                Effect::CancelSpeech,
                Effect::SetStatus(STATUS_STOPPED.to_owned()),
                Effect::ShowResponse(RESPONSE_IDLE.to_owned()),
            ],
        );
    }

    if !phrases.has_wake(text) && !state.wake_active() {
        return Transition::unchanged(state);
    }

    Transition {
        state: SessionState {
            phase: SessionPhase::Active,
            ..state
        },
        effects: Vec::new(),
        dispatch: Some(phrases.strip_wake(text)),
    }
}
