//! Speech recognizer collaborator.
//!
//! The session core never touches audio. A [`Recognizer`] is only asked to
//! start and stop capture; its results arrive separately as
//! [`RecognizerEvent`]s on a channel owned by the caller.

use crate::pipeline::messages::{RecognitionResult, RecognizerEvent, SessionCommand};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Why a recognizer could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognizerError {
    /// Capture is already running. Restart paths treat this as success.
    #[error("recognizer already started")]
    AlreadyStarted,
    /// Microphone access was refused.
    #[error("microphone permission denied")]
    PermissionDenied,
    /// No recognizer is available in this environment.
    #[error("speech recognition unsupported")]
    Unsupported,
    /// Any other engine failure.
    #[error("{0}")]
    Other(String),
}

/// Start/stop control over a speech recognizer.
pub trait Recognizer: Send {
    /// Begin capture.
    ///
    /// # Errors
    ///
    /// Returns [`RecognizerError::AlreadyStarted`] when capture is running,
    /// or another variant when capture cannot begin.
    fn start(&mut self) -> Result<(), RecognizerError>;

    /// Halt capture. Stopping a stopped recognizer is a no-op.
    fn stop(&mut self);
}

/// Line that asks a stopped session to listen again.
pub const RESTART_LINE: &str = "start";

/// Recognizer that treats each input line as one confirmed utterance.
///
/// Lines read while stopped are discarded, like speech spoken at a muted
/// microphone. The event channel closes at end of input.
pub struct LineRecognizer {
    active: Arc<AtomicBool>,
}

impl LineRecognizer {
    /// Spawn a reader task feeding `tx` from `reader`.
    pub fn spawn<R>(reader: R, tx: mpsc::Sender<RecognizerEvent>) -> (Self, JoinHandle<()>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self::spawn_inner(reader, tx, None)
    }

    /// Like [`LineRecognizer::spawn`], but a [`RESTART_LINE`] typed while
    /// stopped resumes capture and sends [`SessionCommand::Start`] on
    /// `commands` instead of being discarded.
    pub fn spawn_with_commands<R>(
        reader: R,
        tx: mpsc::Sender<RecognizerEvent>,
        commands: mpsc::UnboundedSender<SessionCommand>,
    ) -> (Self, JoinHandle<()>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self::spawn_inner(reader, tx, Some(commands))
    }

    fn spawn_inner<R>(
        reader: R,
        tx: mpsc::Sender<RecognizerEvent>,
        commands: Option<mpsc::UnboundedSender<SessionCommand>>,
    ) -> (Self, JoinHandle<()>)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(false));
        let reader_active = Arc::clone(&active);
        let handle = tokio::spawn(async move {
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                if !reader_active.load(Ordering::Relaxed) {
                    if let Some(commands) = &commands
                        && line.trim().eq_ignore_ascii_case(RESTART_LINE)
                    {
                        // Capture resumes here so lines typed right after are
                        // not lost while the session handles the command.
                        reader_active.store(true, Ordering::Relaxed);
                        if commands.send(SessionCommand::Start).is_err() {
                            break;
                        }
                        continue;
                    }
                    debug!("recognizer stopped, discarding input");
                    continue;
                }
                let event = RecognizerEvent::Results {
                    result_index: 0,
                    results: vec![RecognitionResult::final_text(line)],
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        (Self { active }, handle)
    }
}

impl Recognizer for LineRecognizer {
    fn start(&mut self) -> Result<(), RecognizerError> {
        if self.active.swap(true, Ordering::Relaxed) {
            return Err(RecognizerError::AlreadyStarted);
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::Relaxed);
    }
}
