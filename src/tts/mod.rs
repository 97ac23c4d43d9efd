//! Spoken output.
//!
//! A [`Synthesizer`] voices one string at a time. [`SpeechOutput`] owns the
//! "latest speech wins" policy on top of it: starting a new utterance
//! cancels the previous one, and every utterance reports exactly one
//! [`SpeechDone`] tagged with the id it was started under.

use crate::config::VoiceConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Voice parameters applied to every utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Name fragments of acceptable voices.
    pub preferred_voices: Vec<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::from(&VoiceConfig::default())
    }
}

impl From<&VoiceConfig> for VoiceSettings {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            rate: config.rate,
            pitch: config.pitch,
            preferred_voices: config.preferred_voices.clone(),
        }
    }
}

impl VoiceSettings {
    /// The first voice in `available` whose name contains any preferred
    /// fragment. `None` means the engine default should be used.
    #[must_use]
    pub fn pick_voice<'a>(&self, available: &'a [String]) -> Option<&'a str> {
        available
            .iter()
            .find(|name| {
                self.preferred_voices
                    .iter()
                    .any(|fragment| !fragment.is_empty() && name.contains(fragment.as_str()))
            })
            .map(String::as_str)
    }
}

/// Text-to-speech engine.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voice `text`, resolving when playback has finished.
    ///
    /// Dropping the returned future must stop playback.
    ///
    /// # Errors
    ///
    /// Returns an error if synthesis or playback fails.
    async fn speak(&self, text: &str, voice: &VoiceSettings) -> Result<()>;
}

/// Writes each utterance to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSynthesizer;

#[async_trait]
impl Synthesizer for ConsoleSynthesizer {
    async fn speak(&self, text: &str, _voice: &VoiceSettings) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[SCAR speaks] {text}")?;
        out.flush()?;
        Ok(())
    }
}

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Played to completion.
    Finished,
    /// Superseded or explicitly cancelled.
    Cancelled,
    /// The engine failed.
    Failed(String),
}

/// Completion report for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechDone {
    /// Id returned by [`SpeechOutput::speak`].
    pub id: u64,
    /// How it ended.
    pub outcome: SpeechOutcome,
}

/// Single-voice output channel.
pub struct SpeechOutput {
    synth: Arc<dyn Synthesizer>,
    voice: VoiceSettings,
    next_id: u64,
    current: Option<(u64, CancellationToken)>,
    done_tx: mpsc::UnboundedSender<SpeechDone>,
}

impl SpeechOutput {
    /// Create the output and the receiver for its completion reports.
    pub fn new(
        synth: Arc<dyn Synthesizer>,
        voice: VoiceSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SpeechDone>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        (
            Self {
                synth,
                voice,
                next_id: 0,
                current: None,
                done_tx,
            },
            done_rx,
        )
    }

    /// Whether an utterance is in flight.
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    /// Start voicing `text`, cancelling whatever was playing.
    pub fn speak(&mut self, text: impl Into<String>) -> u64 {
        self.cancel();

        self.next_id += 1;
        let id = self.next_id;
        let token = CancellationToken::new();
        self.current = Some((id, token.clone()));

        let synth = Arc::clone(&self.synth);
        let voice = self.voice.clone();
        let done_tx = self.done_tx.clone();
        let text = text.into();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = token.cancelled() => SpeechOutcome::Cancelled,
                result = synth.speak(&text, &voice) => match result {
                    Ok(()) => SpeechOutcome::Finished,
                    Err(e) => {
                        warn!("speech synthesis failed: {e}");
                        SpeechOutcome::Failed(e.to_string())
                    }
                },
            };
            debug!(id, ?outcome, "utterance done");
            let _ = done_tx.send(SpeechDone { id, outcome });
        });
        id
    }

    /// Cancel the in-flight utterance. Returns whether one was playing.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Record that utterance `id` ended. Returns `true` when it was the
    /// current one; reports from superseded utterances return `false`.
    pub fn finish(&mut self, id: u64) -> bool {
        match &self.current {
            Some((current, _)) if *current == id => {
                self.current = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::error::ScarError;
    use std::time::Duration;

    /// Never finishes on its own.
    struct EndlessSynthesizer;

    #[async_trait]
    impl Synthesizer for EndlessSynthesizer {
        async fn speak(&self, _text: &str, _voice: &VoiceSettings) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct FailingSynthesizer;

    #[async_trait]
    impl Synthesizer for FailingSynthesizer {
        async fn speak(&self, _text: &str, _voice: &VoiceSettings) -> Result<()> {
            Err(ScarError::Synthesis("no audio device".to_owned()))
        }
    }

    #[test]
    fn pick_voice_prefers_first_matching_name() {
        let voice = VoiceSettings::default();
        let available = vec![
            "Google US English".to_owned(),
            "Microsoft David - English (United States) Male".to_owned(),
            "Google UK English Male".to_owned(),
        ];
        assert_eq!(
            voice.pick_voice(&available),
            Some("Microsoft David - English (United States) Male")
        );
    }

    #[test]
    fn pick_voice_none_without_match() {
        let voice = VoiceSettings::default();
        assert_eq!(voice.pick_voice(&["Samantha".to_owned()]), None);
        assert_eq!(voice.pick_voice(&[]), None);
    }

    #[test]
    fn settings_follow_config() {
        let voice = VoiceSettings::default();
        assert!((voice.rate - 0.9).abs() < f32::EPSILON);
        assert!((voice.pitch - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn new_utterance_cancels_previous() {
        let (mut output, mut done) = SpeechOutput::new(Arc::new(EndlessSynthesizer), VoiceSettings::default());
        let first = output.speak("one");
        let second = output.speak("two");
        assert_ne!(first, second);

        let report = tokio::time::timeout(Duration::from_secs(1), done.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            report,
            SpeechDone {
                id: first,
                outcome: SpeechOutcome::Cancelled
            }
        );
        assert!(!output.finish(first));
        assert!(output.is_speaking());

        assert!(output.cancel());
        assert!(!output.is_speaking());
        assert!(!output.cancel());
    }

    #[tokio::test]
    async fn console_synthesizer_finishes() {
        let (mut output, mut done) = SpeechOutput::new(Arc::new(ConsoleSynthesizer), VoiceSettings::default());
        let id = output.speak("hello");
        let report = done.recv().await.unwrap();
        assert_eq!(report.outcome, SpeechOutcome::Finished);
        assert!(output.finish(id));
        assert!(!output.is_speaking());
    }

    #[tokio::test]
    async fn failure_is_reported() {
        let (mut output, mut done) = SpeechOutput::new(Arc::new(FailingSynthesizer), VoiceSettings::default());
        output.speak("hello");
        let report = done.recv().await.unwrap();
        assert!(matches!(report.outcome, SpeechOutcome::Failed(_)));
    }
}
