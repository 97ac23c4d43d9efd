//! The assistant shell: owns session state and executes transition effects.

use crate::collections::{Goal, UserCollections};
use crate::config::ScarConfig;
use crate::error::{Result, ScarError};
use crate::locale::Localizer;
use crate::pipeline::messages::{RecognizerEvent, ResponseMode, SessionCommand};
use crate::pipeline::router::{CommandPhrases, route};
use crate::pipeline::session::{Effect, GatePhrases, SessionEvent, SessionState, transition};
use crate::pipeline::transcript::normalize;
use crate::responder::ResponseGenerator;
use crate::runtime::RuntimeEvent;
use crate::storage::{KeyValueStore, LocalState};
use crate::stt::{Recognizer, RecognizerError};
use crate::sync::SyncClient;
use crate::tts::{SpeechDone, SpeechOutput, Synthesizer, VoiceSettings};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one voice session.
///
/// Recognizer events are handled one at a time: an utterance is normalized,
/// recorded, gated, routed, answered, and its side effects issued before the
/// next event is looked at. Speech and sync run as background tasks.
pub struct Assistant {
    gate: GatePhrases,
    commands: CommandPhrases,
    session: SessionState,
    local: LocalState,
    store: Box<dyn KeyValueStore>,
    recognizer: Option<Box<dyn Recognizer>>,
    responder: Arc<dyn ResponseGenerator>,
    localizer: Localizer,
    speech: SpeechOutput,
    speech_rx: Option<mpsc::UnboundedReceiver<SpeechDone>>,
    sync_client: SyncClient,
    online: bool,
    pending_syncs: JoinSet<()>,
    runtime_tx: Option<broadcast::Sender<RuntimeEvent>>,
    command_rx: Option<mpsc::UnboundedReceiver<SessionCommand>>,
    cancel: CancellationToken,
}

impl Assistant {
    /// Build an assistant, loading the persisted collections from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the locale tables or the sync client cannot be
    /// built.
    pub fn new(
        config: &ScarConfig,
        store: Box<dyn KeyValueStore>,
        responder: Arc<dyn ResponseGenerator>,
        synth: Arc<dyn Synthesizer>,
    ) -> Result<Self> {
        let local = LocalState::load(store.as_ref());
        info!(
            memory = local.collections.memory.len(),
            goals = local.collections.goals.len(),
            reminders = local.collections.reminders.len(),
            history = local.history.len(),
            "loaded local collections"
        );
        let (speech, speech_rx) = SpeechOutput::new(synth, VoiceSettings::from(&config.voice));
        Ok(Self {
            gate: GatePhrases::from(&config.conversation),
            commands: CommandPhrases::from(&config.conversation),
            session: SessionState::default(),
            local,
            store,
            recognizer: None,
            responder,
            localizer: Localizer::new()?,
            speech,
            speech_rx: Some(speech_rx),
            sync_client: SyncClient::new(&config.sync)?,
            online: config.sync.online,
            pending_syncs: JoinSet::new(),
            runtime_tx: None,
            command_rx: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Attach the speech recognizer. Without one, starting reports the
    /// environment as unsupported.
    pub fn with_recognizer(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Publish display and status events on `tx`.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<RuntimeEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Accept session commands (such as a manual restart) while running.
    pub fn with_session_commands(mut self, rx: mpsc::UnboundedReceiver<SessionCommand>) -> Self {
        self.command_rx = Some(rx);
        self
    }

    /// Current session state.
    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Current collections.
    pub fn collections(&self) -> &UserCollections {
        &self.local.collections
    }

    /// Whether mutations are pushed to the sync authority.
    pub fn is_online(&self) -> bool {
        self.online
    }

    /// The last `n` history entries, oldest first.
    pub fn history_tail(&self, n: usize) -> Vec<&str> {
        self.local.history.tail(n)
    }

    /// Token that ends [`Assistant::run`] when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request the run loop to end.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    // ── user operations ────────────────────────────────────────────

    /// Begin listening.
    pub fn start(&mut self) {
        self.step(SessionEvent::Start);
    }

    /// Append a goal. Blank text changes nothing and returns `None`.
    pub fn add_goal(&mut self, text: &str) -> Option<Goal> {
        let goal = self.local.collections.add_goal(text, Utc::now())?.clone();
        self.commit();
        Some(goal)
    }

    /// Flip the goal at `index`, returning its new `completed` value.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is out of range; nothing changes.
    pub fn toggle_goal(&mut self, index: usize) -> Result<bool> {
        let completed = self.local.collections.toggle_goal(index)?;
        self.commit();
        Ok(completed)
    }

    /// Append a memory note. Blank notes are ignored.
    pub fn remember(&mut self, note: &str) -> bool {
        if !self.local.collections.remember(note) {
            return false;
        }
        self.commit();
        true
    }

    /// Enable or disable syncing. Going online syncs immediately.
    pub fn set_online(&mut self, online: bool) {
        let was_online = self.online;
        self.online = online;
        info!("sync {}", if online { "enabled" } else { "disabled" });
        if online && !was_online {
            self.sync();
        }
    }

    /// Push every collection to the sync authority in the background.
    ///
    /// Does nothing while offline. Failures are logged and never retried.
    pub fn sync(&mut self) {
        if !self.online {
            debug!("offline, skipping sync");
            return;
        }
        // Reap settled rounds so the set only holds in-flight requests.
        while self.pending_syncs.try_join_next().is_some() {}
        let client = self.sync_client.clone();
        let collections = self.local.collections.clone();
        let runtime_tx = self.runtime_tx.clone();
        self.pending_syncs.spawn(async move {
            let ok = match client.push(&collections).await {
                Ok(data) => {
                    info!(
                        memory = data.memory.len(),
                        goals = data.goals.len(),
                        reminders = data.reminders.len(),
                        "synced with {}",
                        client.endpoint()
                    );
                    true
                }
                Err(ScarError::Unauthorized) => {
                    warn!("sync rejected: unauthorized");
                    false
                }
                Err(e) => {
                    warn!("sync failed: {e}");
                    false
                }
            };
            if let Some(tx) = runtime_tx {
                let _ = tx.send(RuntimeEvent::Synced { ok });
            }
        });
    }

    /// Wait for every in-flight sync to settle.
    ///
    /// Returns early once the session is cancelled; syncs still in flight
    /// at that point are aborted.
    pub async fn flush_syncs(&mut self) {
        let cancel = self.cancel.clone();
        let pending = &mut self.pending_syncs;
        let drained = tokio::select! {
            () = cancel.cancelled() => false,
            () = async { while pending.join_next().await.is_some() {} } => true,
        };
        if !drained && !self.pending_syncs.is_empty() {
            info!(pending = self.pending_syncs.len(), "abandoning in-flight syncs");
            self.pending_syncs.shutdown().await;
        }
    }

    // ── event handling ─────────────────────────────────────────────

    /// Handle one recognizer event to completion.
    pub async fn handle_recognizer_event(&mut self, event: RecognizerEvent) {
        match event {
            RecognizerEvent::Results {
                result_index,
                results,
            } => {
                let transcript = normalize(result_index, &results);
                let display = transcript.display_text();
                if !display.is_empty() {
                    self.emit(RuntimeEvent::Transcript {
                        text: display.to_owned(),
                        is_final: transcript.interim.is_empty(),
                    });
                }
                let Some(utterance) = transcript.final_utterance() else {
                    return;
                };
                self.local.history.push(utterance);
                self.persist();
                if let Some(command) = self.step(SessionEvent::Utterance(utterance.to_owned())) {
                    self.respond(&command).await;
                }
            }
            RecognizerEvent::End => {
                self.step(SessionEvent::RecognizerEnded);
            }
            RecognizerEvent::Error(kind) => {
                debug!("recognizer error: {kind:?}");
                self.step(SessionEvent::RecognizerError(kind));
            }
        }
    }

    /// Apply a session command from outside the recognizer stream.
    pub fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Start => {
                info!("manual start requested");
                self.start();
            }
        }
    }

    /// Record that an utterance finished playing.
    pub fn handle_speech_done(&mut self, done: SpeechDone) {
        if self.speech.finish(done.id) {
            self.step(SessionEvent::SpeechFinished);
            self.emit(RuntimeEvent::Speaking { active: false });
        }
    }

    /// Process recognizer events until the stream closes or the session is
    /// cancelled, then wait for pending syncs.
    ///
    /// # Errors
    ///
    /// Returns an error if the assistant is already running.
    pub async fn run(&mut self, mut events: mpsc::Receiver<RecognizerEvent>) -> Result<()> {
        let mut speech_rx = self
            .speech_rx
            .take()
            .ok_or_else(|| ScarError::Config("assistant is already running".to_owned()))?;
        let mut command_rx = self.command_rx.take();
        let cancel = self.cancel.clone();
        info!("SCAR session running");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("session cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_recognizer_event(event).await,
                    None => {
                        debug!("recognizer event stream closed");
                        break;
                    }
                },
                Some(done) = speech_rx.recv() => self.handle_speech_done(done),
                Some(command) = next_command(&mut command_rx) => self.handle_command(command),
            }
        }

        self.speech_rx = Some(speech_rx);
        self.command_rx = command_rx;
        self.flush_syncs().await;
        info!("SCAR session ended");
        Ok(())
    }

    // ── internals ──────────────────────────────────────────────────

    /// Feed `event` through the state machine, executing effects and any
    /// follow-up events they raise. Returns the command to dispatch, if any.
    fn step(&mut self, event: SessionEvent) -> Option<String> {
        let mut queue = VecDeque::from([event]);
        let mut dispatch = None;
        while let Some(event) = queue.pop_front() {
            let before = self.session;
            let next = transition(before, &event, &self.gate);
            if next.state.phase != before.phase {
                info!("session {:?} -> {:?}", before.phase, next.state.phase);
            }
            self.session = next.state;
            if next.dispatch.is_some() {
                dispatch = next.dispatch;
            }
            for effect in next.effects {
                if let Some(follow_up) = self.apply(effect) {
                    queue.push_back(follow_up);
                }
            }
        }
        dispatch
    }

    fn apply(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::StartRecognizer => self.start_recognizer(),
            Effect::RestartRecognizer => {
                debug!("recognizer ended, restarting");
                self.start_recognizer()
            }
            Effect::StopRecognizer => {
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.stop();
                }
                None
            }
            Effect::CancelSpeech => {
                if self.speech.cancel() {
                    self.emit(RuntimeEvent::Speaking { active: false });
                }
                None
            }
            Effect::SetStatus(status) => {
                self.emit(RuntimeEvent::Status(status));
                None
            }
            Effect::ShowResponse(text) => {
                self.emit(RuntimeEvent::Response(text));
                None
            }
            Effect::Notify(notice) => {
                warn!("{notice}");
                self.emit(RuntimeEvent::Notice(notice));
                None
            }
        }
    }

    fn start_recognizer(&mut self) -> Option<SessionEvent> {
        let Some(recognizer) = self.recognizer.as_mut() else {
            return Some(SessionEvent::StartFailed(RecognizerError::Unsupported));
        };
        match recognizer.start() {
            Ok(()) | Err(RecognizerError::AlreadyStarted) => None,
            Err(e) => Some(SessionEvent::StartFailed(e)),
        }
    }

    async fn respond(&mut self, text: &str) {
        let routed = route(text, &self.commands);
        let command = routed.command;
        debug!(?command, "dispatching command");

        match self.responder.respond(&command).await {
            Ok(reply) => {
                let shown = self.localizer.localize(&reply, command.language, command.mode);
                self.emit(RuntimeEvent::Response(shown));
                if command.mode == ResponseMode::Voice {
                    self.speech.speak(reply);
                    self.step(SessionEvent::SpeechStarted);
                    self.emit(RuntimeEvent::Speaking { active: true });
                }
            }
            Err(e) => {
                warn!("response generation failed: {e}");
                self.emit(RuntimeEvent::Notice(format!(
                    "Could not generate a response: {e}"
                )));
            }
        }

        if routed.creates_reminder {
            let reminder = self
                .local
                .collections
                .create_reminder(&command.raw, Utc::now())
                .clone();
            info!(id = reminder.id, "reminder created");
            self.commit();
            self.emit(RuntimeEvent::ReminderCreated(reminder));
        }
    }

    /// Persist then sync.
    fn commit(&mut self) {
        self.persist();
        self.sync();
    }

    fn persist(&mut self) {
        if let Err(e) = self.local.save(self.store.as_mut()) {
            warn!("failed to persist local collections: {e}");
        }
    }

    fn emit(&self, event: RuntimeEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }
}

/// Next session command, or never when no command channel is attached.
async fn next_command(
    rx: &mut Option<mpsc::UnboundedReceiver<SessionCommand>>,
) -> Option<SessionCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
