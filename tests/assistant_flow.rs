//! End-to-end session behavior: gating, routing, speech, reminders,
//! persistence, and sync.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use scar::collections::HISTORY_CAPACITY;
use scar::pipeline::messages::{RecognitionResult, RecognizerEvent, SessionCommand};
use scar::pipeline::session::SessionPhase;
use scar::responder::RuleResponder;
use scar::storage::{FileStore, LocalState, MemoryStore};
use scar::stt::{Recognizer, RecognizerError};
use scar::tts::{Synthesizer, VoiceSettings};
use scar::{Assistant, RuntimeEvent, ScarConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── collaborators ──────────────────────────────────────────────────────────

/// Records every spoken string and finishes immediately.
#[derive(Clone, Default)]
struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn speak(&self, text: &str, _voice: &VoiceSettings) -> scar::Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

/// Plays forever until cancelled.
struct EndlessSynthesizer;

#[async_trait]
impl Synthesizer for EndlessSynthesizer {
    async fn speak(&self, _text: &str, _voice: &VoiceSettings) -> scar::Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Always starts; counts stops.
#[derive(Clone, Default)]
struct CountingRecognizer {
    stops: Arc<AtomicUsize>,
}

impl Recognizer for CountingRecognizer {
    fn start(&mut self) -> Result<(), RecognizerError> {
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Starts once; every later start fails as if the device vanished.
#[derive(Default)]
struct OneShotRecognizer {
    started: bool,
}

impl Recognizer for OneShotRecognizer {
    fn start(&mut self) -> Result<(), RecognizerError> {
        if self.started {
            return Err(RecognizerError::Other("audio-capture".to_owned()));
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) {}
}

// ── helpers ────────────────────────────────────────────────────────────────

fn config(sync_endpoint: Option<String>) -> ScarConfig {
    let mut config = ScarConfig::default();
    match sync_endpoint {
        Some(endpoint) => config.sync.endpoint = endpoint,
        None => config.sync.online = false,
    }
    config
}

fn listening_assistant(
    config: &ScarConfig,
    synth: Arc<dyn Synthesizer>,
) -> (Assistant, broadcast::Receiver<RuntimeEvent>) {
    let (tx, rx) = broadcast::channel(512);
    let mut assistant = Assistant::new(
        config,
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        synth,
    )
    .unwrap()
    .with_recognizer(Box::new(CountingRecognizer::default()))
    .with_runtime_events(tx);
    assistant.start();
    (assistant, rx)
}

fn heard(text: &str) -> RecognizerEvent {
    RecognizerEvent::Results {
        result_index: 0,
        results: vec![RecognitionResult::final_text(text)],
    }
}

fn drain(rx: &mut broadcast::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn responses(events: &[RuntimeEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::Response(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── conversation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn wake_word_greeting_is_shown_and_spoken() {
    let synth = RecordingSynthesizer::default();
    let (mut assistant, mut rx) = listening_assistant(&config(None), Arc::new(synth.clone()));

    assistant.handle_recognizer_event(heard("Scar Hello")).await;

    let events = drain(&mut rx);
    assert_eq!(responses(&events), vec!["Hello! How can I assist you today?"]);
    assert!(events.contains(&RuntimeEvent::Speaking { active: true }));
    assert_eq!(assistant.session().phase, SessionPhase::Active);

    wait_until(|| !synth.spoken.lock().unwrap().is_empty()).await;
    assert_eq!(
        synth.spoken.lock().unwrap().as_slice(),
        ["Hello! How can I assist you today?"]
    );
}

#[tokio::test]
async fn text_mode_reminder_is_silent_and_synced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sync"))
        .and(body_partial_json(json!({
            "reminders": [{"text": "remind me to call mom"}],
            "userId": "owner"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "synced",
            "data": {"memory": [], "goals": [], "reminders": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let synth = RecordingSynthesizer::default();
    let (mut assistant, mut rx) = listening_assistant(
        &config(Some(format!("{}/api/sync", server.uri()))),
        Arc::new(synth.clone()),
    );

    assistant
        .handle_recognizer_event(heard("scar write it remind me to call mom"))
        .await;
    assistant.flush_syncs().await;

    let events = drain(&mut rx);
    assert_eq!(
        responses(&events),
        vec!["I understand you said: remind me to call mom. I'm still learning."]
    );
    assert!(!events.contains(&RuntimeEvent::Speaking { active: true }));
    assert!(events.contains(&RuntimeEvent::Synced { ok: true }));

    let reminders = &assistant.collections().reminders;
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].text, "remind me to call mom");
    assert!(events.contains(&RuntimeEvent::ReminderCreated(reminders[0].clone())));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(synth.spoken.lock().unwrap().is_empty());
}

#[tokio::test]
async fn wake_word_is_sticky_until_stop() {
    let (mut assistant, mut rx) =
        listening_assistant(&config(None), Arc::new(RecordingSynthesizer::default()));

    assistant.handle_recognizer_event(heard("thank you")).await;
    assert!(responses(&drain(&mut rx)).is_empty());

    assistant.handle_recognizer_event(heard("scar hello")).await;
    assistant.handle_recognizer_event(heard("thank you")).await;
    assert_eq!(
        responses(&drain(&mut rx)),
        vec!["Hello! How can I assist you today?", "You're welcome!"]
    );

    assistant.handle_recognizer_event(heard("stop")).await;
    assert_eq!(assistant.session().phase, SessionPhase::Idle);
    assert_eq!(responses(&drain(&mut rx)), vec!["SCAR is idle."]);

    // Idle again: nothing is answered until the next start and wake word.
    assistant.start();
    assistant.handle_recognizer_event(heard("thank you")).await;
    assert!(responses(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn stop_cancels_speech_even_with_wake_word() {
    let recognizer = CountingRecognizer::default();
    let stops = Arc::clone(&recognizer.stops);
    let (tx, mut rx) = broadcast::channel(64);
    let mut assistant = Assistant::new(
        &config(None),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(EndlessSynthesizer),
    )
    .unwrap()
    .with_recognizer(Box::new(recognizer))
    .with_runtime_events(tx);
    assistant.start();

    let (events_tx, events_rx) = mpsc::channel(8);
    events_tx.send(heard("scar hello")).await.unwrap();
    events_tx.send(heard("scar stop")).await.unwrap();
    drop(events_tx);
    assistant.run(events_rx).await.unwrap();

    let events = drain(&mut rx);
    let speaking: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, RuntimeEvent::Speaking { .. }))
        .collect();
    assert_eq!(
        speaking,
        vec![
            &RuntimeEvent::Speaking { active: true },
            &RuntimeEvent::Speaking { active: false }
        ]
    );
    assert!(events.contains(&RuntimeEvent::Status("SCAR stopped.".to_owned())));
    assert_eq!(stops.load(Ordering::SeqCst), 1);

    let state = assistant.session();
    assert_eq!(state.phase, SessionPhase::Idle);
    assert!(!state.speaking);
}

#[tokio::test]
async fn finished_speech_clears_speaking() {
    let (tx, mut rx) = broadcast::channel(64);
    let mut assistant = Assistant::new(
        &config(None),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap()
    .with_recognizer(Box::new(CountingRecognizer::default()))
    .with_runtime_events(tx);
    assistant.start();

    let (events_tx, events_rx) = mpsc::channel(8);
    events_tx.send(heard("scar hello")).await.unwrap();
    let cancel = assistant.cancel_token();
    let run = tokio::spawn(async move {
        assistant.run(events_rx).await.unwrap();
        assistant
    });

    let mut saw_done = false;
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Ok(event) = rx.recv().await {
            if event == (RuntimeEvent::Speaking { active: false }) {
                saw_done = true;
                break;
            }
        }
    })
    .await
    .unwrap();
    assert!(saw_done);

    cancel.cancel();
    drop(events_tx);
    let assistant = run.await.unwrap();
    assert!(!assistant.session().speaking);
    assert_eq!(assistant.session().phase, SessionPhase::Active);
}

#[tokio::test]
async fn failed_restart_cancels_speech() {
    let (tx, mut rx) = broadcast::channel(64);
    let mut assistant = Assistant::new(
        &config(None),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(EndlessSynthesizer),
    )
    .unwrap()
    .with_recognizer(Box::new(OneShotRecognizer::default()))
    .with_runtime_events(tx);
    assistant.start();

    assistant.handle_recognizer_event(heard("scar hello")).await;
    assert!(assistant.session().speaking);
    assistant.handle_recognizer_event(RecognizerEvent::End).await;

    let state = assistant.session();
    assert_eq!(state.phase, SessionPhase::Idle);
    assert!(!state.speaking);
    let events = drain(&mut rx);
    assert!(events.contains(&RuntimeEvent::Speaking { active: false }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, RuntimeEvent::Notice(n) if n.contains("audio-capture")))
    );
}

#[tokio::test]
async fn start_command_after_stop_resumes_conversation() {
    let (mut assistant, mut rx) =
        listening_assistant(&config(None), Arc::new(RecordingSynthesizer::default()));
    assistant.handle_recognizer_event(heard("scar stop")).await;
    assert_eq!(assistant.session().phase, SessionPhase::Idle);
    drain(&mut rx);

    assistant.handle_command(SessionCommand::Start);
    assert_eq!(assistant.session().phase, SessionPhase::Listening);
    assistant.handle_recognizer_event(heard("scar thank you")).await;
    assert_eq!(responses(&drain(&mut rx)), vec!["You're welcome!"]);
}

// ── history ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_keeps_the_latest_hundred_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let mut assistant = Assistant::new(
        &config(None),
        Box::new(FileStore::new(dir.path())),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap()
    .with_recognizer(Box::new(CountingRecognizer::default()));
    assistant.start();

    for i in 0..150 {
        assistant
            .handle_recognizer_event(heard(&format!("background chatter {i}")))
            .await;
    }

    let tail = assistant.history_tail(usize::MAX);
    assert_eq!(tail.len(), HISTORY_CAPACITY);
    assert_eq!(tail[0], "background chatter 50");
    assert_eq!(tail[99], "background chatter 149");
    assert_eq!(
        assistant.history_tail(2),
        vec!["background chatter 148", "background chatter 149"]
    );

    let reloaded = LocalState::load(&FileStore::new(dir.path()));
    assert_eq!(reloaded.history.len(), HISTORY_CAPACITY);
}

// ── localization ───────────────────────────────────────────────────────────

#[tokio::test]
async fn bengali_substitution_applies_to_text_replies_only() {
    let synth = RecordingSynthesizer::default();
    let (mut assistant, mut rx) = listening_assistant(&config(None), Arc::new(synth.clone()));

    assistant
        .handle_recognizer_event(heard("scar write it আমার goal"))
        .await;
    assert_eq!(
        responses(&drain(&mut rx)),
        vec!["I can help you manage your লক্ষ্যs. Open the লক্ষ্যs menu to see your list."]
    );

    assistant.handle_recognizer_event(heard("আমার goal")).await;
    let english = "I can help you manage your goals. Open the Goals menu to see your list.";
    assert_eq!(responses(&drain(&mut rx)), vec![english]);
    wait_until(|| !synth.spoken.lock().unwrap().is_empty()).await;
    assert_eq!(synth.spoken.lock().unwrap().as_slice(), [english]);
}

// ── collections and sync ───────────────────────────────────────────────────

#[tokio::test]
async fn toggling_twice_restores_goal_and_syncs_twice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "synced",
            "data": {"memory": [], "goals": [], "reminders": []}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let mut assistant = Assistant::new(
        &config(Some(format!("{}/api/sync", server.uri()))),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();

    assistant.add_goal("learn rust").unwrap();
    assert!(assistant.toggle_goal(0).unwrap());
    assert!(!assistant.toggle_goal(0).unwrap());
    assistant.flush_syncs().await;

    assert!(!assistant.collections().goals[0].completed);
}

#[tokio::test]
async fn rejected_mutations_do_not_sync() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut assistant = Assistant::new(
        &config(Some(format!("{}/api/sync", server.uri()))),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();

    assert!(assistant.add_goal("  ").is_none());
    assert!(assistant.toggle_goal(3).is_err());
    assert!(!assistant.remember(""));
    assistant.flush_syncs().await;
}

#[tokio::test]
async fn failed_sync_keeps_local_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let (tx, mut rx) = broadcast::channel(16);
    let mut assistant = Assistant::new(
        &config(Some(format!("{}/api/sync", server.uri()))),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap()
    .with_runtime_events(tx);

    assert!(assistant.remember("the wifi password is on the fridge"));
    assistant.flush_syncs().await;

    assert_eq!(
        assistant.collections().memory,
        vec!["the wifi password is on the fridge"]
    );
    assert!(drain(&mut rx).contains(&RuntimeEvent::Synced { ok: false }));
}

#[tokio::test]
async fn offline_mutations_sync_when_going_online() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"memory": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "synced",
            "data": {"memory": ["a", "b"], "goals": [], "reminders": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(Some(format!("{}/api/sync", server.uri())));
    cfg.sync.online = false;
    let mut assistant = Assistant::new(
        &cfg,
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();

    assistant.remember("a");
    assistant.remember("b");
    assert!(!assistant.is_online());
    assistant.set_online(true);
    assistant.set_online(true);
    assistant.flush_syncs().await;
}

/// Accepts connections and never answers.
async fn silent_sync_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("http://{addr}/api/sync")
}

#[tokio::test]
async fn shutdown_does_not_wait_for_hung_sync() {
    let mut assistant = Assistant::new(
        &config(Some(silent_sync_endpoint().await)),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();
    assistant.add_goal("ship");

    let (_events_tx, events_rx) = mpsc::channel(1);
    assistant.shutdown();
    tokio::time::timeout(Duration::from_secs(3), assistant.run(events_rx))
        .await
        .expect("run blocked on a hung sync")
        .unwrap();
    assert_eq!(assistant.collections().goals[0].text, "ship");
}

#[tokio::test]
async fn cancelled_flush_abandons_hung_sync() {
    let mut assistant = Assistant::new(
        &config(Some(silent_sync_endpoint().await)),
        Box::new(MemoryStore::default()),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();
    assert!(assistant.remember("call the plumber"));

    let cancel = assistant.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    tokio::time::timeout(Duration::from_secs(3), assistant.flush_syncs())
        .await
        .expect("flush blocked on a hung sync");
}

#[tokio::test]
async fn collections_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut assistant = Assistant::new(
            &config(None),
            Box::new(FileStore::new(dir.path())),
            Arc::new(RuleResponder),
            Arc::new(RecordingSynthesizer::default()),
        )
        .unwrap();
        assistant.add_goal("finish the book");
        assistant.remember("dentist on friday");
    }

    let assistant = Assistant::new(
        &config(None),
        Box::new(FileStore::new(dir.path())),
        Arc::new(RuleResponder),
        Arc::new(RecordingSynthesizer::default()),
    )
    .unwrap();
    assert_eq!(assistant.collections().goals[0].text, "finish the book");
    assert_eq!(assistant.collections().memory, vec!["dentist on friday"]);
}
