//! Response generation for dispatched commands.
//!
//! The session core only depends on the [`ResponseGenerator`] contract: a
//! command goes in, a reply string comes out. Interpretation of what the
//! command means is entirely up to the implementation.

use crate::config::{ResponderBackend, ResponderConfig};
use crate::error::{Result, ScarError};
use crate::locale::Language;
use crate::pipeline::messages::Command;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Maps a command to a reply.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce the reply for `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply cannot be produced.
    async fn respond(&self, command: &Command) -> Result<String>;
}

/// Render a wall-clock time the way the reply table speaks it.
pub(crate) fn spoken_time<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%-I:%M:%S %p").to_string()
}

/// Built-in keyword rule table.
///
/// Rules are checked in order and match on substrings, so "hi" also fires
/// inside longer words.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleResponder;

impl RuleResponder {
    /// Reply to `command` as of `now`.
    pub fn reply<Tz: TimeZone>(command: &str, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        if command.contains("hello") || command.contains("hi") {
            return "Hello! How can I assist you today?".to_owned();
        }
        if command.contains("time") {
            return format!("The current time is {}.", spoken_time(now));
        }
        if command.contains("goal") {
            return "I can help you manage your goals. Open the Goals menu to see your list."
                .to_owned();
        }
        if command.contains("memory") {
            return "I remember important things for you. Check the Memory menu.".to_owned();
        }
        if command.contains("thank") {
            return "You're welcome!".to_owned();
        }
        format!("I understand you said: {command}. I'm still learning.")
    }
}

#[async_trait]
impl ResponseGenerator for RuleResponder {
    async fn respond(&self, command: &Command) -> Result<String> {
        Ok(Self::reply(&command.raw, &Local::now()))
    }
}

/// Body of `POST /api/ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    /// Command text.
    pub text: String,
    /// Detected language code.
    #[serde(default)]
    pub language: Language,
}

/// `200` body of `POST /api/ai`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiResponse {
    /// Reply text.
    pub response: String,
}

/// Asks an `/api/ai` endpoint for the reply.
#[derive(Debug, Clone)]
pub struct HttpResponder {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpResponder {
    /// Create a responder posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ScarError::Responder(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl ResponseGenerator for HttpResponder {
    async fn respond(&self, command: &Command) -> Result<String> {
        let request = AiRequest {
            text: command.raw.clone(),
            language: command.language,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScarError::Responder(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScarError::Responder(format!("unexpected status {status}")));
        }
        let body: AiResponse = response
            .json()
            .await
            .map_err(|e| ScarError::Responder(format!("bad response body: {e}")))?;
        Ok(body.response)
    }
}

/// Uses `fallback` whenever `primary` fails.
pub struct FallbackResponder {
    primary: Arc<dyn ResponseGenerator>,
    fallback: Arc<dyn ResponseGenerator>,
}

impl FallbackResponder {
    /// Chain two generators.
    pub fn new(primary: Arc<dyn ResponseGenerator>, fallback: Arc<dyn ResponseGenerator>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl ResponseGenerator for FallbackResponder {
    async fn respond(&self, command: &Command) -> Result<String> {
        match self.primary.respond(command).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!("primary responder failed, using fallback: {e}");
                self.fallback.respond(command).await
            }
        }
    }
}

/// Build the configured generator.
///
/// # Errors
///
/// Returns an error if the remote backend's HTTP client cannot be built.
pub fn from_config(config: &ResponderConfig) -> Result<Arc<dyn ResponseGenerator>> {
    match config.backend {
        ResponderBackend::Rules => Ok(Arc::new(RuleResponder)),
        ResponderBackend::Remote => Ok(Arc::new(FallbackResponder::new(
            Arc::new(HttpResponder::new(config.endpoint.clone())?),
            Arc::new(RuleResponder),
        ))),
    }
}
