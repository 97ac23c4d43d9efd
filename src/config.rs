//! Configuration types for the SCAR session and sync service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScarConfig {
    /// Conversation gate phrases (wake word, stop phrase, structural triggers).
    pub conversation: ConversationConfig,
    /// Spoken response settings.
    pub voice: VoiceConfig,
    /// Client-side sync settings.
    pub sync: SyncConfig,
    /// Which response generator answers commands.
    pub responder: ResponderConfig,
    /// HTTP sync service settings.
    pub server: ServerConfig,
    /// Local collection storage.
    pub storage: StorageConfig,
}

/// Conversation gate configuration.
///
/// All phrases are matched case-insensitively as substrings of the
/// normalized (lowercase) utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Phrase that activates command processing.
    pub wake_word: String,
    /// Phrase that unconditionally ends the session.
    pub stop_phrase: String,
    /// Phrase requesting a display-only (not spoken) reply.
    pub text_mode_phrase: String,
    /// Phrase that turns a command into a stored reminder.
    pub reminder_phrase: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            wake_word: "scar".to_owned(),
            stop_phrase: "stop".to_owned(),
            text_mode_phrase: "write it".to_owned(),
            reminder_phrase: "remind me".to_owned(),
        }
    }
}

/// Spoken response configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Speaking rate multiplier (1.0 = engine default).
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Voice names to prefer, in order. A voice matches when its name
    /// contains the preferred name.
    pub preferred_voices: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 0.8,
            preferred_voices: vec!["Google UK English Male".to_owned(), "Male".to_owned()],
        }
    }
}

/// Client-side sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether connectivity is enabled. When off, sync calls are no-ops.
    pub online: bool,
    /// Full URL of the sync endpoint.
    pub endpoint: String,
    /// Identity tag sent with every payload.
    pub user_id: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            online: true,
            endpoint: "http://127.0.0.1:3000/api/sync".to_owned(),
            user_id: crate::sync::OWNER_ID.to_owned(),
        }
    }
}

/// Which response generator to use.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderBackend {
    /// Built-in rule table.
    #[default]
    Rules,
    /// `POST /api/ai` on the sync server, falling back to the rule table.
    Remote,
}

/// Response generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Backend selection.
    pub backend: ResponderBackend,
    /// Full URL of the AI endpoint (remote backend only).
    pub endpoint: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            backend: ResponderBackend::Rules,
            endpoint: "http://127.0.0.1:3000/api/ai".to_owned(),
        }
    }
}

/// HTTP sync service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port (0 = auto-assign).
    pub port: u16,
    /// JSON document holding the persisted collections.
    pub data_file: PathBuf,
    /// The single identity allowed to sync.
    pub owner_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 3000,
            data_file: crate::scar_dirs::remote_data_file(),
            owner_id: crate::sync::OWNER_ID.to_owned(),
        }
    }
}

/// Local collection storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per collection.
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: crate::scar_dirs::local_store_dir(),
        }
    }
}

impl ScarConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ScarError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ScarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config_dir>/config.toml`.
    pub fn default_config_path() -> PathBuf {
        crate::scar_dirs::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_phrases_match_assistant_name() {
        let config = ScarConfig::default();
        assert_eq!(config.conversation.wake_word, "scar");
        assert_eq!(config.conversation.stop_phrase, "stop");
        assert_eq!(config.conversation.text_mode_phrase, "write it");
        assert_eq!(config.conversation.reminder_phrase, "remind me");
    }

    #[test]
    fn default_sync_is_online_as_owner() {
        let config = ScarConfig::default();
        assert!(config.sync.online);
        assert_eq!(config.sync.user_id, "owner");
        assert_eq!(config.server.owner_id, "owner");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ScarConfig::default();
        config.conversation.wake_word = "jarvis".to_owned();
        config.voice.rate = 1.2;
        config.responder.backend = ResponderBackend::Remote;

        config.save_to_file(&path).unwrap();
        let loaded = ScarConfig::from_file(&path).unwrap();

        assert_eq!(loaded.conversation.wake_word, "jarvis");
        assert!((loaded.voice.rate - 1.2).abs() < f32::EPSILON);
        assert_eq!(loaded.responder.backend, ResponderBackend::Remote);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nonline = false\n").unwrap();

        let loaded = ScarConfig::from_file(&path).unwrap();
        assert!(!loaded.sync.online);
        assert_eq!(loaded.sync.user_id, "owner");
        assert_eq!(loaded.conversation.wake_word, "scar");
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ScarConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not valid toml").unwrap();

        let result = ScarConfig::from_file(&path);
        assert!(matches!(result, Err(crate::error::ScarError::Config(_))));
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        assert!(ScarConfig::default_config_path().ends_with("config.toml"));
    }
}
