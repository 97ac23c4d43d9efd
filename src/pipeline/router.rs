//! Command routing: response mode, language, and reminder detection.

use crate::config::ConversationConfig;
use crate::locale::detect_language;
use crate::pipeline::messages::{Command, ResponseMode};

/// Phrases recognized inside a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPhrases {
    text_mode: String,
    reminder: String,
}

impl CommandPhrases {
    /// Build from explicit phrases. Empty phrases never match.
    pub fn new(text_mode: &str, reminder: &str) -> Self {
        Self {
            text_mode: text_mode.trim().to_lowercase(),
            reminder: reminder.trim().to_lowercase(),
        }
    }
}

impl Default for CommandPhrases {
    fn default() -> Self {
        Self::from(&ConversationConfig::default())
    }
}

impl From<&ConversationConfig> for CommandPhrases {
    fn from(config: &ConversationConfig) -> Self {
        Self::new(&config.text_mode_phrase, &config.reminder_phrase)
    }
}

/// A command plus what the shell must do besides replying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCommand {
    /// The command to answer.
    pub command: Command,
    /// Whether a reminder should be recorded from `command.raw`.
    pub creates_reminder: bool,
}

/// Route a wake-stripped utterance.
///
/// The first occurrence of the text-mode phrase is removed and switches the
/// reply to text only. Language is detected from the remaining command's
/// script.
pub fn route(text: &str, phrases: &CommandPhrases) -> RoutedCommand {
    let (raw, mode) = if !phrases.text_mode.is_empty() && text.contains(&phrases.text_mode) {
        (
            text.replacen(&phrases.text_mode, "", 1).trim().to_owned(),
            ResponseMode::Text,
        )
    } else {
        (text.trim().to_owned(), ResponseMode::Voice)
    };

    let creates_reminder = !phrases.reminder.is_empty() && raw.contains(&phrases.reminder);
    let language = detect_language(&raw);
    RoutedCommand {
        command: Command {
            raw,
            mode,
            language,
        },
        creates_reminder,
    }
}
