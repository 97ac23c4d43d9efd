//! Language detection and text-reply localization.
//!
//! The language of a turn is picked from the Unicode script of the command:
//! Bengali is checked first, then Devanagari (Hindi), defaulting to English.
//!
//! Only display-only (text mode) replies are localized. Spoken replies stay
//! in English because the speech engine voices the base language; a Bengali
//! command answered by voice is therefore spoken untranslated. Tests should
//! expect that asymmetry.

use crate::error::{Result, ScarError};
use crate::pipeline::messages::ResponseMode;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Language family of an utterance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English (base language).
    #[default]
    En,
    /// Bengali.
    Bn,
    /// Hindi.
    Hi,
}

impl Language {
    /// Short language code used on the wire.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Bn => "bn",
            Self::Hi => "hi",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Bengali script block.
const BENGALI: std::ops::RangeInclusive<char> = '\u{0980}'..='\u{09FF}';
/// Devanagari script block.
const DEVANAGARI: std::ops::RangeInclusive<char> = '\u{0900}'..='\u{097F}';

/// English words swapped for Bengali in text replies.
const BENGALI_WORDS: &[(&str, &str)] = &[
    ("hello", "হ্যালো"),
    ("time", "সময়"),
    ("goal", "লক্ষ্য"),
    ("memory", "স্মৃতি"),
];

/// Detect the language family from the scripts present in `text`.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| BENGALI.contains(&c)) {
        Language::Bn
    } else if text.chars().any(|c| DEVANAGARI.contains(&c)) {
        Language::Hi
    } else {
        Language::En
    }
}

/// Dictionary substitution over generated replies.
#[derive(Debug, Clone)]
pub struct Localizer {
    bengali: Vec<(Regex, &'static str)>,
}

impl Localizer {
    /// Compile the substitution tables.
    ///
    /// # Errors
    ///
    /// Returns an error if a table entry fails to compile.
    pub fn new() -> Result<Self> {
        let bengali = BENGALI_WORDS
            .iter()
            .map(|(en, bn)| {
                RegexBuilder::new(&regex::escape(en))
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, *bn))
                    .map_err(|e| ScarError::Config(format!("bad localization entry {en:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bengali })
    }

    /// Localize `response` for a turn in `language` delivered as `mode`.
    ///
    /// Every case-insensitive occurrence of a table word is replaced, including
    /// occurrences inside longer words ("goals" becomes "লক্ষ্যs"). Voice replies
    /// and languages without a table are returned unchanged.
    pub fn localize(&self, response: &str, language: Language, mode: ResponseMode) -> String {
        if mode == ResponseMode::Voice {
            return response.to_owned();
        }
        let table = match language {
            Language::Bn => &self.bengali,
            Language::En | Language::Hi => return response.to_owned(),
        };
        table.iter().fold(response.to_owned(), |text, (re, replacement)| {
            re.replace_all(&text, *replacement).into_owned()
        })
    }
}
