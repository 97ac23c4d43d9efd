//! Folds a recognizer result event into one interim and one final string.

use crate::pipeline::messages::RecognitionResult;

/// Interim and final text for a single recognizer event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTranscript {
    /// Concatenated provisional slots.
    pub interim: String,
    /// Concatenated confirmed slots. Only this is submitted to the session.
    pub final_text: String,
}

impl NormalizedTranscript {
    /// Text to show while the user is speaking: interim if any, else final.
    #[must_use]
    pub fn display_text(&self) -> &str {
        if self.interim.is_empty() {
            &self.final_text
        } else {
            &self.interim
        }
    }

    /// The final text, if non-empty.
    #[must_use]
    pub fn final_utterance(&self) -> Option<&str> {
        if self.final_text.is_empty() {
            None
        } else {
            Some(&self.final_text)
        }
    }
}

/// Normalize the slots from `result_index` onward.
///
/// Each slot's best interpretation is trimmed and lowercased, then appended
/// to the final or interim string depending on the slot's flag. Slots are
/// concatenated without a separator, as recognizers emit them. A
/// `result_index` past the end yields empty strings.
pub fn normalize(result_index: usize, results: &[RecognitionResult]) -> NormalizedTranscript {
    let mut out = NormalizedTranscript::default();
    for slot in results.iter().skip(result_index) {
        let text = slot.transcript().trim().to_lowercase();
        if slot.is_final {
            out.final_text.push_str(&text);
        } else {
            out.interim.push_str(&text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_final_and_interim_slots() {
        let results = vec![
            RecognitionResult::final_text("  Scar Hello "),
            RecognitionResult::interim_text("How Are"),
        ];
        let t = normalize(0, &results);
        assert_eq!(t.final_text, "scar hello");
        assert_eq!(t.interim, "how are");
        assert_eq!(t.display_text(), "how are");
        assert_eq!(t.final_utterance(), Some("scar hello"));
    }

    #[test]
    fn skips_slots_before_result_index() {
        let results = vec![
            RecognitionResult::final_text("already handled"),
            RecognitionResult::final_text("Scar Time"),
        ];
        let t = normalize(1, &results);
        assert_eq!(t.final_text, "scar time");
    }

    #[test]
    fn concatenates_multiple_final_slots() {
        let results = vec![
            RecognitionResult::final_text("scar "),
            RecognitionResult::final_text(" thanks"),
        ];
        assert_eq!(normalize(0, &results).final_text, "scarthanks");
    }

    #[test]
    fn interim_only_has_no_final_utterance() {
        let results = vec![RecognitionResult::interim_text("scar")];
        let t = normalize(0, &results);
        assert_eq!(t.final_utterance(), None);
        assert_eq!(t.display_text(), "scar");
    }

    #[test]
    fn display_falls_back_to_final() {
        let results = vec![RecognitionResult::final_text("Stop")];
        assert_eq!(normalize(0, &results).display_text(), "stop");
    }

    #[test]
    fn index_past_end_is_empty() {
        let results = vec![RecognitionResult::final_text("scar")];
        assert_eq!(normalize(5, &results), NormalizedTranscript::default());
    }
}
