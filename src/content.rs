//! Output-integrity checks on a finished transcript.
//!
//! A transcript must not repeat the previous job's transcript, must not be blank, and must carry
//! a language code that resolves to ISO 639-3.
//!
//! Duplicate detection keeps a window of exactly one: the last transcript that passed the
//! duplicate and blank checks. Jobs skipped for any reason before that point never move it.

use thiserror::Error;

use crate::codes::to_iso639_3;
use crate::transcript::TranscriptResult;

/// A transcript that failed an integrity check. The `Display` text is the audit-log reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("Duplicate VTT of {previous}")]
    Duplicate { previous: String },

    #[error("Blank transcript")]
    Blank,

    #[error("Non-ISO 639-3 language code provided: '{0}'")]
    Language(String),
}

/// Exact, full-text equality against the previous accepted transcript.
pub fn is_duplicate(current: &str, previous: &str) -> bool {
    current == previous
}

/// The last accepted transcript and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Accepted {
    text: String,
    file_name: String,
}

/// Holds the previous accepted transcript across jobs.
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    previous: Option<Accepted>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known previous transcript (e.g. when resuming a run).
    pub fn with_previous(text: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            previous: Some(Accepted {
                text: text.into(),
                file_name: file_name.into(),
            }),
        }
    }

    /// The file name of the previous accepted transcript, if `text` duplicates it.
    pub fn duplicate_of(&self, text: &str) -> Option<&str> {
        self.previous
            .as_ref()
            .filter(|p| is_duplicate(text, &p.text))
            .map(|p| p.file_name.as_str())
    }

    fn accept(&mut self, text: &str, file_name: &str) {
        self.previous = Some(Accepted {
            text: text.to_owned(),
            file_name: file_name.to_owned(),
        });
    }

    /// Text of the previous accepted transcript.
    pub fn previous_text(&self) -> Option<&str> {
        self.previous.as_ref().map(|p| p.text.as_str())
    }

    /// Run the duplicate, blank, and language checks, in that order.
    ///
    /// On success the transcript becomes the new comparison target and the canonical
    /// ISO 639-3 language code is returned. A transcript rejected for its language has already
    /// been accepted as the comparison target: the engine did produce it.
    pub fn check(
        &mut self,
        result: &TranscriptResult,
        file_name: &str,
    ) -> Result<&'static str, ContentError> {
        if let Some(previous) = self.duplicate_of(&result.text) {
            return Err(ContentError::Duplicate {
                previous: previous.to_owned(),
            });
        }

        if result.is_blank() {
            return Err(ContentError::Blank);
        }

        self.accept(&result.text, file_name);

        to_iso639_3(&result.language).ok_or_else(|| ContentError::Language(result.language.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, lang: &str) -> TranscriptResult {
        TranscriptResult {
            text: text.to_owned(),
            language: lang.to_owned(),
            segments: Vec::new(),
        }
    }

    #[test]
    fn equality_is_exact() {
        assert!(is_duplicate("hello world", "hello world"));
        assert!(!is_duplicate("hello world", "Hello world"));
        assert!(!is_duplicate("hello world", "hello world."));
    }

    #[test]
    fn flags_consecutive_duplicates_and_does_not_advance_on_skip() {
        let mut d = DuplicateDetector::new();

        assert_eq!(d.check(&result("hello world", "en"), "one.wav"), Ok("eng"));

        let err = d.check(&result("hello world", "en"), "two.wav").unwrap_err();
        assert_eq!(
            err,
            ContentError::Duplicate {
                previous: "one.wav".to_owned()
            }
        );
        assert_eq!(err.to_string(), "Duplicate VTT of one.wav");

        // Job 2 was skipped, so job 3 compares against job 1.
        assert_eq!(d.previous_text(), Some("hello world"));
        assert_eq!(d.check(&result("goodbye", "en"), "three.wav"), Ok("eng"));
        assert_eq!(d.previous_text(), Some("goodbye"));
    }

    #[test]
    fn non_adjacent_repeats_are_not_flagged() {
        let mut d = DuplicateDetector::new();
        d.check(&result("a", "en"), "1").unwrap();
        d.check(&result("b", "en"), "2").unwrap();
        assert!(d.check(&result("a", "en"), "3").is_ok());
    }

    #[test]
    fn blank_transcripts_are_rejected_without_moving_the_window() {
        let mut d = DuplicateDetector::with_previous("earlier", "0.wav");
        assert_eq!(
            d.check(&result("  ", "en"), "1.wav"),
            Err(ContentError::Blank)
        );
        assert_eq!(d.previous_text(), Some("earlier"));
    }

    #[test]
    fn unknown_language_is_rejected_after_acceptance() {
        let mut d = DuplicateDetector::new();
        let err = d.check(&result("hola", "xx"), "1.wav").unwrap_err();
        assert_eq!(err, ContentError::Language("xx".to_owned()));
        assert_eq!(d.previous_text(), Some("hola"));
    }

    #[test]
    fn language_is_normalized_to_three_letters() {
        let mut d = DuplicateDetector::new();
        assert_eq!(d.check(&result("hola", "es"), "1.wav"), Ok("spa"));
        assert_eq!(d.check(&result("hello", "eng"), "2.wav"), Ok("eng"));
    }
}
