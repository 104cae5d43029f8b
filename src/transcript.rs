use serde::Serialize;

/// One timed segment of a transcript.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Segment {
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub text: String,
}

/// The result of transcribing one file.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TranscriptResult {
    /// Full transcript text (segments joined in order).
    pub text: String,
    /// Engine-native language code (e.g. `"en"`).
    pub language: String,
    pub segments: Vec<Segment>,
}

impl TranscriptResult {
    /// Build a result whose `text` is the concatenation of the segment texts.
    pub fn from_segments(language: impl Into<String>, segments: Vec<Segment>) -> Self {
        let text = segments.iter().map(|s| s.text.as_str()).collect::<String>();
        Self {
            text,
            language: language.into(),
            segments,
        }
    }

    /// Whether the transcript carries no speech at all.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(text: &str) -> Segment {
        Segment {
            start_seconds: 0.0,
            end_seconds: 1.0,
            text: text.to_owned(),
        }
    }

    #[test]
    fn text_joins_segments_in_order() {
        let r = TranscriptResult::from_segments("en", vec![seg(" Hello"), seg(" world.")]);
        assert_eq!(r.text, " Hello world.");
        assert!(!r.is_blank());
    }

    #[test]
    fn whitespace_only_is_blank() {
        assert!(TranscriptResult::from_segments("en", vec![]).is_blank());
        assert!(TranscriptResult::from_segments("en", vec![seg("  ")]).is_blank());
    }
}
