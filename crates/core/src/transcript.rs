//! Transcript types for STT collaborator output

use serde::{Deserialize, Serialize};

/// Incremental transcript for an in-progress utterance
///
/// A session holds at most one current partial at a time; each new partial
/// replaces the previous one and none survives the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialTranscript {
    /// Transcribed text so far
    pub text: String,

    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,

    /// Timestamp of the latest audio covered (ms from stream start)
    pub timestamp_ms: u64,
}

impl PartialTranscript {
    pub fn new(text: impl Into<String>, confidence: f32, timestamp_ms: u64) -> Self {
        Self {
            text: text.into(),
            confidence,
            timestamp_ms,
        }
    }

    /// Check if the transcript holds no usable text
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Final transcript for a confirmed speech span
///
/// Emitted exactly once, when the end of the span is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalTranscript {
    /// Full utterance text
    pub text: String,

    /// Duration of the spoken span in milliseconds
    pub duration_ms: u64,
}

impl FinalTranscript {
    pub fn new(text: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text: text.into(),
            duration_ms,
        }
    }

    /// Word count of the utterance
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_replacement_semantics() {
        let first = PartialTranscript::new("hello", 0.8, 100);
        let second = PartialTranscript::new("hello there", 0.85, 200);
        // Later partials supersede earlier ones wholesale.
        assert_ne!(first.text, second.text);
        assert!(!second.is_empty());
        assert!(PartialTranscript::new("   ", 0.1, 0).is_empty());
    }

    #[test]
    fn test_final_transcript() {
        let t = FinalTranscript::new("how are you today", 1200);
        assert_eq!(t.word_count(), 4);
        assert_eq!(t.duration_ms, 1200);
    }
}
