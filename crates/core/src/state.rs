//! Per-turn user state
//!
//! The consolidated snapshot handed downstream on turn commit, the
//! classifier outputs joined into it, and the orchestrator's mutable
//! working record for the turn in progress.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Emotion categories for user utterances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EmotionCategory {
    Happy,
    Sad,
    Angry,
    Frustrated,
    Satisfied,
    #[default]
    Neutral,
}

/// Emotion classification for one utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emotion {
    /// Detected category
    pub category: EmotionCategory,
    /// Classifier confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Timestamp the classification refers to (ms from stream start)
    pub timestamp_ms: u64,
}

impl Emotion {
    pub fn new(category: EmotionCategory, confidence: f32, timestamp_ms: u64) -> Self {
        Self {
            category,
            confidence,
            timestamp_ms,
        }
    }

    /// Default used when no classification joins the turn
    pub fn neutral(timestamp_ms: u64) -> Self {
        Self::new(EmotionCategory::Neutral, 0.0, timestamp_ms)
    }
}

/// Intent classification for one utterance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Intent name, e.g. "question" or "farewell"
    pub intent_type: String,
    /// Classifier confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Timestamp the classification refers to (ms from stream start)
    pub timestamp_ms: u64,
}

impl Intent {
    pub fn new(intent_type: impl Into<String>, confidence: f32, timestamp_ms: u64) -> Self {
        Self {
            intent_type: intent_type.into(),
            confidence,
            timestamp_ms,
        }
    }

    /// Default used when no classification joins the turn
    pub fn unknown(timestamp_ms: u64) -> Self {
        Self::new("unknown", 0.0, timestamp_ms)
    }
}

/// Consolidated snapshot of one committed turn
///
/// Produced exactly once per committed turn. `turn_id` is unique per
/// session and monotonically increasing; it is the join key between this
/// core and downstream response generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    /// Joined emotion classification
    pub emotion: Emotion,
    /// Joined intent classification
    pub intent: Intent,
    /// Full utterance text
    pub utterance: String,
    /// Per-session turn id
    pub turn_id: u64,
    /// Free-form metadata (durations, counters)
    pub metadata: HashMap<String, String>,
}

/// Mutable working record for the turn in progress
///
/// Exactly one live task per in-progress turn; replaced when the next turn
/// starts.
#[derive(Debug, Clone)]
pub struct TurnTask {
    /// Per-session turn id
    pub turn_id: u64,
    /// Speculative draft response, empty until staged
    pub pre_reply: String,
    /// Commit flag
    pub is_finished: bool,
}

impl TurnTask {
    pub fn new(turn_id: u64) -> Self {
        Self {
            turn_id,
            pre_reply: String::new(),
            is_finished: false,
        }
    }
}
