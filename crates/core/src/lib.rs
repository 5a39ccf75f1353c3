//! Core types for the turn-detection pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - Audio frame and speech segment types
//! - Transcript types (partial and final)
//! - Dialogue history
//! - Per-turn user state

pub mod audio;
pub mod dialogue;
pub mod state;
pub mod transcript;

pub use audio::{AudioFrame, Channels, SampleRate, SegmentEvent, SpeechSegment, VoiceActivity};
pub use dialogue::{DialogueHistory, TurnEntry};
pub use state::{Emotion, EmotionCategory, Intent, TurnTask, UserState};
pub use transcript::{FinalTranscript, PartialTranscript};
