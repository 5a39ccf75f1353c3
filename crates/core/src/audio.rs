//! Audio frame and speech segment types

use serde::{Deserialize, Serialize};

/// Supported sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    Hz8000,
    Hz16000,
    Hz22050,
    Hz44100,
    Hz48000,
}

impl SampleRate {
    /// Sample rate in Hz
    pub fn as_hz(&self) -> u32 {
        match self {
            SampleRate::Hz8000 => 8000,
            SampleRate::Hz16000 => 16000,
            SampleRate::Hz22050 => 22050,
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
        }
    }
}

/// Channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channels {
    Mono,
    Stereo,
}

impl Channels {
    /// Number of channels
    pub fn count(&self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

/// Per-frame voice activity classification
///
/// Produced by the upstream VAD collaborator; this core never inspects
/// samples itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceActivity {
    Speech,
    Silence,
}

/// A single timestamped audio frame
///
/// Frames form a time-ordered sequence per session. Adjacency is by
/// timestamp only; segments hold frames in an index-addressable `Vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Raw audio samples
    pub samples: Vec<f32>,

    /// Capture timestamp (ms from stream start)
    pub timestamp_ms: u64,

    /// Sample rate
    pub sample_rate: SampleRate,

    /// Channel layout
    pub channels: Channels,

    /// Speaker identity, when the transport tags it
    pub speaker: Option<String>,

    /// True for system-side audio (agent playback), false for the user
    pub is_operator: bool,
}

impl AudioFrame {
    /// Create a new user-side audio frame
    pub fn new(
        samples: Vec<f32>,
        sample_rate: SampleRate,
        channels: Channels,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            samples,
            timestamp_ms,
            sample_rate,
            channels,
            speaker: None,
            is_operator: false,
        }
    }

    /// Tag the frame with a speaker identity
    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    /// Mark the frame as system-side audio
    pub fn operator(mut self) -> Self {
        self.is_operator = true;
        self
    }

    /// Frame duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        let per_channel = self.samples.len() / self.channels.count().max(1);
        (per_channel as u64 * 1000) / self.sample_rate.as_hz() as u64
    }
}

/// A contiguous run of speech frames bounded by silence gaps
///
/// Immutable once closed (silence threshold exceeded or turn committed).
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    frames: Vec<AudioFrame>,
    start_ms: u64,
    end_ms: u64,
}

impl SpeechSegment {
    /// Build a closed segment from an ordered frame run
    pub fn new(frames: Vec<AudioFrame>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            frames,
            start_ms,
            end_ms,
        }
    }

    /// First speech timestamp
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Last speech timestamp
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// Segment duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Frames in timestamp order
    pub fn frames(&self) -> &[AudioFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when the segment holds no frames
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Consume the segment, yielding its frames (used to reopen on
    /// interruption)
    pub fn into_frames(self) -> Vec<AudioFrame> {
        self.frames
    }
}

/// Segment assembler output
#[derive(Debug, Clone)]
pub enum SegmentEvent {
    /// The open segment grew by one speech frame
    SegmentExtended { start_ms: u64, end_ms: u64 },
    /// Silence exceeded the short threshold; the segment is closed
    SegmentClosed(SpeechSegment),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_duration() {
        let frame = AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 0);
        assert_eq!(frame.duration_ms(), 10);

        let stereo = AudioFrame::new(vec![0.0; 320], SampleRate::Hz16000, Channels::Stereo, 0);
        assert_eq!(stereo.duration_ms(), 10);
    }

    #[test]
    fn test_frame_tags() {
        let frame = AudioFrame::new(vec![], SampleRate::Hz16000, Channels::Mono, 5)
            .with_speaker("caller-1");
        assert_eq!(frame.speaker.as_deref(), Some("caller-1"));
        assert!(!frame.is_operator);

        let op = AudioFrame::new(vec![], SampleRate::Hz16000, Channels::Mono, 6).operator();
        assert!(op.is_operator);
    }

    #[test]
    fn test_segment_duration() {
        let frames = vec![
            AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 100),
            AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, 110),
        ];
        let segment = SpeechSegment::new(frames, 100, 110);
        assert_eq!(segment.duration_ms(), 10);
        assert_eq!(segment.len(), 2);
    }
}
