//! Audio segment assembly
//!
//! Groups the per-session frame stream into contiguous speech segments and
//! tracks the running silence duration since the last speech frame. Voice
//! activity classification comes from the upstream VAD collaborator.

use turngate_core::{AudioFrame, SegmentEvent, SpeechSegment, VoiceActivity};

use crate::PipelineError;

/// Assembles timestamped frames into speech segments
pub struct SegmentAssembler {
    silence_close_ms: u64,
    frames: Vec<AudioFrame>,
    segment_start_ms: Option<u64>,
    last_speech_ms: Option<u64>,
    last_timestamp_ms: Option<u64>,
    frames_seen: u64,
    segments_closed: u64,
}

impl SegmentAssembler {
    /// Create an assembler closing segments after `silence_close_ms` of
    /// silence
    pub fn new(silence_close_ms: u64) -> Self {
        Self {
            silence_close_ms,
            frames: Vec::new(),
            segment_start_ms: None,
            last_speech_ms: None,
            last_timestamp_ms: None,
            frames_seen: 0,
            segments_closed: 0,
        }
    }

    /// Ingest one frame with its voice-activity classification
    ///
    /// Frames must arrive strictly increasing in timestamp; out-of-order or
    /// duplicate timestamps are rejected with `MalformedInput` and the frame
    /// is dropped. Speech frames extend the open segment (opening one if
    /// needed); a silence frame that pushes the running silence past the
    /// threshold closes it.
    pub fn ingest(
        &mut self,
        frame: AudioFrame,
        activity: VoiceActivity,
    ) -> Result<Option<SegmentEvent>, PipelineError> {
        let ts = frame.timestamp_ms;

        if let Some(last) = self.last_timestamp_ms {
            if ts <= last {
                return Err(PipelineError::MalformedInput(format!(
                    "frame timestamp {}ms not after {}ms",
                    ts, last
                )));
            }
        }
        self.last_timestamp_ms = Some(ts);
        self.frames_seen += 1;

        match activity {
            VoiceActivity::Speech => {
                let start = match self.segment_start_ms {
                    Some(start) => start,
                    None => {
                        self.segment_start_ms = Some(ts);
                        ts
                    }
                };
                self.last_speech_ms = Some(ts);
                self.frames.push(frame);

                Ok(Some(SegmentEvent::SegmentExtended {
                    start_ms: start,
                    end_ms: ts,
                }))
            }
            VoiceActivity::Silence => {
                let Some(start) = self.segment_start_ms else {
                    return Ok(None);
                };

                if self.silence_duration_at(ts) >= self.silence_close_ms {
                    let end = self.last_speech_ms.unwrap_or(start);
                    let segment =
                        SpeechSegment::new(std::mem::take(&mut self.frames), start, end);
                    self.segment_start_ms = None;
                    self.segments_closed += 1;

                    tracing::debug!(
                        start_ms = start,
                        end_ms = end,
                        frames = segment.len(),
                        "Closed speech segment"
                    );
                    Ok(Some(SegmentEvent::SegmentClosed(segment)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Running silence duration as of `now_ms`
    ///
    /// Zero until the first speech frame is seen.
    pub fn silence_duration_at(&self, now_ms: u64) -> u64 {
        self.last_speech_ms
            .map(|t| now_ms.saturating_sub(t))
            .unwrap_or(0)
    }

    /// Restore a closed segment as the open one
    ///
    /// Used when a committed turn is retracted: the speaker resumed, so the
    /// segment was not actually finished.
    pub fn reopen(&mut self, segment: SpeechSegment) {
        self.segment_start_ms = Some(segment.start_ms());
        self.last_speech_ms = Some(segment.end_ms());
        self.frames = segment.into_frames();
    }

    /// True when a segment is currently open
    pub fn has_open_segment(&self) -> bool {
        self.segment_start_ms.is_some()
    }

    /// Frames accepted so far
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Segments closed so far
    pub fn segments_closed(&self) -> u64 {
        self.segments_closed
    }
}
