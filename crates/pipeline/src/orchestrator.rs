//! Turn orchestrator
//!
//! One instance per active session. Consumes frame, transcript, and
//! classifier events, drives the silence gate and the semantic judge, and
//! commits or retracts turn completion. Deliberately free of IO: inputs are
//! methods, outputs are returned actions, and the session driver owns the
//! actual judge dispatch and pre-reply staging. This keeps the machine
//! strictly sequential: at most one transition in flight per session.

use std::collections::{HashMap, VecDeque};

use turngate_config::{JudgeConfig, TurnConfig};
use turngate_core::{
    AudioFrame, DialogueHistory, Emotion, FinalTranscript, Intent, PartialTranscript,
    SegmentEvent, SpeechSegment, TurnTask, UserState, VoiceActivity,
};
use turngate_judge::{JudgeContext, Verdict};

use crate::gate::{GateDecision, SilenceGate};
use crate::ledger::{JudgeLedger, JudgeRecord};
use crate::segmenter::SegmentAssembler;

/// Orchestrator phase
///
/// The silence-pending window below the escalation threshold is folded into
/// `Listening`; interruption is a transition back to `Listening`, not a
/// resting phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Accumulating speech and partial transcripts
    Listening,
    /// Judge invoked, awaiting verdict
    Escalated,
    /// Turn closed, user state emitted, interruption window open
    Committed,
}

/// A judge invocation the driver must dispatch
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    /// Turn the verdict will apply to
    pub turn_id: u64,
    /// The bounded judgment context, built at escalation time
    pub context: JudgeContext,
}

/// Result of a frame ingestion that requires driver action
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    /// The gate fired: dispatch this judge request
    Escalated(JudgeRequest),
    /// Speech resumed after commit: the turn is retracted, any staged
    /// pre-reply must be discarded and never delivered
    Interrupted { turn_id: u64 },
}

/// A committed turn
#[derive(Debug, Clone)]
pub struct Commitment {
    /// The consolidated snapshot for downstream response generation
    pub user_state: UserState,
    /// The once-only final transcript
    pub transcript: FinalTranscript,
}

/// Per-session turn orchestrator
pub struct TurnOrchestrator {
    session_id: String,
    turn_config: TurnConfig,
    judge_config: JudgeConfig,

    phase: TurnPhase,
    assembler: SegmentAssembler,
    gate: SilenceGate,
    ledger: JudgeLedger,
    history: DialogueHistory,

    task: TurnTask,
    turn_seq: u64,
    current_partial: Option<PartialTranscript>,
    pending_context: Option<JudgeContext>,
    last_segment: Option<SpeechSegment>,
    turn_start_ms: Option<u64>,
    turn_last_speech_ms: u64,

    classifications: VecDeque<(Emotion, Intent)>,
    dropped_frames: u64,
}

impl TurnOrchestrator {
    pub fn new(
        session_id: impl Into<String>,
        turn_config: TurnConfig,
        judge_config: JudgeConfig,
    ) -> Self {
        let short_silence = turn_config.short_silence_ms;
        let history_cap = turn_config.history_max_entries;
        Self {
            session_id: session_id.into(),
            turn_config,
            judge_config,
            phase: TurnPhase::Listening,
            assembler: SegmentAssembler::new(short_silence),
            gate: SilenceGate::new(short_silence),
            ledger: JudgeLedger::new(),
            history: DialogueHistory::new(history_cap),
            task: TurnTask::new(1),
            turn_seq: 1,
            current_partial: None,
            pending_context: None,
            last_segment: None,
            turn_start_ms: None,
            turn_last_speech_ms: 0,
            classifications: VecDeque::new(),
            dropped_frames: 0,
        }
    }

    /// Session this orchestrator belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current phase
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Working record for the turn in progress
    pub fn task(&self) -> &TurnTask {
        &self.task
    }

    /// Judgment ledger (diagnostics, no side effects)
    pub fn ledger(&self) -> &JudgeLedger {
        &self.ledger
    }

    /// The configured recent window of the judgment ledger
    pub fn recent_judgments(&self) -> &[JudgeRecord] {
        self.ledger.recent(self.turn_config.recent_window)
    }

    /// Frames dropped as malformed
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Ingest one audio frame with its voice-activity classification
    ///
    /// System-side audio (`is_operator`) never counts as user speech: it
    /// neither extends segments nor triggers interruption.
    pub fn on_frame(&mut self, frame: AudioFrame, activity: VoiceActivity) -> Option<FrameOutcome> {
        if frame.is_operator {
            return None;
        }
        let ts = frame.timestamp_ms;

        match self.phase {
            TurnPhase::Listening | TurnPhase::Escalated => {
                let event = self.ingest_logged(frame, activity)?;

                match activity {
                    VoiceActivity::Speech => {
                        self.gate.reset();
                        if self.turn_start_ms.is_none() {
                            self.turn_start_ms = Some(ts);
                        }
                        self.turn_last_speech_ms = ts;
                        None
                    }
                    VoiceActivity::Silence => {
                        if let Some(SegmentEvent::SegmentClosed(segment)) = event {
                            self.last_segment = Some(segment);
                        }

                        // While escalated, new frames extend the pending
                        // segment but never trigger a second judge call.
                        if self.phase != TurnPhase::Listening {
                            return None;
                        }

                        let silence = self.assembler.silence_duration_at(ts);
                        match self.gate.evaluate(silence) {
                            GateDecision::Continue => None,
                            GateDecision::Escalate => self.escalate(silence),
                        }
                    }
                }
            }
            TurnPhase::Committed => match activity {
                VoiceActivity::Speech => Some(self.interrupt(frame)),
                VoiceActivity::Silence => None,
            },
        }
    }

    /// Replace the current partial transcript
    pub fn on_partial(&mut self, partial: PartialTranscript) {
        self.current_partial = Some(partial);
    }

    /// Buffer an emotion/intent classification for the turn join
    pub fn on_classification(&mut self, emotion: Emotion, intent: Intent) {
        self.classifications.push_back((emotion, intent));
        while self.classifications.len() > 32 {
            self.classifications.pop_front();
        }
    }

    /// Apply a judge verdict
    ///
    /// `Complete` commits the turn and yields the one-and-only `Commitment`;
    /// `Incomplete` and `Undetermined` return to listening and keep
    /// accumulating. Verdicts outside the escalated phase are stale and
    /// ignored.
    pub fn on_verdict(&mut self, verdict: Verdict) -> Option<Commitment> {
        if self.phase != TurnPhase::Escalated {
            tracing::debug!(
                session_id = %self.session_id,
                ?verdict,
                "Ignoring verdict outside escalated phase"
            );
            return None;
        }

        let context = self.pending_context.take();

        match verdict {
            Verdict::Complete => Some(self.commit(context, verdict)),
            Verdict::Incomplete | Verdict::Undetermined => {
                tracing::debug!(
                    session_id = %self.session_id,
                    turn_id = self.task.turn_id,
                    ?verdict,
                    "Turn not complete, continuing to listen"
                );
                self.phase = TurnPhase::Listening;
                None
            }
        }
    }

    /// Downstream consumption of a committed turn finished
    ///
    /// Records the agent's response in the dialogue history and opens the
    /// next turn.
    pub fn on_agent_reply(&mut self, turn_id: u64, reply: &str) {
        if self.phase != TurnPhase::Committed || self.task.turn_id != turn_id {
            tracing::debug!(
                session_id = %self.session_id,
                turn_id,
                "Agent reply for a non-current turn, ignoring"
            );
            return;
        }

        if !reply.trim().is_empty() {
            self.history.push_agent(reply.trim());
        }
        self.begin_next_turn();
    }

    /// Accept a staged pre-reply draft
    ///
    /// Only lands if the turn is still the current committed, unretracted
    /// one; otherwise the draft is dropped and `false` returned.
    pub fn set_pre_reply(&mut self, turn_id: u64, text: impl Into<String>) -> bool {
        if self.phase == TurnPhase::Committed
            && self.task.turn_id == turn_id
            && self.task.is_finished
        {
            self.task.pre_reply = text.into();
            true
        } else {
            false
        }
    }

    fn ingest_logged(
        &mut self,
        frame: AudioFrame,
        activity: VoiceActivity,
    ) -> Option<Option<SegmentEvent>> {
        match self.assembler.ingest(frame, activity) {
            Ok(event) => Some(event),
            Err(e) => {
                self.dropped_frames += 1;
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    dropped = self.dropped_frames,
                    "Dropping malformed frame"
                );
                None
            }
        }
    }

    fn escalate(&mut self, silence_ms: u64) -> Option<FrameOutcome> {
        let candidate = match &self.current_partial {
            Some(partial) if !partial.is_empty() => partial.text.clone(),
            _ => {
                // Nothing to judge; the episode re-arms on next speech.
                tracing::debug!(
                    session_id = %self.session_id,
                    "Gate fired without transcript text, skipping judge"
                );
                return None;
            }
        };

        let context = JudgeContext::build(self.history.entries(), &candidate, &self.judge_config);
        self.pending_context = Some(context.clone());
        self.phase = TurnPhase::Escalated;

        tracing::debug!(
            session_id = %self.session_id,
            turn_id = self.task.turn_id,
            silence_ms,
            "Silence gate fired, escalating to semantic judge"
        );

        Some(FrameOutcome::Escalated(JudgeRequest {
            turn_id: self.task.turn_id,
            context,
        }))
    }

    fn commit(&mut self, context: Option<JudgeContext>, verdict: Verdict) -> Commitment {
        let text = self
            .current_partial
            .take()
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        let end_ms = self.turn_last_speech_ms;
        let start_ms = self.turn_start_ms.unwrap_or(end_ms);
        let transcript = FinalTranscript::new(text.clone(), end_ms.saturating_sub(start_ms));

        let (emotion, intent) = self.join_classification(end_ms);

        let mut metadata = HashMap::new();
        metadata.insert("session_id".to_string(), self.session_id.clone());
        metadata.insert(
            "duration_ms".to_string(),
            transcript.duration_ms.to_string(),
        );

        let user_state = UserState {
            emotion,
            intent,
            utterance: text.clone(),
            turn_id: self.task.turn_id,
            metadata,
        };

        if let Some(context) = context {
            self.ledger.record(context, verdict);
        }
        self.history.push_user(text, end_ms);
        self.task.is_finished = true;
        self.phase = TurnPhase::Committed;

        tracing::info!(
            session_id = %self.session_id,
            turn_id = self.task.turn_id,
            duration_ms = transcript.duration_ms,
            "Turn committed"
        );

        Commitment {
            user_state,
            transcript,
        }
    }

    fn interrupt(&mut self, frame: AudioFrame) -> FrameOutcome {
        let turn_id = self.task.turn_id;
        let ts = frame.timestamp_ms;

        let flipped = self.ledger.mark_last_incorrect();
        tracing::info!(
            session_id = %self.session_id,
            turn_id,
            ledger_flipped = flipped,
            "Speech resumed after commit, retracting turn"
        );

        if let Some(segment) = self.last_segment.take() {
            self.assembler.reopen(segment);
        }
        self.history.retract_last_user();

        self.task.is_finished = false;
        self.task.pre_reply.clear();
        self.phase = TurnPhase::Listening;
        self.gate.reset();

        self.ingest_logged(frame, VoiceActivity::Speech);
        self.turn_last_speech_ms = ts;

        FrameOutcome::Interrupted { turn_id }
    }

    fn begin_next_turn(&mut self) {
        self.turn_seq += 1;
        self.task = TurnTask::new(self.turn_seq);
        self.phase = TurnPhase::Listening;
        self.current_partial = None;
        self.pending_context = None;
        self.last_segment = None;
        self.turn_start_ms = None;
        self.gate.reset();

        tracing::debug!(
            session_id = %self.session_id,
            turn_id = self.turn_seq,
            "Ready for next turn"
        );
    }

    /// Nearest preceding classification within the join window, else
    /// neutral/unknown defaults
    fn join_classification(&self, end_ms: u64) -> (Emotion, Intent) {
        let window = self.turn_config.classification_window_ms;
        let joined = self
            .classifications
            .iter()
            .rev()
            .find(|(emotion, _)| {
                emotion.timestamp_ms <= end_ms
                    && end_ms.saturating_sub(emotion.timestamp_ms) <= window
            });

        match joined {
            Some((emotion, intent)) => (emotion.clone(), intent.clone()),
            None => (Emotion::neutral(end_ms), Intent::unknown(end_ms)),
        }
    }
}
