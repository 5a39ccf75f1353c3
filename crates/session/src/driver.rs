//! Session driver
//!
//! The single owner of a session's turn orchestrator. Runs one event loop
//! per session: ingress events, the at most one in-flight judge call, and
//! the at most one staged pre-reply all multiplex through `tokio::select!`,
//! so frame ingestion never blocks on the judge await. Teardown cancels the
//! in-flight judge call and discards any staged pre-reply; the ledger keeps
//! only what was already recorded.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use turngate_core::{AudioFrame, Emotion, Intent, PartialTranscript, UserState, VoiceActivity};
use turngate_judge::{PreReplyStager, SemanticJudge, StagedReply, Verdict};
use turngate_pipeline::{FrameOutcome, TurnOrchestrator};

/// Ingress events, keyed by session via the handle they are sent through
///
/// Per-session ordering is the collaborator's responsibility; cross-session
/// ordering is not assumed.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// An audio frame with its voice-activity classification
    Frame {
        frame: AudioFrame,
        activity: VoiceActivity,
    },
    /// An incremental transcript, replacing the previous partial
    Partial(PartialTranscript),
    /// Emotion/intent classifier output for an utterance
    Classification { emotion: Emotion, intent: Intent },
    /// Downstream finished consuming a committed turn
    AgentReplied { turn_id: u64, text: String },
}

/// Egress events
#[derive(Debug, Clone)]
pub enum SessionOutput {
    /// The sole externally observable commit signal, once per committed turn
    TurnCommitted(UserState),
    /// Staged pre-reply hint for a still-valid committed turn
    PreReply { turn_id: u64, text: String },
    /// A previously committed turn was invalidated by resumed speech
    TurnRetracted { turn_id: u64 },
}

/// Per-session event loop
pub struct SessionDriver {
    orchestrator: TurnOrchestrator,
    judge: Arc<SemanticJudge>,
    stager: Option<Arc<PreReplyStager>>,
    events_rx: mpsc::Receiver<SessionEvent>,
    output_tx: mpsc::Sender<SessionOutput>,
    shutdown_rx: watch::Receiver<bool>,
    judge_inflight: Option<JoinHandle<Verdict>>,
    staged: Option<StagedReply>,
}

impl SessionDriver {
    pub fn new(
        orchestrator: TurnOrchestrator,
        judge: Arc<SemanticJudge>,
        stager: Option<Arc<PreReplyStager>>,
        events_rx: mpsc::Receiver<SessionEvent>,
        output_tx: mpsc::Sender<SessionOutput>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            orchestrator,
            judge,
            stager,
            events_rx,
            output_tx,
            shutdown_rx,
            judge_inflight: None,
            staged: None,
        }
    }

    /// Run the session to completion
    ///
    /// Exits on shutdown signal or when the ingress channel closes.
    pub async fn run(mut self) {
        tracing::info!(session_id = %self.orchestrator.session_id(), "Session driver started");

        loop {
            tokio::select! {
                result = self.shutdown_rx.changed() => {
                    if result.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
                event = self.events_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    }
                }
                verdict = poll_judge(&mut self.judge_inflight), if self.judge_inflight.is_some() => {
                    self.judge_inflight = None;
                    self.apply_verdict(verdict).await;
                }
                draft = poll_staged(&mut self.staged), if self.staged.is_some() => {
                    if let Some(staged) = self.staged.take() {
                        self.deliver_draft(staged.turn_id(), draft).await;
                    }
                }
            }
        }

        self.teardown();
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame { frame, activity } => {
                match self.orchestrator.on_frame(frame, activity) {
                    Some(FrameOutcome::Escalated(request)) => {
                        let judge = Arc::clone(&self.judge);
                        self.judge_inflight = Some(tokio::spawn(async move {
                            judge.judge(&request.context).await
                        }));
                    }
                    Some(FrameOutcome::Interrupted { turn_id }) => {
                        if let Some(staged) = self.staged.take() {
                            staged.discard();
                            if let Some(stager) = &self.stager {
                                stager.mark_discarded();
                            }
                        }
                        let _ = self
                            .output_tx
                            .send(SessionOutput::TurnRetracted { turn_id })
                            .await;
                    }
                    None => {}
                }
            }
            SessionEvent::Partial(partial) => self.orchestrator.on_partial(partial),
            SessionEvent::Classification { emotion, intent } => {
                self.orchestrator.on_classification(emotion, intent)
            }
            SessionEvent::AgentReplied { turn_id, text } => {
                self.orchestrator.on_agent_reply(turn_id, &text)
            }
        }
    }

    async fn apply_verdict(&mut self, verdict: Verdict) {
        if let Some(commitment) = self.orchestrator.on_verdict(verdict) {
            let user_state = commitment.user_state;

            if let Some(stager) = &self.stager {
                self.staged = Some(stager.stage(user_state.clone()));
            }

            let _ = self
                .output_tx
                .send(SessionOutput::TurnCommitted(user_state))
                .await;
        }
    }

    async fn deliver_draft(&mut self, turn_id: u64, draft: Option<String>) {
        let Some(text) = draft else {
            if let Some(stager) = &self.stager {
                stager.mark_failed();
            }
            return;
        };

        if self.orchestrator.set_pre_reply(turn_id, text.clone()) {
            if let Some(stager) = &self.stager {
                stager.mark_delivered();
            }
            let _ = self
                .output_tx
                .send(SessionOutput::PreReply { turn_id, text })
                .await;
        } else {
            // The turn moved on while the draft was generating.
            if let Some(stager) = &self.stager {
                stager.mark_discarded();
            }
        }
    }

    fn teardown(mut self) {
        if let Some(handle) = self.judge_inflight.take() {
            handle.abort();
        }
        if let Some(staged) = self.staged.take() {
            staged.discard();
            if let Some(stager) = &self.stager {
                stager.mark_discarded();
            }
        }
        tracing::info!(session_id = %self.orchestrator.session_id(), "Session driver stopped");
    }
}

async fn poll_judge(inflight: &mut Option<JoinHandle<Verdict>>) -> Verdict {
    match inflight {
        // A panicked judge task degrades like any other judge failure.
        Some(handle) => handle.await.unwrap_or(Verdict::Undetermined),
        None => std::future::pending().await,
    }
}

async fn poll_staged(staged: &mut Option<StagedReply>) -> Option<String> {
    match staged {
        Some(staged) => staged.join().await,
        None => std::future::pending().await,
    }
}
