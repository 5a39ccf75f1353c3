//! Integration tests for the session driver and registry
//!
//! These drive full sessions through the public surface: ingress events in,
//! commit/retract/pre-reply outputs out.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use turngate_config::Settings;
use turngate_core::{
    AudioFrame, Channels, PartialTranscript, SampleRate, UserState, VoiceActivity,
};
use turngate_judge::{
    JudgeClient, JudgeError, Message, PreReplyError, ReplyGenerator, SemanticJudge,
};
use turngate_session::{RegistryError, SessionEvent, SessionOutput, SessionRegistry};

/// Judge transport that always answers with the same reply after a delay
struct FixedJudgeClient {
    reply: String,
    delay: Duration,
}

#[async_trait]
impl JudgeClient for FixedJudgeClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, JudgeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply.clone())
    }
}

/// Reply generator echoing the utterance after a delay
struct EchoGenerator {
    delay: Duration,
}

#[async_trait]
impl ReplyGenerator for EchoGenerator {
    async fn draft(&self, state: &UserState) -> Result<String, PreReplyError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("you said: {}", state.utterance))
    }
}

fn registry(judge_delay: Duration, reply_delay: Duration) -> Arc<SessionRegistry> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let settings = Settings::default();
    let judge = Arc::new(SemanticJudge::new(
        Arc::new(FixedJudgeClient {
            reply: "COMPLETE".to_string(),
            delay: judge_delay,
        }),
        settings.judge.clone(),
    ));
    let generator = Arc::new(EchoGenerator { delay: reply_delay });

    Arc::new(SessionRegistry::new(settings, judge, generator))
}

fn frame(ts: u64) -> AudioFrame {
    AudioFrame::new(vec![0.0; 160], SampleRate::Hz16000, Channels::Mono, ts)
}

/// Speech, a partial transcript, then enough silence to cross the gate
async fn speak_utterance(
    handle: &turngate_session::SessionHandle,
    base_ms: u64,
    text: &str,
) {
    for ts in (base_ms..base_ms + 100).step_by(10) {
        handle
            .send(SessionEvent::Frame {
                frame: frame(ts),
                activity: VoiceActivity::Speech,
            })
            .await
            .expect("send frame");
    }
    handle
        .send(SessionEvent::Partial(PartialTranscript::new(
            text,
            0.9,
            base_ms + 90,
        )))
        .await
        .expect("send partial");
    for ts in (base_ms + 100..base_ms + 500).step_by(50) {
        handle
            .send(SessionEvent::Frame {
                frame: frame(ts),
                activity: VoiceActivity::Silence,
            })
            .await
            .expect("send frame");
    }
}

async fn expect_output(
    output_rx: &mut mpsc::Receiver<SessionOutput>,
    what: &str,
) -> SessionOutput {
    timeout(Duration::from_secs(2), output_rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .unwrap_or_else(|| panic!("output channel closed waiting for {what}"))
}

#[tokio::test]
async fn test_commit_flow_emits_user_state_and_pre_reply() {
    let registry = registry(Duration::ZERO, Duration::from_millis(20));
    let (handle, mut output_rx) = registry.connect().expect("connect");

    speak_utterance(&handle, 0, "what are your opening hours").await;

    let committed = expect_output(&mut output_rx, "TurnCommitted").await;
    let user_state = match committed {
        SessionOutput::TurnCommitted(state) => state,
        other => panic!("expected TurnCommitted, got {:?}", other),
    };
    assert_eq!(user_state.utterance, "what are your opening hours");
    assert_eq!(user_state.turn_id, 1);

    let pre_reply = expect_output(&mut output_rx, "PreReply").await;
    match pre_reply {
        SessionOutput::PreReply { turn_id, text } => {
            assert_eq!(turn_id, 1);
            assert_eq!(text, "you said: what are your opening hours");
        }
        other => panic!("expected PreReply, got {:?}", other),
    }

    registry.disconnect(handle.id()).expect("disconnect");
}

#[tokio::test]
async fn test_interruption_retracts_turn_and_discards_pre_reply() {
    // Pre-reply generation is slow enough that the interruption wins.
    let registry = registry(Duration::ZERO, Duration::from_secs(30));
    let (handle, mut output_rx) = registry.connect().expect("connect");

    speak_utterance(&handle, 0, "I think that is everything").await;

    let committed = expect_output(&mut output_rx, "TurnCommitted").await;
    assert!(matches!(committed, SessionOutput::TurnCommitted(_)));

    // The speaker resumes 200ms after commit.
    handle
        .send(SessionEvent::Frame {
            frame: frame(700),
            activity: VoiceActivity::Speech,
        })
        .await
        .expect("send frame");

    let retracted = expect_output(&mut output_rx, "TurnRetracted").await;
    assert!(matches!(
        retracted,
        SessionOutput::TurnRetracted { turn_id: 1 }
    ));

    // The staged pre-reply was discarded and never delivered.
    let extra = timeout(Duration::from_millis(200), output_rx.recv()).await;
    assert!(extra.is_err(), "no output expected after retraction");

    registry.disconnect(handle.id()).expect("disconnect");
}

#[tokio::test]
async fn test_agent_reply_advances_to_next_turn() {
    let registry = registry(Duration::ZERO, Duration::from_millis(5));
    let (handle, mut output_rx) = registry.connect().expect("connect");

    speak_utterance(&handle, 0, "first question").await;
    let committed = expect_output(&mut output_rx, "TurnCommitted").await;
    let turn_id = match committed {
        SessionOutput::TurnCommitted(state) => state.turn_id,
        other => panic!("expected TurnCommitted, got {:?}", other),
    };

    // Drain the pre-reply, then hand the turn back.
    let _ = expect_output(&mut output_rx, "PreReply").await;
    handle
        .send(SessionEvent::AgentReplied {
            turn_id,
            text: "here is the answer".to_string(),
        })
        .await
        .expect("send reply");

    speak_utterance(&handle, 2000, "second question").await;
    let committed = expect_output(&mut output_rx, "second TurnCommitted").await;
    match committed {
        SessionOutput::TurnCommitted(state) => {
            assert_eq!(state.turn_id, 2);
            assert_eq!(state.utterance, "second question");
        }
        other => panic!("expected TurnCommitted, got {:?}", other),
    }

    registry.disconnect(handle.id()).expect("disconnect");
}

#[tokio::test]
async fn test_registry_lookup_and_rejection() {
    let registry = registry(Duration::ZERO, Duration::ZERO);

    assert!(matches!(
        registry.get("no-such-session"),
        Err(RegistryError::SessionNotFound(_))
    ));

    let (handle, _output_rx) = registry.connect_with_id("session-a").expect("connect");
    assert_eq!(registry.count(), 1);
    assert!(registry.get("session-a").is_ok());

    assert!(matches!(
        registry.connect_with_id("session-a"),
        Err(RegistryError::DuplicateSession(_))
    ));

    registry.disconnect("session-a").expect("disconnect");
    assert_eq!(registry.count(), 0);
    assert!(matches!(
        registry.get("session-a"),
        Err(RegistryError::SessionNotFound(_))
    ));

    // Sends on a closed session are rejected.
    let result = handle
        .send(SessionEvent::Partial(PartialTranscript::new("x", 0.5, 0)))
        .await;
    assert!(matches!(result, Err(RegistryError::SessionClosed(_))));

    assert!(matches!(
        registry.disconnect("session-a"),
        Err(RegistryError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_teardown_cancels_inflight_judge() {
    // Judge slower than its own timeout would ever allow to matter here;
    // teardown must not wait for it.
    let registry = registry(Duration::from_secs(60), Duration::ZERO);
    let (handle, mut output_rx) = registry.connect().expect("connect");

    speak_utterance(&handle, 0, "half finished thought").await;

    // The judge call is in flight; tear the session down underneath it.
    registry.disconnect(handle.id()).expect("disconnect");

    // No commit ever surfaces and the output channel closes promptly.
    let next = timeout(Duration::from_secs(2), output_rx.recv())
        .await
        .expect("driver should stop promptly");
    assert!(next.is_none(), "no output expected after teardown");
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let registry = registry(Duration::ZERO, Duration::from_millis(5));
    let (handle_a, mut output_a) = registry.connect_with_id("session-a").expect("connect a");
    let (handle_b, mut output_b) = registry.connect_with_id("session-b").expect("connect b");

    speak_utterance(&handle_a, 0, "question from a").await;
    speak_utterance(&handle_b, 0, "question from b").await;

    let committed_a = expect_output(&mut output_a, "a's TurnCommitted").await;
    let committed_b = expect_output(&mut output_b, "b's TurnCommitted").await;

    match (committed_a, committed_b) {
        (SessionOutput::TurnCommitted(a), SessionOutput::TurnCommitted(b)) => {
            assert_eq!(a.utterance, "question from a");
            assert_eq!(b.utterance, "question from b");
        }
        other => panic!("expected two commits, got {:?}", other),
    }

    registry.disconnect("session-a").expect("disconnect a");
    registry.disconnect("session-b").expect("disconnect b");
    assert_eq!(registry.count(), 0);
}
