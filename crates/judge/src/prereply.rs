//! Speculative pre-reply staging
//!
//! Response generation starts as soon as a turn commits, before the commit
//! is irrevocable. The draft runs as an abortable task: if the speaker
//! resumes (interruption), the stage is discarded and the draft is never
//! delivered.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};

use turngate_core::UserState;

use crate::PreReplyError;

/// Downstream response-generation collaborator
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Draft a response for the committed turn
    async fn draft(&self, state: &UserState) -> Result<String, PreReplyError>;
}

/// A pre-reply generation in flight
///
/// Holds the draft task and its abort handle. Dropping the stage without
/// calling `join` leaves the task running detached; `discard` aborts it.
pub struct StagedReply {
    turn_id: u64,
    handle: JoinHandle<Result<String, PreReplyError>>,
    abort: AbortHandle,
}

impl StagedReply {
    /// Turn this draft was staged for
    pub fn turn_id(&self) -> u64 {
        self.turn_id
    }

    /// Abort the draft without delivering it
    pub fn discard(self) {
        self.abort.abort();
        tracing::debug!(turn_id = self.turn_id, "Discarded staged pre-reply");
    }

    /// Await the draft
    ///
    /// Returns `None` if generation failed or the task was aborted. Must be
    /// called at most once to completion.
    pub async fn join(&mut self) -> Option<String> {
        match (&mut self.handle).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!(turn_id = self.turn_id, error = %e, "Pre-reply generation failed");
                None
            }
            Err(e) => {
                if !e.is_cancelled() {
                    tracing::warn!(turn_id = self.turn_id, error = %e, "Pre-reply task died");
                }
                None
            }
        }
    }
}

/// Staging statistics
#[derive(Debug, Clone, Default)]
pub struct StagerStats {
    pub staged: usize,
    pub delivered: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// Pre-reply stager
pub struct PreReplyStager {
    generator: Arc<dyn ReplyGenerator>,
    stats: Mutex<StagerStats>,
}

impl PreReplyStager {
    pub fn new(generator: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            generator,
            stats: Mutex::new(StagerStats::default()),
        }
    }

    /// Start drafting a response for a freshly committed turn
    pub fn stage(&self, state: UserState) -> StagedReply {
        let generator = Arc::clone(&self.generator);
        let turn_id = state.turn_id;

        let handle = tokio::spawn(async move { generator.draft(&state).await });
        let abort = handle.abort_handle();

        self.stats.lock().staged += 1;
        tracing::debug!(turn_id, "Staged pre-reply generation");

        StagedReply {
            turn_id,
            handle,
            abort,
        }
    }

    /// Record a delivered draft
    pub fn mark_delivered(&self) {
        self.stats.lock().delivered += 1;
    }

    /// Record a discarded draft
    pub fn mark_discarded(&self) {
        self.stats.lock().discarded += 1;
    }

    /// Record a failed draft
    pub fn mark_failed(&self) {
        self.stats.lock().failed += 1;
    }

    /// Snapshot of staging statistics
    pub fn stats(&self) -> StagerStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use turngate_core::{Emotion, Intent};

    struct SlowGenerator {
        reply: String,
        delay: Duration,
    }

    #[async_trait]
    impl ReplyGenerator for SlowGenerator {
        async fn draft(&self, state: &UserState) -> Result<String, PreReplyError> {
            tokio::time::sleep(self.delay).await;
            Ok(format!("{} (turn {})", self.reply, state.turn_id))
        }
    }

    fn user_state(turn_id: u64) -> UserState {
        UserState {
            emotion: Emotion::neutral(0),
            intent: Intent::unknown(0),
            utterance: "book a table".to_string(),
            turn_id,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_stage_and_join() {
        let stager = PreReplyStager::new(Arc::new(SlowGenerator {
            reply: "certainly".to_string(),
            delay: Duration::from_millis(5),
        }));

        let mut staged = stager.stage(user_state(7));
        assert_eq!(staged.turn_id(), 7);

        let text = staged.join().await;
        assert_eq!(text.as_deref(), Some("certainly (turn 7)"));
        assert_eq!(stager.stats().staged, 1);
    }

    #[tokio::test]
    async fn test_discard_aborts_generation() {
        let stager = PreReplyStager::new(Arc::new(SlowGenerator {
            reply: "never delivered".to_string(),
            delay: Duration::from_secs(60),
        }));

        let staged = stager.stage(user_state(1));
        staged.discard();
        stager.mark_discarded();

        assert_eq!(stager.stats().discarded, 1);
        assert_eq!(stager.stats().delivered, 0);
    }

    #[tokio::test]
    async fn test_join_after_abort_yields_none() {
        let stager = PreReplyStager::new(Arc::new(SlowGenerator {
            reply: "x".to_string(),
            delay: Duration::from_secs(60),
        }));

        let mut staged = stager.stage(user_state(2));
        staged.abort.abort();
        assert!(staged.join().await.is_none());
    }
}
