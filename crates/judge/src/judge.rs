//! Semantic completeness judge
//!
//! The highest-latency, highest-failure-risk component in the pipeline. Its
//! failure mode is deliberately conservative: timeout, transport failure, or
//! an unparseable reply all degrade to `Verdict::Undetermined`, which the
//! orchestrator treats as "do not commit, retry on next escalation". A bad
//! model call never terminates a session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use turngate_config::JudgeConfig;

use crate::prompt::{JudgeContext, Message};
use crate::JudgeError;

/// Judge verdict on an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The utterance is a semantically complete turn
    Complete,
    /// The speaker is likely to continue
    Incomplete,
    /// No usable verdict (timeout, transport failure, unparseable reply)
    Undetermined,
}

/// External language-model transport
///
/// The collaborator is expected to return a single short token reply for
/// the dispatched message list.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, JudgeError>;
}

/// Judge call statistics
#[derive(Debug, Clone, Default)]
pub struct JudgeStats {
    pub calls: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub undetermined: usize,
    pub timeouts: usize,
    pub transport_failures: usize,
    pub unparseable: usize,
}

/// Semantic completeness judge
pub struct SemanticJudge {
    client: Arc<dyn JudgeClient>,
    config: JudgeConfig,
    stats: Mutex<JudgeStats>,
}

impl SemanticJudge {
    /// Create a new judge over an external model transport
    pub fn new(client: Arc<dyn JudgeClient>, config: JudgeConfig) -> Self {
        Self {
            client,
            config,
            stats: Mutex::new(JudgeStats::default()),
        }
    }

    /// Judge configuration
    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Judge an utterance for semantic completeness
    ///
    /// Dispatches the prepared context and parses the single-token reply.
    /// Never returns an error: every failure maps to
    /// `Verdict::Undetermined`.
    pub async fn judge(&self, context: &JudgeContext) -> Verdict {
        self.stats.lock().calls += 1;

        let call_timeout = Duration::from_millis(self.config.timeout_ms);

        let verdict = match timeout(call_timeout, self.client.complete(&context.messages)).await {
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.timeout_ms,
                    "Judge call timed out, treating as undetermined"
                );
                self.stats.lock().timeouts += 1;
                Verdict::Undetermined
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Judge transport failed, treating as undetermined");
                self.stats.lock().transport_failures += 1;
                Verdict::Undetermined
            }
            Ok(Ok(reply)) => self.parse_verdict(&reply),
        };

        match verdict {
            Verdict::Complete => self.stats.lock().complete += 1,
            Verdict::Incomplete => self.stats.lock().incomplete += 1,
            Verdict::Undetermined => self.stats.lock().undetermined += 1,
        }

        tracing::debug!(?verdict, candidate = %context.candidate, "Judge verdict");
        verdict
    }

    /// Parse the single-token verdict reply
    ///
    /// Exact match on the configured tokens after trimming; anything else is
    /// undetermined.
    fn parse_verdict(&self, raw: &str) -> Verdict {
        let token = raw.trim();
        if token == self.config.positive_token {
            Verdict::Complete
        } else if token == self.config.negative_token {
            Verdict::Incomplete
        } else {
            tracing::warn!(reply = %raw, "Unparseable judge reply, treating as undetermined");
            self.stats.lock().unparseable += 1;
            Verdict::Undetermined
        }
    }

    /// Snapshot of call statistics
    pub fn stats(&self) -> JudgeStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClient {
        reply: Result<String, JudgeError>,
        delay: Duration,
    }

    #[async_trait]
    impl JudgeClient for FixedClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, JudgeError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply.clone()
        }
    }

    fn judge_with(reply: Result<String, JudgeError>, delay: Duration) -> SemanticJudge {
        SemanticJudge::new(
            Arc::new(FixedClient { reply, delay }),
            JudgeConfig {
                timeout_ms: 100,
                ..JudgeConfig::default()
            },
        )
    }

    fn context() -> JudgeContext {
        JudgeContext::build(&[], "is that all", &JudgeConfig::default())
    }

    #[tokio::test]
    async fn test_exact_token_verdicts() {
        let judge = judge_with(Ok("COMPLETE".to_string()), Duration::ZERO);
        assert_eq!(judge.judge(&context()).await, Verdict::Complete);

        let judge = judge_with(Ok("  INCOMPLETE \n".to_string()), Duration::ZERO);
        assert_eq!(judge.judge(&context()).await, Verdict::Incomplete);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_undetermined() {
        let judge = judge_with(Ok("The turn seems complete.".to_string()), Duration::ZERO);
        assert_eq!(judge.judge(&context()).await, Verdict::Undetermined);
        assert_eq!(judge.stats().unparseable, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_undetermined() {
        let judge = judge_with(
            Err(JudgeError::Transport("connection reset".to_string())),
            Duration::ZERO,
        );
        assert_eq!(judge.judge(&context()).await, Verdict::Undetermined);
        assert_eq!(judge.stats().transport_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_undetermined() {
        let judge = judge_with(Ok("COMPLETE".to_string()), Duration::from_secs(5));
        assert_eq!(judge.judge(&context()).await, Verdict::Undetermined);
        assert_eq!(judge.stats().timeouts, 1);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let judge = judge_with(Ok("COMPLETE".to_string()), Duration::ZERO);
        judge.judge(&context()).await;
        judge.judge(&context()).await;

        let stats = judge.stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.complete, 2);
    }
}
