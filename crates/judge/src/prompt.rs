//! Judgment context construction
//!
//! Builds the bounded message list dispatched to the language model: a
//! system instruction describing the binary completeness task, the most
//! recent user turns with their paired agent responses (oldest first), and
//! the candidate utterance last.

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

use turngate_config::JudgeConfig;
use turngate_core::TurnEntry;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One judge invocation's input context
///
/// Built at escalation time so the exact dispatched context can be recorded
/// in the judgment ledger alongside the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeContext {
    /// The utterance under judgment
    pub candidate: String,
    /// Full message list, system instruction first, candidate last
    pub messages: Vec<Message>,
}

impl JudgeContext {
    /// Build a bounded judgment context
    ///
    /// Takes the most recent `context_user_turns` user turns and their
    /// paired agent responses from `history`, oldest first. The total
    /// context is additionally bounded by `max_context_tokens`; when over
    /// budget the oldest history messages are dropped first. Compacted
    /// aggregate entries are outside the recency window and never included.
    pub fn build(history: &[TurnEntry], candidate: &str, config: &JudgeConfig) -> Self {
        let system = Message::system(format!(
            "You judge whether a speaker has finished a conversational turn. \
             Given the conversation so far and the speaker's latest utterance, \
             reply with exactly one token: {} if the utterance is a semantically \
             complete turn, {} if the speaker is likely to continue.",
            config.positive_token, config.negative_token,
        ));

        let mut selected: Vec<Message> = Vec::new();
        let mut user_turns = 0;
        let mut pending_agent: Option<Message> = None;

        // Walk newest-first; an agent response immediately precedes its user
        // turn in this direction, so pairs reassemble naturally.
        for entry in history.iter().rev() {
            match entry {
                TurnEntry::Agent { text } => {
                    pending_agent = Some(Message::assistant(text));
                }
                TurnEntry::User { text, .. } => {
                    if user_turns == config.context_user_turns {
                        break;
                    }
                    if let Some(agent) = pending_agent.take() {
                        selected.push(agent);
                    }
                    selected.push(Message::user(text));
                    user_turns += 1;
                }
                TurnEntry::Aggregate { .. } => break,
            }
        }
        selected.reverse();

        let mut messages = Vec::with_capacity(selected.len() + 2);
        messages.push(system);
        messages.extend(selected);
        messages.push(Message::user(candidate));

        let context = Self {
            candidate: candidate.to_string(),
            messages,
        };
        context.truncated(config.max_context_tokens)
    }

    /// Drop oldest history messages until under the token budget
    ///
    /// The system instruction and the candidate are always kept.
    fn truncated(mut self, max_tokens: usize) -> Self {
        while self.messages.len() > 2 && self.estimate_tokens() > max_tokens {
            self.messages.remove(1);
        }
        self
    }

    /// Estimate token count
    pub fn estimate_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| estimate_message_tokens(&m.content))
            .sum()
    }

    /// History messages between the instruction and the candidate
    pub fn history_len(&self) -> usize {
        self.messages.len().saturating_sub(2)
    }
}

fn estimate_message_tokens(content: &str) -> usize {
    (content.graphemes(true).count().max(1) + 3) / 4
}
