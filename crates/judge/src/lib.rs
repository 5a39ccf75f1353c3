//! Semantic turn-completeness judgment
//!
//! This crate owns the slow half of the turn-completion decision:
//! - Bounded judgment context construction from dialogue history
//! - Dispatch to an external language-model transport with a mandatory
//!   timeout
//! - Conservative verdict parsing (any failure degrades to undetermined)
//! - Speculative pre-reply staging with safe, abort-based discard

pub mod judge;
pub mod prereply;
pub mod prompt;

pub use judge::{JudgeClient, JudgeStats, SemanticJudge, Verdict};
pub use prereply::{PreReplyStager, ReplyGenerator, StagedReply, StagerStats};
pub use prompt::{JudgeContext, Message, Role};

use thiserror::Error;

/// Judge transport errors
///
/// None of these are fatal to a session: every variant degrades to
/// `Verdict::Undetermined` at the judge boundary.
#[derive(Error, Debug, Clone)]
pub enum JudgeError {
    #[error("Judge call timed out")]
    Timeout,

    #[error("Judge transport error: {0}")]
    Transport(String),

    #[error("Unparseable judge response: {0}")]
    Unparseable(String),
}

/// Pre-reply staging errors
#[derive(Error, Debug, Clone)]
pub enum PreReplyError {
    #[error("Pre-reply generation error: {0}")]
    Generation(String),
}
