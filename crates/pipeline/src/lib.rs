//! Turn-completion decision pipeline
//!
//! This crate provides the per-session decision core:
//! - Segment assembly over timestamped audio frames
//! - The fast silence gate that arms the semantic check
//! - The append-only judgment ledger with retroactive correction
//! - The turn orchestrator state machine

pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod segmenter;

pub use gate::{GateDecision, SilenceGate};
pub use ledger::{JudgeLedger, JudgeRecord};
pub use orchestrator::{
    Commitment, FrameOutcome, JudgeRequest, TurnOrchestrator, TurnPhase,
};
pub use segmenter::SegmentAssembler;

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// Out-of-order or duplicate frame; dropped, never fatal to the session
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}
