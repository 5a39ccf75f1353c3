//! Fast silence gate
//!
//! The cheap per-frame rule that decides whether accumulated silence
//! warrants the expensive semantic check. The sole trigger path for the
//! judge: it fires at most once per silence episode and re-arms only when
//! speech resumes.

/// Gate decision for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Below threshold, or already fired this episode
    Continue,
    /// Threshold crossed; invoke the semantic judge
    Escalate,
}

/// Silence-duration gate
pub struct SilenceGate {
    threshold_ms: u64,
    fired: bool,
}

impl SilenceGate {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            fired: false,
        }
    }

    /// Evaluate the running silence duration
    pub fn evaluate(&mut self, silence_ms: u64) -> GateDecision {
        if !self.fired && silence_ms >= self.threshold_ms {
            self.fired = true;
            GateDecision::Escalate
        } else {
            GateDecision::Continue
        }
    }

    /// Re-arm the gate (silence episode ended)
    pub fn reset(&mut self) {
        self.fired = false;
    }

    /// True once the gate has fired for the current episode
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Configured threshold in milliseconds
    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }
}
