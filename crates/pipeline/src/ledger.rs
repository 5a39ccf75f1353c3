//! Judgment history ledger
//!
//! Append-only per-session record of judge invocations: the dispatched
//! context, the raw verdict, and a correctness annotation. The audit trail
//! for interruption handling. `record` never mutates prior entries; the
//! only permitted mutation is flipping the newest entry's `is_correct` to
//! false when a committed turn turns out to have been an interruption.

use chrono::{DateTime, Utc};
use serde::Serialize;
use turngate_judge::{JudgeContext, Verdict};

/// One judge invocation's record
#[derive(Debug, Clone, Serialize)]
pub struct JudgeRecord {
    /// The context dispatched to the judge
    pub context: JudgeContext,
    /// The verdict it returned
    pub verdict: Verdict,
    /// Correctness annotation; true until retroactively flipped
    pub is_correct: bool,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Append-only judgment history for one session
#[derive(Debug, Default)]
pub struct JudgeLedger {
    entries: Vec<JudgeRecord>,
}

impl JudgeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a judgment record
    pub fn record(&mut self, context: JudgeContext, verdict: Verdict) -> &JudgeRecord {
        self.entries.push(JudgeRecord {
            context,
            verdict,
            is_correct: true,
            recorded_at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    /// The chronologically latest `n` entries, most-recent last
    pub fn recent(&self, n: usize) -> &[JudgeRecord] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Flip `is_correct` on the most recent entry
    ///
    /// No-op when the ledger is empty or the entry was already flipped;
    /// returns whether a flip happened.
    pub fn mark_last_incorrect(&mut self) -> bool {
        match self.entries.last_mut() {
            Some(entry) if entry.is_correct => {
                entry.is_correct = false;
                true
            }
            _ => false,
        }
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries, oldest first (diagnostics, no side effects)
    pub fn iter(&self) -> impl Iterator<Item = &JudgeRecord> {
        self.entries.iter()
    }
}
