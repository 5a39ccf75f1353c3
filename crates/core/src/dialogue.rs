//! Dialogue history
//!
//! Tagged turn entries and the bounded per-session history the semantic
//! judge draws its context from.

use serde::{Deserialize, Serialize};

/// One entry in the dialogue history
///
/// Inspected by kind; user utterances and agent responses pair up into
/// exchanges, and overflow is compacted into a single `Aggregate` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TurnEntry {
    /// A committed user utterance
    User { text: String, timestamp_ms: u64 },
    /// The agent response that answered the preceding user turn
    Agent { text: String },
    /// Several older entries folded into one compacted record
    Aggregate { entries: Vec<TurnEntry> },
}

impl TurnEntry {
    /// Text carried by this entry; aggregates join their members
    pub fn text(&self) -> String {
        match self {
            TurnEntry::User { text, .. } | TurnEntry::Agent { text } => text.clone(),
            TurnEntry::Aggregate { entries } => entries
                .iter()
                .map(|e| e.text())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// True for user utterances
    pub fn is_user(&self) -> bool {
        matches!(self, TurnEntry::User { .. })
    }
}

/// Bounded per-session dialogue history
///
/// Owned exclusively by the session's orchestrator. Unlike the judgment
/// ledger this is working context, not an audit trail: a retracted commit
/// removes its user entry again.
#[derive(Debug, Clone)]
pub struct DialogueHistory {
    entries: Vec<TurnEntry>,
    max_entries: usize,
}

impl DialogueHistory {
    /// Create a history bounded to `max_entries` top-level entries
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(2),
        }
    }

    /// Append a committed user utterance
    pub fn push_user(&mut self, text: impl Into<String>, timestamp_ms: u64) {
        self.entries.push(TurnEntry::User {
            text: text.into(),
            timestamp_ms,
        });
        self.compact();
    }

    /// Append an agent response
    pub fn push_agent(&mut self, text: impl Into<String>) {
        self.entries.push(TurnEntry::Agent { text: text.into() });
        self.compact();
    }

    /// Remove the most recent user entry, if it is the newest entry
    ///
    /// Called when a committed turn is retracted: the utterance is still in
    /// progress, so it must not count as finished context.
    pub fn retract_last_user(&mut self) -> bool {
        if matches!(self.entries.last(), Some(TurnEntry::User { .. })) {
            self.entries.pop();
            true
        } else {
            false
        }
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[TurnEntry] {
        &self.entries
    }

    /// Snapshot for handing across a task boundary
    pub fn snapshot(&self) -> Vec<TurnEntry> {
        self.entries.clone()
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold the oldest half into a single aggregate once over capacity
    fn compact(&mut self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let keep_from = self.entries.len() / 2;
        let folded: Vec<TurnEntry> = self.entries.drain(..keep_from).collect();
        self.entries.insert(0, TurnEntry::Aggregate { entries: folded });
    }
}
