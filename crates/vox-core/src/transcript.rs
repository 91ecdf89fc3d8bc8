//! Transcript reconstruction from incremental deltas.
//!
//! The remote stream delivers utterances as small text fragments with no
//! explicit boundary markers. [`TranscriptLog::append`] folds them into
//! ordered, role-tagged turns: a delta with the same role as the last
//! turn concatenates in place, a role change starts a new turn. The
//! produced sequence is identical regardless of how finely the stream
//! chunks its deltas, as long as delivery order is preserved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a transcript turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The local user.
    User,
    /// The remote model.
    Agent,
}

/// One complete utterance, reconstructed from deltas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptTurn {
    /// Who spoke.
    pub role: Role,
    /// Full utterance text so far.
    pub text: String,
    /// When the first delta of this turn arrived.
    pub created_at: DateTime<Utc>,
}

/// Append-only ordered sequence of turns for one session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptLog {
    turns: Vec<TranscriptTurn>,
}

impl TranscriptLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a delta into the log.
    ///
    /// Boundary inference is purely "role changed since last delta":
    /// same role extends the last turn, different role appends a new one
    /// stamped with the current time.
    pub fn append(&mut self, role: Role, delta: &str) {
        match self.turns.last_mut() {
            Some(last) if last.role == role => last.text.push_str(delta),
            _ => self.turns.push(TranscriptTurn {
                role,
                text: delta.to_owned(),
                created_at: Utc::now(),
            }),
        }
    }

    /// Ordered view of all turns.
    #[must_use]
    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    /// The last `n` turns, for condensed resumption context.
    #[must_use]
    pub fn tail(&self, n: usize) -> &[TranscriptTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Number of turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
