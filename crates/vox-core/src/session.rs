//! Session lifecycle types.
//!
//! A [`Session`] is the unit of everything: exactly one is current per
//! engine instance, created on start and destroyed on termination. Its
//! [`SessionId`] keys every downstream artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{PersonaId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// SourceKind
// ─────────────────────────────────────────────────────────────────────────────

/// A local media source the engine can capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Front-facing camera.
    Camera,
    /// Microphone input.
    Microphone,
    /// Screen capture.
    Screen,
}

impl SourceKind {
    /// Whether session start fails when this source cannot be acquired.
    /// Screen capture is optional; camera and microphone are not.
    #[must_use]
    pub fn is_mandatory(self) -> bool {
        !matches!(self, Self::Screen)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
            Self::Screen => "screen",
        };
        f.write_str(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// What the session is for — selects the scoring rubric and the remote
/// model's conversational posture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Low-stakes rehearsal with immediate feedback.
    #[default]
    Practice,
    /// Timed, scored assessment.
    Assessment,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Practice => f.write_str("practice"),
            Self::Assessment => f.write_str("assessment"),
        }
    }
}

/// Session lifecycle state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SessionState {
    /// No session running.
    Idle,
    /// Devices acquiring, stream opening.
    Starting,
    /// Stream live, recording in progress.
    Live,
    /// Termination path running (stop recording, disconnect, synthesize).
    Ending,
    /// Synthesis finished, artifacts durable.
    Complete,
    /// Unrecoverable failure; `code` names the cause.
    Failed {
        /// Machine-readable error code.
        code: String,
    },
}

impl SessionState {
    /// Whether the session has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed { .. })
    }

    /// Whether the session is accepting live traffic.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

/// Why a session left the `Live` state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The user ended the session.
    UserRequested,
    /// The lifecycle timer expired.
    TimeExpired,
    /// A fatal error forced termination.
    Fatal,
}

/// The one current session owned by an engine instance.
///
/// `id` doubles as the fencing scope: artifacts, reports, and synthesis
/// re-entrancy are all keyed by it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// Hard session lifetime in seconds.
    pub duration_budget_secs: u64,
    /// Practice or assessment.
    pub mode: SessionMode,
}

impl Session {
    /// Create a new session in the `Starting` state.
    #[must_use]
    pub fn start(duration_budget_secs: u64, mode: SessionMode) -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Starting,
            started_at: Utc::now(),
            duration_budget_secs,
            mode,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionAttempt
// ─────────────────────────────────────────────────────────────────────────────

/// One (re)connection attempt. Immutable: superseded attempts are
/// discarded, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAttempt {
    /// Session this attempt belongs to.
    pub session_id: SessionId,
    /// Zero-based attempt index (0 = initial connect).
    pub attempt: u32,
    /// Backoff delay that preceded this attempt (0 for the initial).
    pub backoff_delay_ms: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// PersonaSpec
// ─────────────────────────────────────────────────────────────────────────────

/// Named remote-model configuration for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaSpec {
    /// Persona identifier.
    pub id: PersonaId,
    /// Human-readable name.
    pub display_name: String,
    /// System prompt selecting the model's behavior.
    pub system_prompt: String,
    /// Voice name for synthesized speech.
    pub voice: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
