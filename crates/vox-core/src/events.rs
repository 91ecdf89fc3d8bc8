//! Host-facing session events.
//!
//! [`EngineEvent`] is the single event family the engine broadcasts to
//! its host: session lifecycle, connection state, transcript updates,
//! tool execution, recording, and synthesis progress. Events carry a
//! flattened [`BaseEvent`] (session id + timestamp) and serialize with a
//! `type` tag so hosts can discriminate without knowing the enum.
//!
//! Events are transient — they drive the host UI and are never
//! persisted by the engine.

use serde::{Deserialize, Serialize};

use crate::artifacts::Verdict;
use crate::session::{EndReason, SessionMode};
use crate::transcript::Role;

/// Common fields for all engine events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// engine_events! macro — generates EngineEvent, base(), event_type()
// ─────────────────────────────────────────────────────────────────────────────

/// Declarative macro that generates [`EngineEvent`], its `base()` and
/// `event_type()` accessors, and a compile-time `VARIANT_COUNT`.
///
/// Adding a new variant requires ONE edit (inside this invocation).
/// The compiler enforces exhaustive matching everywhere else.
macro_rules! engine_events {
    ($(
        $(#[doc = $doc:literal])*
        $variant:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty
            ),*
            $(,)?
        } => $rename:literal
    ),* $(,)?) => {
        /// Host-facing session event with session context.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        #[allow(missing_docs)]
        pub enum EngineEvent {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $rename)]
                $variant {
                    #[serde(flatten)]
                    base: BaseEvent,
                    $(
                        $(#[$fmeta])*
                        $field: $ty,
                    )*
                },
            )*
        }

        impl EngineEvent {
            /// Get the base event fields.
            #[must_use]
            pub fn base(&self) -> &BaseEvent {
                match self {
                    $(Self::$variant { base, .. } => base,)*
                }
            }

            /// Get the event type string (for type discrimination).
            #[must_use]
            pub fn event_type(&self) -> &str {
                match self {
                    $(Self::$variant { .. } => $rename,)*
                }
            }
        }

        /// Number of `EngineEvent` variants (compile-time constant for tests).
        #[cfg(test)]
        pub(crate) const VARIANT_COUNT: usize = [$($rename),*].len();
    };
}

engine_events! {
    // -- Session lifecycle --

    /// Devices acquired, stream opening.
    SessionStarted {
        mode: SessionMode,
        #[serde(rename = "durationBudgetSecs")]
        duration_budget_secs: u64,
    } => "session_started",

    /// Termination path entered (manual end or timer expiry).
    SessionEnding {
        reason: EndReason,
    } => "session_ending",

    /// Synthesis finished; artifacts durable.
    SessionComplete {} => "session_complete",

    /// Unrecoverable failure ended the session.
    SessionFailed {
        code: String,
        error: String,
        /// Whether a user action (re-authorize, restart) can recover.
        recoverable: bool,
    } => "session_failed",

    // -- Connection --

    /// Stream opened (attempt 0 is the initial connect).
    ConnectionOpened {
        attempt: u32,
    } => "connection_opened",

    /// Stream dropped; a reconnect will be scheduled unless fatal.
    ConnectionLost {
        reason: String,
    } => "connection_lost",

    /// Reconnect scheduled after backoff.
    ReconnectScheduled {
        attempt: u32,
        #[serde(rename = "delayMs")]
        delay_ms: u64,
    } => "reconnect_scheduled",

    // -- Transcript --

    /// Incremental transcript text.
    TranscriptDelta {
        role: Role,
        delta: String,
    } => "transcript_delta",

    // -- Tool calls --

    /// The remote model requested a local capability.
    ToolCallReceived {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        name: String,
    } => "tool_call_received",

    /// The bridge answered a tool call.
    ToolCallResolved {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        name: String,
        #[serde(rename = "isError")]
        is_error: bool,
    } => "tool_call_resolved",

    // -- Recording --

    /// Recording sink attached; bytes are accumulating.
    RecordingStarted {
        #[serde(rename = "mimeType")]
        mime_type: String,
    } => "recording_started",

    /// Recording sealed.
    RecordingSealed {
        bytes: u64,
    } => "recording_sealed",

    // -- Countdown --

    /// One-second countdown tick.
    CountdownTick {
        #[serde(rename = "remainingSecs")]
        remaining_secs: u64,
    } => "countdown_tick",

    // -- Synthesis --

    /// Simulated synthesis progress (approaches 1.0, reaches it only on
    /// completion).
    SynthesisProgress {
        progress: f64,
    } => "synthesis_progress",

    /// Report persisted and available.
    ReportReady {
        score: f64,
        verdict: Verdict,
    } => "report_ready",
}

impl EngineEvent {
    /// Get the session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.base().session_id
    }

    /// Whether this event ends the session (success or failure).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SessionComplete { .. } | Self::SessionFailed { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Create a session-started event.
#[must_use]
pub fn session_started_event(
    session_id: impl Into<String>,
    mode: SessionMode,
    duration_budget_secs: u64,
) -> EngineEvent {
    EngineEvent::SessionStarted {
        base: BaseEvent::now(session_id),
        mode,
        duration_budget_secs,
    }
}

/// Create a session-complete event.
#[must_use]
pub fn session_complete_event(session_id: impl Into<String>) -> EngineEvent {
    EngineEvent::SessionComplete {
        base: BaseEvent::now(session_id),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
