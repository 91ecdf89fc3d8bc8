//! Reasoning-transport collaborator contract.
//!
//! The engine never speaks the remote AI wire protocol itself — the
//! hosting application supplies a [`ReasoningTransport`] and the
//! connection manager drives it. The contract requires a structured
//! [`TransportErrorKind`] so auth rejections are distinguishable from
//! transient connection failures without inspecting message text.

use async_trait::async_trait;
use tokio::sync::mpsc;

use vox_core::errors::StreamError;
use vox_core::session::{PersonaSpec, SessionMode};
use vox_core::tools::{ToolCall, ToolDeclaration, ToolResponse};
use vox_core::transcript::TranscriptTurn;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of failure the transport reports.
///
/// The distinction drives retry policy: `Connection` is retried with
/// backoff, `Auth` never is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Credential invalid or expired.
    Auth,
    /// Transport could not be established or dropped.
    Connection,
}

/// Structured transport failure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} transport error: {message}")]
pub struct TransportError {
    /// Failure classification.
    pub kind: TransportErrorKind,
    /// Transport-reported detail.
    pub message: String,
}

impl TransportError {
    /// An auth failure.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Auth,
            message: message.into(),
        }
    }

    /// A connection failure.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::Connection,
            message: message.into(),
        }
    }
}

impl From<TransportError> for StreamError {
    fn from(e: TransportError) -> Self {
        match e.kind {
            TransportErrorKind::Auth => Self::Auth { message: e.message },
            TransportErrorKind::Connection => Self::Connection { message: e.message },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound event from a live transport session.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Incremental transcript text. `is_user` distinguishes the local
    /// speaker's recognized speech from the remote model's output.
    Transcript {
        /// Text fragment.
        text: String,
        /// Whether the local user authored it.
        is_user: bool,
    },
    /// The remote model requested local capabilities.
    ToolCalls(Vec<ToolCall>),
    /// The stream closed (not user-initiated).
    Closed {
        /// Transport-reported reason, when available.
        reason: Option<String>,
    },
    /// The stream errored.
    Error(TransportError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Connect request
// ─────────────────────────────────────────────────────────────────────────────

/// Condensed continuity context replayed after a reconnect so the remote
/// model resumes without the full history.
#[derive(Clone, Debug, PartialEq)]
pub struct ResumptionContext {
    /// Session mode at the time of the drop.
    pub mode: SessionMode,
    /// Recent transcript tail, oldest first.
    pub turns: Vec<TranscriptTurn>,
}

impl ResumptionContext {
    /// Render the context as a continuity preamble.
    #[must_use]
    pub fn render(&self) -> String {
        use std::fmt::Write as _;
        let mut out = format!(
            "The connection was briefly interrupted during a {} session. \
             Recent conversation, oldest first:\n",
            self.mode
        );
        for turn in &self.turns {
            let who = match turn.role {
                vox_core::transcript::Role::User => "user",
                vox_core::transcript::Role::Agent => "you",
            };
            let _ = writeln!(out, "[{who}] {}", turn.text);
        }
        out.push_str("Continue the conversation from where it left off.");
        out
    }
}

/// Everything a transport needs to open a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectRequest {
    /// Remote model configuration.
    pub persona: PersonaSpec,
    /// System prompt for the session.
    pub system_prompt: String,
    /// Capabilities advertised to the model.
    pub tool_declarations: Vec<ToolDeclaration>,
    /// Present on reconnects only.
    pub resumption: Option<ResumptionContext>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound half of a live stream.
#[async_trait]
pub trait TransportSink: Send + Sync {
    /// Inject a user-authored message into the live stream.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Return results for previously received tool calls.
    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<(), TransportError>;

    /// Tear down the stream. Idempotent.
    async fn close(&self);
}

/// A live duplex stream: outbound sink plus inbound event receiver.
pub struct TransportSession {
    /// Outbound operations.
    pub sink: Box<dyn TransportSink>,
    /// Inbound events, FIFO. The channel ending is treated as a close.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession").finish_non_exhaustive()
    }
}

/// Opens duplex streams to the remote reasoning service.
///
/// Supplied by the hosting application; the engine owns reconnection,
/// fencing, and backoff on top of it.
#[async_trait]
pub trait ReasoningTransport: Send + Sync {
    /// Open a stream. Errors carry a structured kind — implementations
    /// must classify auth rejections as [`TransportErrorKind::Auth`].
    async fn open(&self, request: ConnectRequest) -> Result<TransportSession, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
