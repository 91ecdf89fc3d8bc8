//! Error hierarchy for the vox session engine.
//!
//! Provides a structured error type system built on [`thiserror`]:
//!
//! - [`VoxError`]: Top-level enum covering all error domains
//! - [`StreamError`]: Reasoning-stream failures (connection, auth, exhaustion)
//! - [`MediaError`]: Device acquisition and recording-sink failures
//! - [`ToolError`]: Tool-call bridge failures
//! - [`SynthesisError`]: Post-session scoring/storage failures
//!
//! Every error classifies into an [`ErrorCategory`] and [`ErrorSeverity`]
//! that drive retry decisions and host-facing reporting. Auth errors are
//! a distinct kind at the transport boundary — classification never
//! depends on matching message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::session::SourceKind;

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse error domain used for logging and retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transport-level connection failures.
    Network,
    /// Credential rejected by the remote service.
    Auth,
    /// Local media device or recording failures.
    Media,
    /// Tool-call bridge failures.
    Tool,
    /// Post-session synthesis failures.
    Synthesis,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Media => "media",
            Self::Tool => "tool",
            Self::Synthesis => "synthesis",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// How severely an error affects the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Recoverable without user action (e.g. an automatic reconnect).
    Transient,
    /// The operation failed but the session survives.
    Error,
    /// The session cannot continue.
    Fatal,
}

// ─────────────────────────────────────────────────────────────────────────────
// StreamError
// ─────────────────────────────────────────────────────────────────────────────

/// Reasoning-stream failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The transport could not be established or dropped mid-stream.
    /// Retried with capped exponential backoff.
    #[error("connection failed: {message}")]
    Connection {
        /// Transport-reported detail.
        message: String,
    },

    /// The remote service rejected the credential. Never retried —
    /// surfaced immediately so the caller can re-authorize.
    #[error("authorization rejected: {message}")]
    Auth {
        /// Remote-reported detail.
        message: String,
    },

    /// The reconnect attempt cap was exceeded.
    #[error("connection attempts exhausted after {attempts} tries")]
    Exhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl StreamError {
    /// Error category for classification.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Exhausted { .. } => ErrorCategory::Network,
            Self::Auth { .. } => ErrorCategory::Auth,
        }
    }

    /// Error severity level.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection { .. } => ErrorSeverity::Transient,
            Self::Auth { .. } | Self::Exhausted { .. } => ErrorSeverity::Fatal,
        }
    }

    /// Whether the connection manager may retry this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MediaError
// ─────────────────────────────────────────────────────────────────────────────

/// Media capture or recording failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    /// A device could not be acquired (denied or unavailable).
    ///
    /// Fatal for mandatory sources (camera, microphone); optional
    /// sources (screen) are logged and skipped.
    #[error("failed to acquire {kind}: {message}")]
    Acquisition {
        /// Which device failed.
        kind: SourceKind,
        /// Platform-reported detail.
        message: String,
    },

    /// The recording sink rejected a write.
    #[error("recording sink failure: {message}")]
    Sink {
        /// Sink-reported detail.
        message: String,
    },
}

impl MediaError {
    /// Whether this failure aborts session start.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Acquisition { kind, .. } => kind.is_mandatory(),
            Self::Sink { .. } => false,
        }
    }

    /// Error severity level.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        if self.is_fatal() {
            ErrorSeverity::Fatal
        } else {
            ErrorSeverity::Error
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ToolError
// ─────────────────────────────────────────────────────────────────────────────

/// Tool-call bridge failure.
///
/// Never fatal — the bridge answers the remote model with an error
/// payload and the session continues.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The model requested a capability with no registered resolver.
    #[error("unknown tool '{name}' (call {tool_call_id})")]
    UnknownTool {
        /// Requested tool name.
        name: String,
        /// Call id the error response is paired with.
        tool_call_id: String,
    },

    /// A registered resolver failed.
    #[error("tool '{name}' resolver failed: {message}")]
    Resolver {
        /// Tool name.
        name: String,
        /// Resolver-reported detail.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// SynthesisError
// ─────────────────────────────────────────────────────────────────────────────

/// Post-termination synthesis failure.
///
/// Always retryable at the caller's discretion — the session and its
/// recording remain durable artifacts regardless.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    /// The scoring collaborator failed to produce a report.
    #[error("scoring failed: {message}")]
    Scoring {
        /// Collaborator-reported detail.
        message: String,
    },

    /// The storage collaborator rejected a write.
    #[error("storage {operation} failed: {message}")]
    Storage {
        /// Which storage call failed (`save_artifact`, `save_report`).
        operation: String,
        /// Collaborator-reported detail.
        message: String,
    },

    /// A synthesis run for this session is already in flight.
    #[error("synthesis already running for session {session_id}")]
    AlreadyRunning {
        /// Session whose run is in flight.
        session_id: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// VoxError — top-level error enum
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the vox session engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VoxError {
    /// Reasoning-stream error.
    #[error("{0}")]
    Stream(#[from] StreamError),

    /// Media capture / recording error.
    #[error("{0}")]
    Media(#[from] MediaError),

    /// Tool-call bridge error.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// Synthesis pipeline error.
    #[error("{0}")]
    Synthesis(#[from] SynthesisError),

    /// Generic internal error.
    #[error("[{code}] {message}")]
    Internal {
        /// Machine-readable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

impl VoxError {
    /// Create an internal error with a code and message.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error category for classification.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Stream(e) => e.category(),
            Self::Media(_) => ErrorCategory::Media,
            Self::Tool(_) => ErrorCategory::Tool,
            Self::Synthesis(_) => ErrorCategory::Synthesis,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Error severity level.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Stream(e) => e.severity(),
            Self::Media(e) => e.severity(),
            Self::Tool(_) => ErrorSeverity::Error,
            Self::Synthesis(_) => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Error,
        }
    }

    /// Whether a retry could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Stream(e) => e.is_retryable(),
            Self::Synthesis(_) => true,
            Self::Media(_) | Self::Tool(_) | Self::Internal { .. } => false,
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Stream(StreamError::Connection { .. }) => "STREAM_CONNECTION",
            Self::Stream(StreamError::Auth { .. }) => "STREAM_AUTH",
            Self::Stream(StreamError::Exhausted { .. }) => "STREAM_EXHAUSTED",
            Self::Media(MediaError::Acquisition { .. }) => "MEDIA_ACQUISITION",
            Self::Media(MediaError::Sink { .. }) => "MEDIA_SINK",
            Self::Tool(ToolError::UnknownTool { .. }) => "TOOL_UNKNOWN",
            Self::Tool(ToolError::Resolver { .. }) => "TOOL_RESOLVER",
            Self::Synthesis(SynthesisError::Scoring { .. }) => "SYNTHESIS_SCORING",
            Self::Synthesis(SynthesisError::Storage { .. }) => "SYNTHESIS_STORAGE",
            Self::Synthesis(SynthesisError::AlreadyRunning { .. }) => "SYNTHESIS_IN_FLIGHT",
            Self::Internal { code, .. } => code,
        }
    }
}

/// Convenience result alias for engine operations.
pub type Result<T> = std::result::Result<T, VoxError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
