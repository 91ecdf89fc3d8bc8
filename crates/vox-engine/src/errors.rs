//! Engine-level errors.

use thiserror::Error;

use vox_core::errors::{MediaError, StreamError, SynthesisError};

/// Session engine operation failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `start` while a session is already active. At most one session
    /// exists per engine instance.
    #[error("a session is already active")]
    AlreadyActive,

    /// `retry_synthesis` before any session finished.
    #[error("no finished session to synthesize")]
    NoFinishedSession,

    /// Media acquisition or recording failure during start.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Stream connect failure during start.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Synthesis failure during an explicit retry.
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Convenience result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
