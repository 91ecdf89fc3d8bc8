//! # vox-stream
//!
//! Connection management for the duplex stream to the remote reasoning
//! service.
//!
//! - **[`transport`]**: the collaborator contract the hosting
//!   application implements ([`ReasoningTransport`]), with structured
//!   error kinds so auth rejections are never inferred from message text
//! - **[`manager`]**: [`ConnectionManager`] supervising one stream per
//!   session — capped exponential backoff, resumption context replay,
//!   fencing-tagged updates, disconnect-always-wins semantics
//! - **[`testutil`]**: scriptable [`MockTransport`] for engine tests
//!
//! ## Crate Position
//!
//! Depends on `vox-core`. Consumed by `vox-engine`, which feeds the
//! manager's updates into its single dispatch loop.

#![deny(unsafe_code)]

pub mod manager;
pub mod testutil;
pub mod transport;

pub use manager::{
    ConnState, ConnectSpec, ConnectionManager, ReconnectPolicy, StreamHandle, StreamUpdate,
    StreamUpdateKind,
};
pub use testutil::MockTransport;
pub use transport::{
    ConnectRequest, ReasoningTransport, ResumptionContext, TransportError, TransportErrorKind,
    TransportEvent, TransportSession, TransportSink,
};
