//! # vox-engine
//!
//! The resilient real-time session engine: coordinates the reasoning
//! stream, local media pipeline, transcript, tool-call bridge, and
//! lifecycle timer around one session at a time, then hands the result
//! to the synthesis pipeline.
//!
//! - **[`engine`]**: [`SessionEngine`] / [`EngineHandle`] — start,
//!   dispatch loop, single termination path
//! - **[`bridge`]**: [`ToolCallBridge`] resolving model-issued tool
//!   calls against engine-held state
//! - **[`timer`]**: [`LifecycleTimer`] — 1 Hz countdown, exactly-once
//!   expiry
//! - **[`emitter`]**: broadcast [`EventEmitter`] for
//!   [`vox_core::events::EngineEvent`]
//!
//! ## Concurrency model
//!
//! Single-threaded in effect: one dispatch task per session serializes
//! every state mutation; subcomponents communicate over channels and
//! carry the fencing token issued at session start. Effects from
//! superseded attempts are dropped at the dispatch boundary.

#![deny(unsafe_code)]

pub mod bridge;
pub mod emitter;
pub mod engine;
pub mod errors;
pub mod timer;

pub use bridge::{DocumentAccessor, GET_CURRENT_CODE, ToolCallBridge, ToolResolver};
pub use emitter::EventEmitter;
pub use engine::{Collaborators, EngineConfig, EngineHandle, SessionEngine};
pub use errors::EngineError;
pub use timer::{LifecycleTimer, TimerSignal};
