//! # vox-core
//!
//! Foundation types, errors, branded IDs, and utilities for the vox
//! session engine.
//!
//! This crate provides the shared vocabulary that all other vox crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::SessionId`], [`ids::ToolCallId`] as newtypes
//! - **Fencing**: [`fencing::FencingUnit`] monotonic token issuer that
//!   invalidates effects from superseded asynchronous operations
//! - **Transcript**: [`transcript::TranscriptLog`] folding role-tagged
//!   deltas into ordered turns
//! - **Session**: [`session::Session`] lifecycle state and mode
//! - **Artifacts**: [`artifacts::RecordingArtifact`] and
//!   [`artifacts::ReportArtifact`]
//! - **Errors**: [`errors::VoxError`] hierarchy via `thiserror`
//! - **Events**: [`events::EngineEvent`] for host-facing session events
//! - **Backoff**: [`retry`] reconnect delay calculation
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other vox crates.

#![deny(unsafe_code)]

pub mod artifacts;
pub mod errors;
pub mod events;
pub mod fencing;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod session;
pub mod tools;
pub mod transcript;
