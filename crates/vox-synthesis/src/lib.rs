//! # vox-synthesis
//!
//! Post-session synthesis for vox: persist the finished session's
//! artifacts and turn its transcript + code snapshot into a structured
//! evaluation report.
//!
//! - **[`store`]**: [`ArtifactStore`] collaborator contract with a
//!   filesystem reference implementation and an in-memory test store
//! - **[`scoring`]**: [`ScoringService`] collaborator contract
//! - **[`pipeline`]**: [`SynthesisPipeline`] — strictly ordered steps,
//!   re-entrancy guarded per session, simulated progress signal,
//!   retryable scoring failures
//!
//! ## Crate Position
//!
//! Depends on `vox-core`. Consumed by `vox-engine` on the termination
//! path.

#![deny(unsafe_code)]

pub mod pipeline;
pub mod scoring;
pub mod store;

pub use pipeline::{SynthesisConfig, SynthesisPipeline};
pub use scoring::{FakeScoring, ScoringService};
pub use store::{ArtifactStore, FsArtifactStore, MemoryStore};
