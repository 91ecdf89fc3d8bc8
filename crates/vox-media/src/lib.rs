//! # vox-media
//!
//! Media capture, compositing, audio mixing, and recording for vox
//! sessions.
//!
//! - **[`sources`]**: platform collaborator contracts — [`MediaDevices`],
//!   [`VideoSource`], [`AudioSource`], [`RecordingSink`]
//! - **[`layout`]**: per-tick composite layout (primary + bordered
//!   picture-in-picture, portrait/landscape from canvas aspect)
//! - **[`compositor`]**: software canvas renderer
//! - **[`audio`]**: shared [`AudioGraph`] mixing everything heard and
//!   said into one destination
//! - **[`pipeline`]**: [`MediaPipeline`] — acquisition, fixed-rate draw
//!   loop, recording, idempotent stop/seal
//! - **[`testutil`]**: in-memory fakes for engine tests
//!
//! Compositing happens engine-side into one track so the resulting
//! artifact is a single, self-contained, seekable recording rather than
//! N unsynchronized streams — playback must show exactly what the
//! remote model saw.

#![deny(unsafe_code)]

pub mod audio;
pub mod compositor;
pub mod layout;
pub mod pipeline;
pub mod sources;
pub mod testutil;

pub use audio::{AudioGraph, mix_samples};
pub use compositor::{FrameCompositor, FrameSet};
pub use layout::{CompositeLayout, Orientation, Rect, compute_layout};
pub use pipeline::{MediaConfig, MediaPipeline};
pub use sources::{AudioSource, MediaDevices, RecordingSink, VideoFrame, VideoSource};
