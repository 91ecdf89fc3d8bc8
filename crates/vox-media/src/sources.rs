//! Platform media collaborator contracts.
//!
//! The engine never talks to real devices — the hosting platform
//! supplies [`MediaDevices`] for acquisition, and the acquired
//! [`VideoSource`]/[`AudioSource`] objects plus a [`RecordingSink`] for
//! output. Sampling is pull-based and non-blocking: the compositor asks
//! each source for its latest frame on its own clock, so media progress
//! is never coupled to stream backpressure.

use async_trait::async_trait;
use bytes::Bytes;

use vox_core::errors::MediaError;
use vox_core::session::SourceKind;

// ─────────────────────────────────────────────────────────────────────────────
// Frames and chunks
// ─────────────────────────────────────────────────────────────────────────────

/// One RGBA8 video frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Tightly packed RGBA8 pixel data, row-major, `width * height * 4`
    /// bytes.
    pub data: Bytes,
}

impl VideoFrame {
    /// A solid-color frame (test fixtures and placeholder fills).
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data: Bytes::from(data),
        }
    }

    /// The pixel at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let px = self.data.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Source traits
// ─────────────────────────────────────────────────────────────────────────────

/// A live video stream (camera or screen).
pub trait VideoSource: Send + Sync {
    /// Which device this is.
    fn kind(&self) -> SourceKind;

    /// Most recent frame, or `None` when the stream has no frame yet or
    /// has gone away (e.g. the user stopped sharing their screen).
    /// Non-blocking.
    fn latest_frame(&self) -> Option<VideoFrame>;
}

/// A live audio stream (microphone or synthesized playback).
pub trait AudioSource: Send + Sync {
    /// Stable label for attach/detach bookkeeping.
    fn label(&self) -> &str;

    /// Samples produced since the last drain (mono i16 PCM).
    /// Non-blocking; returns an empty vec when nothing is pending.
    fn drain(&self) -> Vec<i16>;
}

/// Continuous recording container writer.
///
/// The pipeline feeds it one composited video frame and one mixed audio
/// chunk per tick; `finish` seals the container exactly once.
pub trait RecordingSink: Send + Sync {
    /// Begin a new container.
    fn start(&self, mime_type: &str) -> Result<(), MediaError>;

    /// Append a composited frame.
    fn write_video(&self, frame: &VideoFrame) -> Result<(), MediaError>;

    /// Append mixed audio samples.
    fn write_audio(&self, samples: &[i16]) -> Result<(), MediaError>;

    /// Seal the container and return its bytes. Errors on a second call.
    fn finish(&self) -> Result<Bytes, MediaError>;
}

/// Device acquisition collaborator.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Acquire a video device. Denial surfaces as
    /// [`MediaError::Acquisition`] with the device kind.
    async fn acquire_video(
        &self,
        kind: SourceKind,
    ) -> Result<std::sync::Arc<dyn VideoSource>, MediaError>;

    /// Acquire the microphone.
    async fn acquire_audio(&self) -> Result<std::sync::Arc<dyn AudioSource>, MediaError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
