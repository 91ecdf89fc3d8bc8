//! In-memory device and sink fakes for tests.
//!
//! [`FakeDevices`] hands out [`FakeVideoSource`]/[`FakeAudioSource`]
//! instances and can be told to deny specific devices. [`MemorySink`]
//! accumulates a recording into bytes and counts its writes. Used by
//! this crate's tests and by downstream engine tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use vox_core::errors::MediaError;
use vox_core::session::SourceKind;

use crate::sources::{AudioSource, MediaDevices, RecordingSink, VideoFrame, VideoSource};

// ─────────────────────────────────────────────────────────────────────────────
// FakeVideoSource
// ─────────────────────────────────────────────────────────────────────────────

/// Video source whose current frame tests set directly.
pub struct FakeVideoSource {
    kind: SourceKind,
    frame: Mutex<Option<VideoFrame>>,
}

impl FakeVideoSource {
    /// New source with no frame yet.
    #[must_use]
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            frame: Mutex::new(None),
        }
    }

    /// Set a solid-color current frame.
    pub fn set_solid(&self, width: u32, height: u32, rgba: [u8; 4]) {
        *self.frame.lock() = Some(VideoFrame::solid(width, height, rgba));
    }

    /// Set an arbitrary current frame.
    pub fn set_frame(&self, frame: VideoFrame) {
        *self.frame.lock() = Some(frame);
    }

    /// Drop the current frame (simulates the stream going away).
    pub fn clear(&self) {
        *self.frame.lock() = None;
    }
}

impl VideoSource for FakeVideoSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.frame.lock().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FakeAudioSource
// ─────────────────────────────────────────────────────────────────────────────

/// Audio source that replays pushed sample chunks, one per drain.
pub struct FakeAudioSource {
    label: String,
    queue: Mutex<VecDeque<Vec<i16>>>,
}

impl FakeAudioSource {
    /// New source with an empty queue.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a chunk for the next drain.
    pub fn push(&self, samples: Vec<i16>) {
        self.queue.lock().push_back(samples);
    }
}

impl AudioSource for FakeAudioSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn drain(&self) -> Vec<i16> {
        self.queue.lock().pop_front().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FakeDevices
// ─────────────────────────────────────────────────────────────────────────────

/// Device collaborator with per-device denial control.
pub struct FakeDevices {
    denied: Mutex<HashSet<SourceKind>>,
    camera: Arc<FakeVideoSource>,
    screen: Arc<FakeVideoSource>,
    microphone: Arc<FakeAudioSource>,
}

impl FakeDevices {
    /// New devices, everything grantable.
    #[must_use]
    pub fn new() -> Self {
        Self {
            denied: Mutex::new(HashSet::new()),
            camera: Arc::new(FakeVideoSource::new(SourceKind::Camera)),
            screen: Arc::new(FakeVideoSource::new(SourceKind::Screen)),
            microphone: Arc::new(FakeAudioSource::new("microphone")),
        }
    }

    /// Deny future acquisitions of a device.
    pub fn deny(&self, kind: SourceKind) {
        let _ = self.denied.lock().insert(kind);
    }

    /// The camera source (drive frames through it).
    #[must_use]
    pub fn camera(&self) -> Arc<FakeVideoSource> {
        Arc::clone(&self.camera)
    }

    /// The screen source.
    #[must_use]
    pub fn screen(&self) -> Arc<FakeVideoSource> {
        Arc::clone(&self.screen)
    }

    /// The microphone source.
    #[must_use]
    pub fn microphone(&self) -> Arc<FakeAudioSource> {
        Arc::clone(&self.microphone)
    }

    fn check(&self, kind: SourceKind) -> Result<(), MediaError> {
        if self.denied.lock().contains(&kind) {
            return Err(MediaError::Acquisition {
                kind,
                message: "permission denied".into(),
            });
        }
        Ok(())
    }
}

impl Default for FakeDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire_video(&self, kind: SourceKind) -> Result<Arc<dyn VideoSource>, MediaError> {
        self.check(kind)?;
        match kind {
            SourceKind::Camera => Ok(Arc::clone(&self.camera) as Arc<dyn VideoSource>),
            SourceKind::Screen => Ok(Arc::clone(&self.screen) as Arc<dyn VideoSource>),
            SourceKind::Microphone => Err(MediaError::Acquisition {
                kind,
                message: "not a video device".into(),
            }),
        }
    }

    async fn acquire_audio(&self) -> Result<Arc<dyn AudioSource>, MediaError> {
        self.check(SourceKind::Microphone)?;
        Ok(Arc::clone(&self.microphone) as Arc<dyn AudioSource>)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySink
// ─────────────────────────────────────────────────────────────────────────────

/// Recording sink that accumulates everything into one byte buffer.
pub struct MemorySink {
    starts: AtomicU32,
    finishes: AtomicU32,
    finished: AtomicBool,
    video_writes: AtomicU64,
    audio_writes: AtomicU64,
    video_data: Mutex<BytesMut>,
    audio_data: Mutex<BytesMut>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            starts: AtomicU32::new(0),
            finishes: AtomicU32::new(0),
            finished: AtomicBool::new(false),
            video_writes: AtomicU64::new(0),
            audio_writes: AtomicU64::new(0),
            video_data: Mutex::new(BytesMut::new()),
            audio_data: Mutex::new(BytesMut::new()),
        }
    }

    /// How many times `start` was called.
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    /// How many times `finish` was called successfully.
    #[must_use]
    pub fn finish_count(&self) -> u32 {
        self.finishes.load(Ordering::SeqCst)
    }

    /// Video frames written.
    #[must_use]
    pub fn video_writes(&self) -> u64 {
        self.video_writes.load(Ordering::SeqCst)
    }

    /// Audio chunks written.
    #[must_use]
    pub fn audio_writes(&self) -> u64 {
        self.audio_writes.load(Ordering::SeqCst)
    }

    /// Raw audio bytes written so far (little-endian i16).
    #[must_use]
    pub fn audio_bytes(&self) -> Vec<u8> {
        self.audio_data.lock().to_vec()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink for MemorySink {
    fn start(&self, _mime_type: &str) -> Result<(), MediaError> {
        let _ = self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_video(&self, frame: &VideoFrame) -> Result<(), MediaError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(MediaError::Sink {
                message: "write after finish".into(),
            });
        }
        self.video_data.lock().extend_from_slice(&frame.data);
        let _ = self.video_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_audio(&self, samples: &[i16]) -> Result<(), MediaError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(MediaError::Sink {
                message: "write after finish".into(),
            });
        }
        let mut data = self.audio_data.lock();
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        let _ = self.audio_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&self) -> Result<Bytes, MediaError> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(MediaError::Sink {
                message: "already finished".into(),
            });
        }
        let _ = self.finishes.fetch_add(1, Ordering::SeqCst);
        let mut out = BytesMut::new();
        out.extend_from_slice(&self.video_data.lock()[..]);
        out.extend_from_slice(&self.audio_data.lock()[..]);
        Ok(out.freeze())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn denied_device_errors() {
        let devices = FakeDevices::new();
        devices.deny(SourceKind::Screen);
        let err = devices.acquire_video(SourceKind::Screen).await.err().unwrap();
        assert!(matches!(
            err,
            MediaError::Acquisition { kind: SourceKind::Screen, .. }
        ));
        assert!(devices.acquire_video(SourceKind::Camera).await.is_ok());
    }

    #[test]
    fn fake_audio_replays_chunks_in_order() {
        let src = FakeAudioSource::new("mic");
        src.push(vec![1, 2]);
        src.push(vec![3]);
        assert_eq!(src.drain(), vec![1, 2]);
        assert_eq!(src.drain(), vec![3]);
        assert!(src.drain().is_empty());
    }

    #[test]
    fn memory_sink_double_finish_errors() {
        let sink = MemorySink::new();
        sink.start("video/webm").unwrap();
        sink.write_audio(&[1, 2]).unwrap();
        let data = sink.finish().unwrap();
        assert_eq!(data.len(), 4);
        assert!(sink.finish().is_err());
        assert_eq!(sink.finish_count(), 1);
    }

    #[test]
    fn memory_sink_rejects_writes_after_finish() {
        let sink = MemorySink::new();
        let _ = sink.finish().unwrap();
        let frame = VideoFrame::solid(1, 1, [0, 0, 0, 255]);
        assert!(sink.write_video(&frame).is_err());
        assert!(sink.write_audio(&[1]).is_err());
    }
}
