//! Media capture and compositing pipeline.
//!
//! Owns the whole local-media side of a session: device acquisition,
//! the fixed-rate draw loop, the shared audio graph, and the recording
//! sink. The composite canvas is exclusively this pipeline's — nothing
//! else reads or writes it — and the draw loop's cadence is independent
//! of stream activity in either direction.
//!
//! The draw loop carries an explicit stop flag (a `CancellationToken`)
//! in addition to the engine's fencing check, since it is not a
//! one-shot operation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use vox_core::artifacts::RecordingArtifact;
use vox_core::errors::MediaError;
use vox_core::fencing::{FencingToken, FencingUnit};
use vox_core::ids::SessionId;
use vox_core::session::SourceKind;

use crate::audio::AudioGraph;
use crate::compositor::{FrameCompositor, FrameSet};
use crate::layout::compute_layout;
use crate::sources::{AudioSource, MediaDevices, RecordingSink, VideoFrame, VideoSource};

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline knobs.
#[derive(Clone, Debug)]
pub struct MediaConfig {
    /// Composite canvas width in pixels.
    pub canvas_width: u32,
    /// Composite canvas height in pixels.
    pub canvas_height: u32,
    /// Draw loop tick rate.
    pub frame_rate_hz: u32,
    /// Picture-in-picture box size as a fraction of canvas width.
    pub pip_scale: f64,
    /// Picture-in-picture margin from the canvas edge.
    pub pip_margin_px: u32,
    /// Recording container MIME type.
    pub mime_type: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            frame_rate_hz: 30,
            pip_scale: 0.25,
            pip_margin_px: 16,
            mime_type: "video/webm".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MediaPipeline
// ─────────────────────────────────────────────────────────────────────────────

/// The session's capture/composite/record pipeline.
pub struct MediaPipeline {
    config: MediaConfig,
    session_id: SessionId,
    sink: Arc<dyn RecordingSink>,
    camera: Mutex<Option<Arc<dyn VideoSource>>>,
    screen: Mutex<Option<Arc<dyn VideoSource>>>,
    graph: AudioGraph,
    cancel: CancellationToken,
    composite_running: AtomicBool,
    recording_started: AtomicBool,
    recording: AtomicBool,
    sealed: Mutex<Option<RecordingArtifact>>,
    latest: Mutex<Option<VideoFrame>>,
    frames_rendered: AtomicU64,
    fence: Mutex<Option<(Arc<FencingUnit>, FencingToken)>>,
}

impl MediaPipeline {
    /// New pipeline for one session.
    #[must_use]
    pub fn new(session_id: SessionId, config: MediaConfig, sink: Arc<dyn RecordingSink>) -> Self {
        Self {
            config,
            session_id,
            sink,
            camera: Mutex::new(None),
            screen: Mutex::new(None),
            graph: AudioGraph::new(),
            cancel: CancellationToken::new(),
            composite_running: AtomicBool::new(false),
            recording_started: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            sealed: Mutex::new(None),
            latest: Mutex::new(None),
            frames_rendered: AtomicU64::new(0),
            fence: Mutex::new(None),
        }
    }

    /// Register the engine's fencing check. The draw loop stops itself
    /// once the token is superseded.
    pub fn set_fence(&self, unit: Arc<FencingUnit>, token: FencingToken) {
        *self.fence.lock() = Some((unit, token));
    }

    /// Acquire devices. Camera and microphone are mandatory — a denial
    /// aborts session start. Screen is optional: denial or absence is
    /// logged and the session proceeds without it.
    #[instrument(skip(self, devices), fields(session_id = %self.session_id))]
    pub async fn acquire(
        &self,
        devices: &dyn MediaDevices,
        want_screen: bool,
    ) -> Result<(), MediaError> {
        let camera = devices.acquire_video(SourceKind::Camera).await?;
        let microphone = devices.acquire_audio().await?;
        *self.camera.lock() = Some(camera);
        self.graph.attach(microphone);
        info!("camera and microphone acquired");

        if want_screen {
            match devices.acquire_video(SourceKind::Screen).await {
                Ok(screen) => {
                    *self.screen.lock() = Some(screen);
                    info!("screen capture acquired");
                }
                Err(e) => {
                    warn!(error = %e, "screen capture unavailable, proceeding without it");
                }
            }
        }
        Ok(())
    }

    /// Route synthesized playback into the shared audio graph so the
    /// recording reflects what the user heard.
    pub fn attach_playback(&self, source: Arc<dyn AudioSource>) {
        self.graph.attach(source);
    }

    /// Detach an audio input by label.
    pub fn detach_audio(&self, label: &str) {
        self.graph.detach(label);
    }

    /// Whether a screen source was acquired.
    #[must_use]
    pub fn has_screen(&self) -> bool {
        self.screen.lock().is_some()
    }

    /// Recording container MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.config.mime_type
    }

    /// Begin the fixed-rate draw loop. A second call is a no-op.
    pub fn start_composite(self: &Arc<Self>) {
        if self.composite_running.swap(true, Ordering::SeqCst) {
            warn!("composite loop already running");
            return;
        }
        let pipeline = Arc::clone(self);
        let period = Duration::from_nanos(1_000_000_000 / u64::from(self.config.frame_rate_hz));
        drop(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = pipeline.cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        if !pipeline.render_tick() {
                            break;
                        }
                    }
                }
            }
            debug!("composite loop stopped");
        }));
    }

    /// Render one frame and, when recording, feed the sink.
    /// Returns `false` when the loop should stop.
    fn render_tick(&self) -> bool {
        if let Some((unit, token)) = self.fence.lock().clone()
            && !unit.admit(token, "compositor")
        {
            return false;
        }

        let frames = FrameSet {
            camera: self.camera.lock().as_ref().and_then(|s| s.latest_frame()),
            screen: self.screen.lock().as_ref().and_then(|s| s.latest_frame()),
        };
        let layout = compute_layout(
            self.config.canvas_width,
            self.config.canvas_height,
            frames.camera.is_some(),
            frames.screen.is_some(),
            self.config.pip_scale,
            self.config.pip_margin_px,
        );
        let frame = FrameCompositor::render(&layout, &frames);

        if self.recording.load(Ordering::SeqCst) {
            if let Err(e) = self.sink.write_video(&frame) {
                warn!(error = %e, "recording sink rejected video frame");
            }
            let mixed = self.graph.mix_next();
            if !mixed.is_empty()
                && let Err(e) = self.sink.write_audio(&mixed)
            {
                warn!(error = %e, "recording sink rejected audio");
            }
        }

        *self.latest.lock() = Some(frame);
        let _ = self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        counter!("vox_media_frames_total").increment(1);
        true
    }

    /// Begin recording: opens the container and routes every subsequent
    /// composited frame plus the mixed audio into it. A second call is a
    /// no-op.
    pub fn start_recording(&self) -> Result<(), MediaError> {
        if self.recording_started.swap(true, Ordering::SeqCst) {
            warn!("recording already started");
            return Ok(());
        }
        self.sink.start(&self.config.mime_type)?;
        self.recording.store(true, Ordering::SeqCst);
        info!(mime_type = %self.config.mime_type, "recording started");
        Ok(())
    }

    /// Halt the draw loop and seal the recording. Idempotent: the first
    /// call seals, every call returns the same sealed artifact (or
    /// `None` when recording never started).
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub fn stop(&self) -> Option<RecordingArtifact> {
        self.cancel.cancel();
        self.composite_running.store(false, Ordering::SeqCst);

        let mut sealed = self.sealed.lock();
        if sealed.is_none() && self.recording.swap(false, Ordering::SeqCst) {
            match self.sink.finish() {
                Ok(data) => {
                    info!(bytes = data.len(), "recording sealed");
                    *sealed = Some(RecordingArtifact {
                        session_id: self.session_id.clone(),
                        data,
                        mime_type: self.config.mime_type.clone(),
                    });
                }
                Err(e) => warn!(error = %e, "recording sink failed to finish"),
            }
        }
        sealed.clone()
    }

    /// Most recently composited frame.
    #[must_use]
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().clone()
    }

    /// Total frames rendered by the draw loop.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
