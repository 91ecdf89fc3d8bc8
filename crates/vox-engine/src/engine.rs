//! Session engine: lifecycle orchestration and the single dispatch loop.
//!
//! `start` wires everything for one session — media acquisition, stream
//! connect (registering a fresh fencing token), recording, the
//! lifecycle timer — then runs one dispatch task that serializes every
//! externally-triggered event: stream updates (fenced), timer signals,
//! and host commands. No engine state is mutated outside that task, so
//! mutual exclusion is structural.
//!
//! Termination is one path regardless of trigger (user action, timer
//! expiry, fatal stream failure): cancel the timer, seal the recording,
//! disconnect the stream, then hand the transcript and the last
//! document snapshot to the synthesis pipeline. A synthesis failure
//! leaves the session complete with its report pending — the artifacts
//! are already durable.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{info, instrument, warn};

use vox_core::artifacts::{RecordingArtifact, ReportArtifact};
use vox_core::errors::{StreamError, VoxError};
use vox_core::events::{BaseEvent, EngineEvent};
use vox_core::fencing::FencingUnit;
use vox_core::ids::SessionId;
use vox_core::session::{EndReason, PersonaSpec, Session, SessionMode, SessionState};
use vox_core::transcript::TranscriptLog;
use vox_media::pipeline::{MediaConfig, MediaPipeline};
use vox_media::sources::{MediaDevices, RecordingSink};
use vox_settings::VoxSettings;
use vox_stream::manager::{
    ConnectSpec, ConnectionManager, ReconnectPolicy, StreamHandle, StreamUpdate, StreamUpdateKind,
};
use vox_stream::transport::ReasoningTransport;
use vox_synthesis::pipeline::{SynthesisConfig, SynthesisPipeline};
use vox_synthesis::scoring::ScoringService;
use vox_synthesis::store::ArtifactStore;

use crate::bridge::{DocumentAccessor, ToolCallBridge};
use crate::emitter::EventEmitter;
use crate::errors::EngineError;
use crate::timer::{LifecycleTimer, TimerSignal};

// ─────────────────────────────────────────────────────────────────────────────
// Config and collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one session needs, resolved up front.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Hard session lifetime in seconds.
    pub duration_budget_secs: u64,
    /// Practice or assessment.
    pub mode: SessionMode,
    /// Remote model configuration.
    pub persona: PersonaSpec,
    /// System prompt for the session.
    pub system_prompt: String,
    /// Whether to request screen capture (optional either way).
    pub want_screen: bool,
    /// Media pipeline knobs.
    pub media: MediaConfig,
    /// Reconnect backoff knobs.
    pub reconnect: ReconnectPolicy,
    /// Synthesis progress knobs.
    pub synthesis: SynthesisConfig,
}

impl EngineConfig {
    /// Assemble a config from loaded settings.
    #[must_use]
    pub fn from_settings(
        settings: &VoxSettings,
        persona: PersonaSpec,
        system_prompt: impl Into<String>,
        mode: SessionMode,
        want_screen: bool,
    ) -> Self {
        Self {
            duration_budget_secs: settings.session.duration_budget_secs,
            mode,
            persona,
            system_prompt: system_prompt.into(),
            want_screen,
            media: MediaConfig {
                canvas_width: settings.media.canvas_width,
                canvas_height: settings.media.canvas_height,
                frame_rate_hz: settings.media.frame_rate_hz,
                pip_scale: settings.media.pip_scale,
                pip_margin_px: settings.media.pip_margin_px,
                mime_type: settings.media.mime_type.clone(),
            },
            reconnect: ReconnectPolicy {
                base_delay_ms: settings.connection.base_delay_ms,
                max_delay_ms: settings.connection.max_delay_ms,
                max_attempts: settings.connection.max_attempts,
                resumption_tail_turns: settings.session.resumption_tail_turns,
            },
            synthesis: SynthesisConfig {
                progress_interval_ms: settings.synthesis.progress_interval_ms,
                progress_step: settings.synthesis.progress_step,
            },
        }
    }
}

/// External collaborators the engine depends on but does not implement.
pub struct Collaborators {
    /// Duplex stream to the remote reasoning service.
    pub transport: Arc<dyn ReasoningTransport>,
    /// Platform device acquisition.
    pub devices: Arc<dyn MediaDevices>,
    /// Recording container writer.
    pub sink: Arc<dyn RecordingSink>,
    /// Durable artifact storage.
    pub store: Arc<dyn ArtifactStore>,
    /// Evaluation report producer.
    pub scoring: Arc<dyn ScoringService>,
    /// Live view of the most recently edited document.
    pub document: Arc<dyn DocumentAccessor>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Host command into the dispatch loop.
enum EngineCommand {
    SendText(String),
    EndSession,
}

/// Everything needed to (re)run synthesis after termination.
#[derive(Clone)]
struct FinishedSession {
    session: Session,
    transcript: TranscriptLog,
    snapshot: String,
    recording: RecordingArtifact,
}

/// Creates and supervises sessions. At most one session is active per
/// engine instance; its fencing unit outlives sessions so a new start
/// supersedes every async chain of the previous one.
pub struct SessionEngine {
    fencing: Arc<FencingUnit>,
    active: Arc<Mutex<Option<SessionId>>>,
}

impl SessionEngine {
    /// New engine with no active session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fencing: Arc::new(FencingUnit::new()),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a session is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Start a session: acquire devices, open the stream, start
    /// recording and the lifecycle timer, and spawn the dispatch loop.
    ///
    /// Camera/microphone denial and stream connect failures abort the
    /// start; an auth rejection is surfaced without retry so the caller
    /// can re-authorize and call `start` again.
    #[instrument(skip_all, fields(mode = %config.mode))]
    pub async fn start(
        &self,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<EngineHandle, EngineError> {
        let session = Session::start(config.duration_budget_secs, config.mode);
        {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(EngineError::AlreadyActive);
            }
            *active = Some(session.id.clone());
        }
        // Everything from any previous session is superseded from here.
        let token = self.fencing.issue();

        let result = self
            .start_inner(session.clone(), token, config, collaborators)
            .await;
        if result.is_err() {
            *self.active.lock() = None;
        }
        result
    }

    async fn start_inner(
        &self,
        mut session: Session,
        token: vox_core::fencing::FencingToken,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<EngineHandle, EngineError> {
        let pipeline = Arc::new(MediaPipeline::new(
            session.id.clone(),
            config.media.clone(),
            collaborators.sink,
        ));
        pipeline.set_fence(Arc::clone(&self.fencing), token);
        pipeline
            .acquire(&*collaborators.devices, config.want_screen)
            .await?;

        let bridge = ToolCallBridge::with_document_accessor(Arc::clone(&collaborators.document));

        let (updates_tx, updates_rx) = mpsc::channel::<StreamUpdate>(256);
        let manager = ConnectionManager::new(collaborators.transport, config.reconnect.clone());
        let stream = manager
            .connect(
                ConnectSpec {
                    persona: config.persona.clone(),
                    system_prompt: config.system_prompt.clone(),
                    tool_declarations: bridge.declarations(),
                    mode: config.mode,
                },
                token,
                updates_tx,
            )
            .await
            .inspect_err(|_| {
                // Unwind the partially started media side.
                let _ = pipeline.stop();
            })?;

        pipeline.start_recording().inspect_err(|_| {
            stream.disconnect();
            let _ = pipeline.stop();
        })?;
        pipeline.start_composite();

        let (timer_tx, timer_rx) = mpsc::channel::<TimerSignal>(64);
        let timer = LifecycleTimer::start(config.duration_budget_secs, timer_tx);
        let remaining = timer.remaining_watch();

        let synthesis = Arc::new(SynthesisPipeline::new(
            collaborators.store,
            collaborators.scoring,
            config.synthesis.clone(),
        ));
        let progress = synthesis.progress();

        let emitter = Arc::new(EventEmitter::new());
        let transcript = Arc::new(Mutex::new(TranscriptLog::new()));
        let finished = Arc::new(Mutex::new(None));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel::<EngineCommand>();

        session.state = SessionState::Live;
        info!(session_id = %session.id, duration = session.duration_budget_secs, "session live");

        let task = SessionTask {
            session: session.clone(),
            fencing: Arc::clone(&self.fencing),
            active: Arc::clone(&self.active),
            transcript: Arc::clone(&transcript),
            bridge,
            stream,
            pipeline,
            timer,
            synthesis: Arc::clone(&synthesis),
            emitter: Arc::clone(&emitter),
            document: collaborators.document,
            finished: Arc::clone(&finished),
        };
        drop(tokio::spawn(task.run(updates_rx, timer_rx, commands_rx)));

        Ok(EngineHandle {
            session_id: session.id,
            emitter,
            commands: commands_tx,
            remaining,
            progress,
            transcript,
            synthesis,
            finished,
        })
    }
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Host-facing handle to a running (or finished) session.
pub struct EngineHandle {
    session_id: SessionId,
    emitter: Arc<EventEmitter>,
    commands: mpsc::UnboundedSender<EngineCommand>,
    remaining: watch::Receiver<u64>,
    progress: watch::Receiver<f64>,
    transcript: Arc<Mutex<TranscriptLog>>,
    synthesis: Arc<SynthesisPipeline>,
    finished: Arc<Mutex<Option<FinishedSession>>>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// The session this handle controls.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn events(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.emitter.subscribe()
    }

    /// Inject a user-authored message. No-op after termination.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(EngineCommand::SendText(text.into()));
    }

    /// End the session. Idempotent; shares the termination path with
    /// timer expiry.
    pub fn end_session(&self) {
        let _ = self.commands.send(EngineCommand::EndSession);
    }

    /// Watch the countdown (seconds remaining).
    #[must_use]
    pub fn remaining_watch(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Watch the simulated synthesis progress (0.0 to 1.0).
    #[must_use]
    pub fn synthesis_progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Snapshot of the transcript so far.
    #[must_use]
    pub fn transcript(&self) -> TranscriptLog {
        self.transcript.lock().clone()
    }

    /// Re-run synthesis for the finished session (after a retryable
    /// failure, or to regenerate — the report overwrites by session id).
    pub async fn retry_synthesis(&self) -> Result<ReportArtifact, EngineError> {
        let data = self
            .finished
            .lock()
            .clone()
            .ok_or(EngineError::NoFinishedSession)?;
        let report = self
            .synthesis
            .run(
                &data.session,
                &data.transcript,
                &data.snapshot,
                &data.recording,
            )
            .await?;
        let _ = self.emitter.emit(EngineEvent::ReportReady {
            base: BaseEvent::now(self.session_id.as_str()),
            score: report.score,
            verdict: report.verdict,
        });
        Ok(report)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionTask — the dispatch loop
// ─────────────────────────────────────────────────────────────────────────────

/// Why the dispatch loop exited.
enum LoopExit {
    End(EndReason),
    Failed(StreamError),
}

struct SessionTask {
    session: Session,
    fencing: Arc<FencingUnit>,
    active: Arc<Mutex<Option<SessionId>>>,
    transcript: Arc<Mutex<TranscriptLog>>,
    bridge: ToolCallBridge,
    stream: StreamHandle,
    pipeline: Arc<MediaPipeline>,
    timer: LifecycleTimer,
    synthesis: Arc<SynthesisPipeline>,
    emitter: Arc<EventEmitter>,
    document: Arc<dyn DocumentAccessor>,
    finished: Arc<Mutex<Option<FinishedSession>>>,
}

impl SessionTask {
    fn base(&self) -> BaseEvent {
        BaseEvent::now(self.session.id.as_str())
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.emitter.emit(event);
    }

    async fn run(
        mut self,
        mut updates: mpsc::Receiver<StreamUpdate>,
        mut timer_rx: mpsc::Receiver<TimerSignal>,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    ) {
        self.emit(EngineEvent::SessionStarted {
            base: self.base(),
            mode: self.session.mode,
            duration_budget_secs: self.session.duration_budget_secs,
        });
        self.emit(EngineEvent::RecordingStarted {
            base: self.base(),
            mime_type: self.pipeline.mime_type().to_owned(),
        });

        let mut updates_open = true;
        let mut timer_open = true;
        let exit = loop {
            tokio::select! {
                update = updates.recv(), if updates_open => match update {
                    Some(update) => {
                        if !self.fencing.admit(update.token, "stream") {
                            continue;
                        }
                        if let Some(exit) = self.on_stream_update(update.kind) {
                            break exit;
                        }
                    }
                    None => {
                        // Supervisor gone without a Fatal or Disconnected
                        // update; treat as an unrecoverable drop.
                        updates_open = false;
                        break LoopExit::Failed(StreamError::Connection {
                            message: "stream supervisor ended unexpectedly".into(),
                        });
                    }
                },
                signal = timer_rx.recv(), if timer_open => match signal {
                    Some(TimerSignal::Tick { remaining_secs }) => {
                        self.emit(EngineEvent::CountdownTick {
                            base: self.base(),
                            remaining_secs,
                        });
                    }
                    Some(TimerSignal::Expired) => break LoopExit::End(EndReason::TimeExpired),
                    None => timer_open = false,
                },
                command = commands.recv() => match command {
                    Some(EngineCommand::SendText(text)) => self.stream.send_text(text),
                    Some(EngineCommand::EndSession) | None => {
                        break LoopExit::End(EndReason::UserRequested);
                    }
                },
            }
        };

        match exit {
            LoopExit::End(reason) => self.terminate(reason, None).await,
            LoopExit::Failed(error) => self.terminate(EndReason::Fatal, Some(error)).await,
        }
    }

    /// Apply one fenced stream update. Returns how to exit the loop, if
    /// at all.
    fn on_stream_update(&mut self, kind: StreamUpdateKind) -> Option<LoopExit> {
        match kind {
            StreamUpdateKind::Opened { attempt } => {
                self.emit(EngineEvent::ConnectionOpened {
                    base: self.base(),
                    attempt,
                });
                None
            }
            StreamUpdateKind::TranscriptDelta { role, text } => {
                self.transcript.lock().append(role, &text);
                self.emit(EngineEvent::TranscriptDelta {
                    base: self.base(),
                    role,
                    delta: text,
                });
                None
            }
            StreamUpdateKind::ToolCalls { calls } => {
                for call in calls {
                    self.emit(EngineEvent::ToolCallReceived {
                        base: self.base(),
                        tool_call_id: call.id.as_str().to_owned(),
                        name: call.name.clone(),
                    });
                    let response = self.bridge.resolve(&call);
                    self.emit(EngineEvent::ToolCallResolved {
                        base: self.base(),
                        tool_call_id: response.id.as_str().to_owned(),
                        name: response.name.clone(),
                        is_error: response.is_error,
                    });
                    self.stream.send_tool_responses(vec![response]);
                }
                None
            }
            StreamUpdateKind::Reconnecting {
                attempt,
                delay_ms,
                reason,
            } => {
                if attempt == 0 {
                    self.emit(EngineEvent::ConnectionLost {
                        base: self.base(),
                        reason,
                    });
                }
                self.emit(EngineEvent::ReconnectScheduled {
                    base: self.base(),
                    attempt,
                    delay_ms,
                });
                None
            }
            // Only produced by our own disconnect during termination.
            StreamUpdateKind::Disconnected => None,
            StreamUpdateKind::Fatal { error } => Some(LoopExit::Failed(error)),
        }
    }

    /// The one termination path: identical downstream effects whether
    /// triggered by user action, timer expiry, or a fatal stream error.
    #[instrument(skip(self, failure), fields(session_id = %self.session.id, ?reason))]
    async fn terminate(mut self, reason: EndReason, failure: Option<StreamError>) {
        info!("session terminating");
        if let Some(error) = &failure {
            let vox = VoxError::from(error.clone());
            self.emit(EngineEvent::SessionFailed {
                base: self.base(),
                code: vox.code().to_owned(),
                error: error.to_string(),
                recoverable: true,
            });
        }
        self.emit(EngineEvent::SessionEnding {
            base: self.base(),
            reason,
        });
        self.session.state = SessionState::Ending;

        self.timer.cancel();
        self.stream.disconnect();
        let recording = self.pipeline.stop();
        if let Some(recording) = &recording {
            self.emit(EngineEvent::RecordingSealed {
                base: self.base(),
                bytes: recording.len() as u64,
            });
        }

        let snapshot = self.document.current_document();
        let transcript = self.transcript.lock().clone();

        if let Some(recording) = recording {
            let forwarder = self.spawn_progress_forwarder();
            match self
                .synthesis
                .run(&self.session, &transcript, &snapshot, &recording)
                .await
            {
                Ok(report) => {
                    self.emit(EngineEvent::ReportReady {
                        base: self.base(),
                        score: report.score,
                        verdict: report.verdict,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "synthesis failed; report pending, artifacts durable");
                }
            }
            forwarder.abort();
            *self.finished.lock() = Some(FinishedSession {
                session: self.session.clone(),
                transcript,
                snapshot,
                recording,
            });
        } else {
            warn!("no recording was sealed; skipping synthesis");
        }

        match failure {
            Some(error) => {
                self.session.state = SessionState::Failed {
                    code: VoxError::from(error).code().to_owned(),
                };
            }
            None => {
                self.session.state = SessionState::Complete;
                self.emit(EngineEvent::SessionComplete { base: self.base() });
            }
        }
        *self.active.lock() = None;
        info!("session terminated");
    }

    /// Mirror the synthesis progress watch into engine events until it
    /// reaches 1.0.
    fn spawn_progress_forwarder(&self) -> tokio::task::JoinHandle<()> {
        let mut progress = self.synthesis.progress();
        let emitter = Arc::clone(&self.emitter);
        let session_id = self.session.id.clone();
        tokio::spawn(async move {
            while progress.changed().await.is_ok() {
                let p = *progress.borrow_and_update();
                let _ = emitter.emit(EngineEvent::SynthesisProgress {
                    base: BaseEvent::now(session_id.as_str()),
                    progress: p,
                });
                if (p - 1.0).abs() < f64::EPSILON {
                    break;
                }
            }
        })
    }
}
