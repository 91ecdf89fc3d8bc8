//! Post-termination synthesis pipeline.
//!
//! A strictly ordered sequence per session: the recording is sealed
//! upstream (the media pipeline's idempotent `stop`), then
//!
//! 1. persist session metadata + sealed artifact,
//! 2. request a structured report from the scoring collaborator,
//! 3. persist the report keyed by session id (overwrite semantics).
//!
//! A simulated progress signal ticks throughout — asymptotically
//! approaching but never reaching 1.0 until the final persist lands —
//! purely as a liveness indicator during the multi-second scoring call.
//! A scoring failure does not discard anything: the session and
//! recording are already durable, and the run can be retried.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use vox_core::artifacts::{RecordingArtifact, ReportArtifact};
use vox_core::errors::SynthesisError;
use vox_core::ids::SessionId;
use vox_core::session::Session;
use vox_core::transcript::TranscriptLog;

use crate::scoring::ScoringService;
use crate::store::ArtifactStore;

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Progress signal knobs.
#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    /// How often the simulated progress updates.
    pub progress_interval_ms: u64,
    /// Fraction of the remaining distance to 1.0 covered per update.
    pub progress_step: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 250,
            progress_step: 0.05,
        }
    }
}

/// Progress is clamped here until the run actually completes.
const PROGRESS_CEILING: f64 = 0.99;

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Runs the ordered synthesis steps for finished sessions.
pub struct SynthesisPipeline {
    store: Arc<dyn ArtifactStore>,
    scoring: Arc<dyn ScoringService>,
    config: SynthesisConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
    progress: watch::Sender<f64>,
}

/// Removes the session from the in-flight set on every exit path.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self.set.lock().remove(&self.id);
    }
}

impl SynthesisPipeline {
    /// New pipeline over storage and scoring collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        scoring: Arc<dyn ScoringService>,
        config: SynthesisConfig,
    ) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            store,
            scoring,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            progress,
        }
    }

    /// Subscribe to the simulated progress signal (0.0 to 1.0).
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    /// Run the synthesis steps for one finished session.
    ///
    /// Re-entrant safe per session: a concurrent run for the same
    /// session id errors with [`SynthesisError::AlreadyRunning`].
    /// Re-running after completion regenerates the report, overwriting
    /// the previous one.
    #[instrument(skip_all, fields(session_id = %session.id))]
    pub async fn run(
        &self,
        session: &Session,
        transcript: &TranscriptLog,
        code_snapshot: &str,
        recording: &RecordingArtifact,
    ) -> Result<ReportArtifact, SynthesisError> {
        let _guard = self.claim(&session.id)?;
        let _ = self.progress.send_replace(0.0);
        let ticker = self.spawn_progress_ticker();

        let result = self
            .run_steps(session, transcript, code_snapshot, recording)
            .await;

        ticker.cancel();
        match &result {
            Ok(report) => {
                let _ = self.progress.send_replace(1.0);
                info!(score = report.score, "synthesis complete");
                counter!("vox_synthesis_completed_total").increment(1);
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed, artifacts remain durable");
                counter!("vox_synthesis_failed_total").increment(1);
            }
        }
        result
    }

    fn claim(&self, session_id: &SessionId) -> Result<InFlightGuard, SynthesisError> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(session_id.as_str().to_owned()) {
            return Err(SynthesisError::AlreadyRunning {
                session_id: session_id.as_str().to_owned(),
            });
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            id: session_id.as_str().to_owned(),
        })
    }

    async fn run_steps(
        &self,
        session: &Session,
        transcript: &TranscriptLog,
        code_snapshot: &str,
        recording: &RecordingArtifact,
    ) -> Result<ReportArtifact, SynthesisError> {
        // Step 1: session + sealed recording become durable first, so a
        // later scoring failure loses nothing.
        self.store
            .save_artifact(session, transcript, recording)
            .await?;

        // Step 2: the potentially slow scoring call.
        let report = self
            .scoring
            .evaluate(&session.id, transcript, code_snapshot, session.mode)
            .await?;

        // Step 3: report keyed by session id, overwrite semantics.
        self.store.save_report(&report).await?;
        Ok(report)
    }

    /// Simulated progress: each tick covers a fraction of the remaining
    /// distance, so the value approaches 1.0 without reaching it.
    fn spawn_progress_ticker(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let progress = self.progress.clone();
        let interval = Duration::from_millis(self.config.progress_interval_ms);
        let step = self.config.progress_step;
        drop(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        progress.send_modify(|p| {
                            *p = (*p + (1.0 - *p) * step).min(PROGRESS_CEILING);
                        });
                    }
                }
            }
        }));
        cancel
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
