//! Scoring collaborator contract.
//!
//! The scoring service turns a finished session (transcript + last code
//! snapshot + mode) into a structured [`ReportArtifact`]. The call can
//! take multiple seconds; the pipeline's simulated progress signal
//! covers the wait. A failure here is retryable — the session and its
//! recording are already durable by the time scoring runs.

use async_trait::async_trait;

use vox_core::artifacts::ReportArtifact;
use vox_core::errors::SynthesisError;
use vox_core::ids::SessionId;
use vox_core::session::SessionMode;
use vox_core::transcript::TranscriptLog;

/// Produces evaluation reports.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Evaluate a finished session.
    ///
    /// The returned report must carry `session_id`; the pipeline
    /// persists it keyed by that id, overwriting any prior report.
    async fn evaluate(
        &self,
        session_id: &SessionId,
        transcript: &TranscriptLog,
        code_snapshot: &str,
        mode: SessionMode,
    ) -> Result<ReportArtifact, SynthesisError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Test fake
// ─────────────────────────────────────────────────────────────────────────────

/// Scriptable scoring service for tests: canned report, injectable
/// failure, optional hang until notified.
#[derive(Default)]
pub struct FakeScoring {
    fail: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicU32,
    gate: parking_lot::Mutex<Option<std::sync::Arc<tokio::sync::Notify>>>,
}

impl FakeScoring {
    /// New fake that succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future calls fail.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make future calls wait until the notify fires.
    pub fn set_gate(&self, gate: std::sync::Arc<tokio::sync::Notify>) {
        *self.gate.lock() = Some(gate);
    }

    /// How many evaluations were requested.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringService for FakeScoring {
    async fn evaluate(
        &self,
        session_id: &SessionId,
        transcript: &TranscriptLog,
        code_snapshot: &str,
        mode: SessionMode,
    ) -> Result<ReportArtifact, SynthesisError> {
        let _ = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(SynthesisError::Scoring {
                message: "injected scoring failure".into(),
            });
        }
        let mut metrics = std::collections::BTreeMap::new();
        let _ = metrics.insert("turns".to_owned(), transcript.len() as f64);
        let _ = metrics.insert("code_chars".to_owned(), code_snapshot.len() as f64);
        Ok(ReportArtifact {
            session_id: session_id.clone(),
            score: 82.5,
            metrics,
            verdict: vox_core::artifacts::Verdict::Pass,
            strengths: vec![format!("engaged throughout the {mode} session")],
            improvements: vec!["quantify trade-offs earlier".into()],
            summary: "Strong communication with working code.".into(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::transcript::Role;

    #[tokio::test]
    async fn fake_scoring_produces_keyed_report() {
        let scoring = FakeScoring::new();
        let mut transcript = TranscriptLog::new();
        transcript.append(Role::User, "hi");
        let id = SessionId::from("s1");

        let report = scoring
            .evaluate(&id, &transcript, "print('hi')", SessionMode::Practice)
            .await
            .unwrap();
        assert_eq!(report.session_id, id);
        assert_eq!(report.metrics["turns"], 1.0);
        assert_eq!(scoring.call_count(), 1);
    }

    #[tokio::test]
    async fn fake_scoring_injected_failure() {
        let scoring = FakeScoring::new();
        scoring.set_fail(true);
        let err = scoring
            .evaluate(
                &SessionId::from("s1"),
                &TranscriptLog::new(),
                "",
                SessionMode::Practice,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Scoring { .. }));
    }
}
