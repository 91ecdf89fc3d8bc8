//! Artifact storage collaborator contract and reference implementations.
//!
//! The engine persists two things per session: the session record
//! (metadata + transcript + sealed recording) and the evaluation report.
//! Reports are idempotent on session id — saving again overwrites,
//! never duplicates.
//!
//! [`FsArtifactStore`] is the reference implementation (one directory
//! per session); [`MemoryStore`] backs tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use vox_core::artifacts::{RecordingArtifact, ReportArtifact};
use vox_core::errors::SynthesisError;
use vox_core::ids::SessionId;
use vox_core::session::Session;
use vox_core::transcript::TranscriptLog;

// ─────────────────────────────────────────────────────────────────────────────
// Contract
// ─────────────────────────────────────────────────────────────────────────────

/// Durable storage for session artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the session record and sealed recording.
    async fn save_artifact(
        &self,
        session: &Session,
        transcript: &TranscriptLog,
        recording: &RecordingArtifact,
    ) -> Result<(), SynthesisError>;

    /// Persist a report, overwriting any prior report for the session.
    async fn save_report(&self, report: &ReportArtifact) -> Result<(), SynthesisError>;

    /// Load a previously saved report, if any.
    async fn load_report(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ReportArtifact>, SynthesisError>;
}

fn storage_err(operation: &str, message: impl std::fmt::Display) -> SynthesisError {
    SynthesisError::Storage {
        operation: operation.to_owned(),
        message: message.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FsArtifactStore
// ─────────────────────────────────────────────────────────────────────────────

/// Filesystem-backed store: one directory per session under `root`.
///
/// ```text
/// <root>/<session_id>/session.json    — session metadata + transcript
/// <root>/<session_id>/recording.bin   — sealed recording bytes
/// <root>/<session_id>/report.json     — evaluation report
/// ```
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Store rooted at `root` (created on first write).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }
}

/// On-disk session record shape.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    session: Session,
    transcript: TranscriptLog,
    recording_mime_type: String,
    recording_bytes: u64,
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn save_artifact(
        &self,
        session: &Session,
        transcript: &TranscriptLog,
        recording: &RecordingArtifact,
    ) -> Result<(), SynthesisError> {
        let dir = self.session_dir(&session.id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err("save_artifact", e))?;

        let record = SessionRecord {
            session: session.clone(),
            transcript: transcript.clone(),
            recording_mime_type: recording.mime_type.clone(),
            recording_bytes: recording.len() as u64,
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|e| storage_err("save_artifact", e))?;
        tokio::fs::write(dir.join("session.json"), json)
            .await
            .map_err(|e| storage_err("save_artifact", e))?;
        tokio::fs::write(dir.join("recording.bin"), &recording.data)
            .await
            .map_err(|e| storage_err("save_artifact", e))?;
        debug!(bytes = recording.len(), "session artifact persisted");
        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %report.session_id))]
    async fn save_report(&self, report: &ReportArtifact) -> Result<(), SynthesisError> {
        let dir = self.session_dir(&report.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_err("save_report", e))?;
        let json = serde_json::to_vec_pretty(report).map_err(|e| storage_err("save_report", e))?;
        tokio::fs::write(dir.join("report.json"), json)
            .await
            .map_err(|e| storage_err("save_report", e))?;
        Ok(())
    }

    async fn load_report(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ReportArtifact>, SynthesisError> {
        let path = self.session_dir(session_id).join("report.json");
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let report =
                    serde_json::from_slice(&bytes).map_err(|e| storage_err("load_report", e))?;
                Ok(Some(report))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("load_report", e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory store for tests, with injectable failures.
#[derive(Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    artifacts: parking_lot::Mutex<
        std::collections::HashMap<String, (Session, TranscriptLog, RecordingArtifact)>,
    >,
    reports: parking_lot::Mutex<std::collections::HashMap<String, ReportArtifact>>,
    report_saves: std::sync::atomic::AtomicU32,
    fail_save_artifact: std::sync::atomic::AtomicBool,
    fail_save_report: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future `save_artifact` calls fail.
    pub fn fail_save_artifact(&self, fail: bool) {
        self.inner
            .fail_save_artifact
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make future `save_report` calls fail.
    pub fn fail_save_report(&self, fail: bool) {
        self.inner
            .fail_save_report
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Whether a session artifact was saved.
    #[must_use]
    pub fn has_artifact(&self, session_id: &SessionId) -> bool {
        self.inner.artifacts.lock().contains_key(session_id.as_str())
    }

    /// Number of successful report saves (overwrites included).
    #[must_use]
    pub fn report_save_count(&self) -> u32 {
        self.inner
            .report_saves
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of distinct sessions with a report.
    #[must_use]
    pub fn report_count(&self) -> usize {
        self.inner.reports.lock().len()
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save_artifact(
        &self,
        session: &Session,
        transcript: &TranscriptLog,
        recording: &RecordingArtifact,
    ) -> Result<(), SynthesisError> {
        if self
            .inner
            .fail_save_artifact
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(storage_err("save_artifact", "injected failure"));
        }
        let _ = self.inner.artifacts.lock().insert(
            session.id.as_str().to_owned(),
            (session.clone(), transcript.clone(), recording.clone()),
        );
        Ok(())
    }

    async fn save_report(&self, report: &ReportArtifact) -> Result<(), SynthesisError> {
        if self
            .inner
            .fail_save_report
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(storage_err("save_report", "injected failure"));
        }
        let _ = self
            .inner
            .report_saves
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let _ = self
            .inner
            .reports
            .lock()
            .insert(report.session_id.as_str().to_owned(), report.clone());
        Ok(())
    }

    async fn load_report(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<ReportArtifact>, SynthesisError> {
        Ok(self.inner.reports.lock().get(session_id.as_str()).cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::BTreeMap;
    use vox_core::artifacts::Verdict;
    use vox_core::session::SessionMode;
    use vox_core::transcript::Role;

    fn fixtures() -> (Session, TranscriptLog, RecordingArtifact, ReportArtifact) {
        let session = Session::start(2700, SessionMode::Assessment);
        let mut transcript = TranscriptLog::new();
        transcript.append(Role::Agent, "Question one.");
        transcript.append(Role::User, "Answer one.");
        let recording = RecordingArtifact {
            session_id: session.id.clone(),
            data: Bytes::from_static(b"container-bytes"),
            mime_type: "video/webm".into(),
        };
        let report = ReportArtifact {
            session_id: session.id.clone(),
            score: 71.0,
            metrics: BTreeMap::new(),
            verdict: Verdict::Borderline,
            strengths: vec![],
            improvements: vec![],
            summary: "ok".into(),
        };
        (session, transcript, recording, report)
    }

    #[tokio::test]
    async fn fs_store_roundtrips_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let (session, transcript, recording, report) = fixtures();

        store
            .save_artifact(&session, &transcript, &recording)
            .await
            .unwrap();
        store.save_report(&report).await.unwrap();

        let loaded = store.load_report(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded, report);

        // Recording bytes landed on disk.
        let bin = dir
            .path()
            .join(session.id.as_str())
            .join("recording.bin");
        assert_eq!(std::fs::read(bin).unwrap(), b"container-bytes");
    }

    #[tokio::test]
    async fn fs_store_missing_report_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let result = store.load_report(&SessionId::from("nope")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fs_store_report_overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let (_, _, _, mut report) = fixtures();

        store.save_report(&report).await.unwrap();
        report.score = 90.0;
        store.save_report(&report).await.unwrap();

        let loaded = store.load_report(&report.session_id).await.unwrap().unwrap();
        assert!((loaded.score - 90.0).abs() < f64::EPSILON);

        // One report file, not two.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join(report.session_id.as_str()))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("report"))
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_injected_failures() {
        let store = MemoryStore::new();
        let (session, transcript, recording, report) = fixtures();

        store.fail_save_artifact(true);
        assert!(
            store
                .save_artifact(&session, &transcript, &recording)
                .await
                .is_err()
        );

        store.fail_save_artifact(false);
        store
            .save_artifact(&session, &transcript, &recording)
            .await
            .unwrap();
        assert!(store.has_artifact(&session.id));

        store.fail_save_report(true);
        assert!(store.save_report(&report).await.is_err());
    }
}
