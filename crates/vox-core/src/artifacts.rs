//! Durable session artifacts.
//!
//! Two artifacts survive a session: the sealed [`RecordingArtifact`]
//! (one continuous, self-contained media container) and the
//! [`ReportArtifact`] produced by the scoring collaborator. Both are
//! keyed by session id; the report is idempotent — regeneration
//! overwrites, never duplicates.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::SessionId;

// ─────────────────────────────────────────────────────────────────────────────
// RecordingArtifact
// ─────────────────────────────────────────────────────────────────────────────

/// A sealed session recording. Immutable once created — the media
/// pipeline accumulates bytes while live and seals exactly once on stop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingArtifact {
    /// Session the recording belongs to.
    pub session_id: SessionId,
    /// Sealed container bytes.
    pub data: Bytes,
    /// Container MIME type (e.g. `video/webm`).
    pub mime_type: String,
}

impl RecordingArtifact {
    /// Recording length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the recording captured any data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReportArtifact
// ─────────────────────────────────────────────────────────────────────────────

/// Overall outcome judgment in a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Clear pass.
    Pass,
    /// Mixed result.
    Borderline,
    /// Clear fail.
    Fail,
}

/// Structured evaluation produced by the scoring collaborator.
///
/// At most one exists per session; writing a new one for the same
/// session id replaces the previous.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArtifact {
    /// Session the report evaluates.
    pub session_id: SessionId,
    /// Overall score, 0.0–100.0.
    pub score: f64,
    /// Per-dimension scores (dimension name → score).
    pub metrics: BTreeMap<String, f64>,
    /// Overall judgment.
    pub verdict: Verdict,
    /// What went well.
    pub strengths: Vec<String>,
    /// What to work on.
    pub improvements: Vec<String>,
    /// Narrative summary.
    pub summary: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> ReportArtifact {
        let mut metrics = BTreeMap::new();
        let _ = metrics.insert("communication".to_owned(), 82.0);
        let _ = metrics.insert("problem_solving".to_owned(), 74.5);
        ReportArtifact {
            session_id: SessionId::from("s1"),
            score: 78.0,
            metrics,
            verdict: Verdict::Pass,
            strengths: vec!["clear explanations".into()],
            improvements: vec!["edge-case coverage".into()],
            summary: "Solid session.".into(),
        }
    }

    #[test]
    fn recording_len_and_empty() {
        let r = RecordingArtifact {
            session_id: SessionId::from("s1"),
            data: Bytes::from_static(b"webmdata"),
            mime_type: "video/webm".into(),
        };
        assert_eq!(r.len(), 8);
        assert!(!r.is_empty());

        let empty = RecordingArtifact {
            session_id: SessionId::from("s2"),
            data: Bytes::new(),
            mime_type: "video/webm".into(),
        };
        assert!(empty.is_empty());
    }

    #[test]
    fn report_serde_camel_case() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["verdict"], "pass");
        assert_eq!(json["metrics"]["communication"], 82.0);
        assert_eq!(json["strengths"][0], "clear explanations");
    }

    #[test]
    fn report_serde_roundtrip() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: ReportArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn verdict_variants_serde() {
        assert_eq!(
            serde_json::to_value(Verdict::Borderline).unwrap(),
            serde_json::json!("borderline")
        );
        assert_eq!(
            serde_json::from_str::<Verdict>("\"fail\"").unwrap(),
            Verdict::Fail
        );
    }
}
