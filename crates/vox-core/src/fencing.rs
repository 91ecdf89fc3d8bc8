//! Fencing tokens for superseded-operation invalidation.
//!
//! Every asynchronous chain in the engine (stream callbacks, reconnect
//! backoff sleeps, timer ticks, compositor frames, scoring calls)
//! captures the token that was current when the operation was initiated.
//! Before applying any effect, the dispatch loop compares the captured
//! token against the current one and silently drops the effect on
//! mismatch. A slow reconnect or a late frame callback from a superseded
//! attempt can therefore never corrupt engine state.
//!
//! Tokens are strictly increasing for the lifetime of a [`FencingUnit`]
//! and are never reused.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::{Deserialize, Serialize};

/// A monotonically increasing generation token.
///
/// Ordering is meaningful: a larger token supersedes a smaller one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FencingToken(u64);

impl FencingToken {
    /// Raw token value (for logging).
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for FencingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Issues fencing tokens and answers "is this effect still current?".
///
/// One unit per engine instance. Issuing a new token supersedes every
/// previously issued token.
#[derive(Debug, Default)]
pub struct FencingUnit {
    counter: AtomicU64,
}

impl FencingUnit {
    /// Create a new unit. No token is current until [`issue`](Self::issue)
    /// is called; [`admit`](Self::admit) rejects everything before then.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token strictly greater than any previously issued token.
    pub fn issue(&self) -> FencingToken {
        FencingToken(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The most recently issued token, or `None` before the first issue.
    #[must_use]
    pub fn current(&self) -> Option<FencingToken> {
        match self.counter.load(Ordering::SeqCst) {
            0 => None,
            n => Some(FencingToken(n)),
        }
    }

    /// Whether `token` is the current generation.
    #[must_use]
    pub fn is_current(&self, token: FencingToken) -> bool {
        self.counter.load(Ordering::SeqCst) == token.0
    }

    /// Gate an effect: returns `true` when `token` is current, otherwise
    /// records the dropped effect and returns `false`.
    ///
    /// `origin` labels the effect source for the log line.
    pub fn admit(&self, token: FencingToken, origin: &str) -> bool {
        if self.is_current(token) {
            true
        } else {
            counter!("vox_fencing_stale_effects_total").increment(1);
            tracing::debug!(%token, origin, "dropped stale effect");
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_strictly_increase() {
        let unit = FencingUnit::new();
        let a = unit.issue();
        let b = unit.issue();
        let c = unit.issue();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn no_current_token_before_first_issue() {
        let unit = FencingUnit::new();
        assert_eq!(unit.current(), None);
    }

    #[test]
    fn current_tracks_latest_issue() {
        let unit = FencingUnit::new();
        let a = unit.issue();
        assert_eq!(unit.current(), Some(a));
        let b = unit.issue();
        assert_eq!(unit.current(), Some(b));
    }

    #[test]
    fn issued_token_is_current_until_superseded() {
        let unit = FencingUnit::new();
        let a = unit.issue();
        assert!(unit.is_current(a));
        let b = unit.issue();
        assert!(!unit.is_current(a));
        assert!(unit.is_current(b));
    }

    #[test]
    fn admit_accepts_current() {
        let unit = FencingUnit::new();
        let token = unit.issue();
        assert!(unit.admit(token, "test"));
    }

    #[test]
    fn admit_rejects_stale() {
        let unit = FencingUnit::new();
        let stale = unit.issue();
        let _ = unit.issue();
        assert!(!unit.admit(stale, "test"));
    }

    #[test]
    fn admit_rejects_before_first_issue() {
        let a = FencingUnit::new();
        let foreign = a.issue();
        let b = FencingUnit::new();
        assert!(!b.admit(foreign, "test"));
    }

    #[test]
    fn token_display() {
        let unit = FencingUnit::new();
        let token = unit.issue();
        assert_eq!(format!("{token}"), "gen-1");
    }

    #[test]
    fn token_serde_roundtrip() {
        let unit = FencingUnit::new();
        let token = unit.issue();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "1");
        let back: FencingToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
