//! Reconnect backoff calculation.
//!
//! Portable, sync-only building blocks; the async retry execution lives
//! in `vox-stream` (which has access to tokio). The reconnect schedule
//! is deterministic — delay for attempt `n` (0-indexed) is
//! `min(base * 2^n, max)` — with an optional jittered variant for
//! callers that want spread.

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 2000;
/// Default reconnect delay cap in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;
/// Default maximum reconnect attempts. Attempt indices run `0..max`;
/// attempt `max` is never made.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Backoff delay for a reconnect attempt.
///
/// Formula: `min(base_delay_ms * 2^attempt, max_delay_ms)`, with the
/// exponent clamped so high attempt numbers cannot overflow.
///
/// `attempt` is the zero-based attempt index.
#[must_use]
pub fn backoff_delay_ms(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

/// Backoff delay using the default reconnect schedule.
#[must_use]
pub fn reconnect_delay_ms(attempt: u32) -> u64 {
    backoff_delay_ms(attempt, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_DELAY_MS)
}

/// Backoff delay with explicit randomness for jitter.
///
/// `random` should be a value in `[0.0, 1.0)` from a PRNG. Maps to a
/// multiplier in `[1 - jitter_factor, 1 + jitter_factor]`.
#[must_use]
pub fn backoff_delay_ms_with_jitter(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let capped = backoff_delay_ms(attempt, base_delay_ms, max_delay_ms);
    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    let with_jitter = (capped as f64) * jitter;
    with_jitter.round().max(0.0) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_schedule_matches_policy() {
        // min(2000 * 2^n, 10000)
        assert_eq!(reconnect_delay_ms(0), 2000);
        assert_eq!(reconnect_delay_ms(1), 4000);
        assert_eq!(reconnect_delay_ms(2), 8000);
        assert_eq!(reconnect_delay_ms(3), 10_000);
        assert_eq!(reconnect_delay_ms(4), 10_000);
    }

    #[test]
    fn backoff_caps_at_max() {
        assert_eq!(backoff_delay_ms(10, 2000, 10_000), 10_000);
    }

    #[test]
    fn backoff_high_attempt_no_overflow() {
        let delay = backoff_delay_ms(100, 2000, 10_000);
        assert_eq!(delay, 10_000);
    }

    #[test]
    fn jitter_random_zero_shrinks() {
        // random = 0.0 → multiplier 1 - 0.2 = 0.8
        let delay = backoff_delay_ms_with_jitter(0, 1000, 60_000, 0.2, 0.0);
        assert_eq!(delay, 800);
    }

    #[test]
    fn jitter_random_half_is_neutral() {
        let delay = backoff_delay_ms_with_jitter(0, 1000, 60_000, 0.2, 0.5);
        assert_eq!(delay, 1000);
    }

    #[test]
    fn jitter_random_one_grows() {
        let delay = backoff_delay_ms_with_jitter(0, 1000, 60_000, 0.2, 1.0);
        assert_eq!(delay, 1200);
    }

    #[test]
    fn default_attempt_cap() {
        assert_eq!(DEFAULT_MAX_ATTEMPTS, 5);
    }
}
