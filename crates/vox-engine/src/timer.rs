//! Lifecycle countdown timer.
//!
//! Decrements once per second and delivers [`TimerSignal::Expired`]
//! exactly once when the budget runs out, then stops itself. Expiry
//! feeds the same termination path as a manual end, so both produce
//! identical downstream effects. `cancel` is idempotent and safe to
//! call after expiry. The timer is not one-shot, so it carries an
//! explicit stop flag in addition to the engine's fencing.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What the timer reports into the dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerSignal {
    /// One second elapsed.
    Tick {
        /// Seconds left in the budget.
        remaining_secs: u64,
    },
    /// The budget ran out. Delivered exactly once.
    Expired,
}

/// Running countdown for one session.
pub struct LifecycleTimer {
    cancel: CancellationToken,
    remaining: watch::Receiver<u64>,
}

impl LifecycleTimer {
    /// Start counting down `duration_secs`, delivering signals into the
    /// dispatch loop's queue.
    #[must_use]
    pub fn start(duration_secs: u64, signals: mpsc::Sender<TimerSignal>) -> Self {
        let cancel = CancellationToken::new();
        let (remaining_tx, remaining_rx) = watch::channel(duration_secs);

        let stop = cancel.clone();
        drop(tokio::spawn(async move {
            let mut remaining = duration_secs;
            let mut ticks = tokio::time::interval(Duration::from_secs(1));
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick completes immediately; consume it
            // so the countdown starts one full second from now.
            let _ = ticks.tick().await;
            loop {
                tokio::select! {
                    () = stop.cancelled() => {
                        debug!(remaining, "countdown cancelled");
                        return;
                    }
                    _ = ticks.tick() => {
                        remaining = remaining.saturating_sub(1);
                        let _ = remaining_tx.send_replace(remaining);
                        if signals.send(TimerSignal::Tick { remaining_secs: remaining }).await.is_err() {
                            return;
                        }
                        if remaining == 0 {
                            let _ = signals.send(TimerSignal::Expired).await;
                            return;
                        }
                    }
                }
            }
        }));

        Self {
            cancel,
            remaining: remaining_rx,
        }
    }

    /// Stop the countdown. Idempotent; a no-op after expiry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Seconds left in the budget.
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Watch the countdown (for host UI).
    #[must_use]
    pub fn remaining_watch(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
