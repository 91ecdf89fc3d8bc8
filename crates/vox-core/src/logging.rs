//! Tracing initialization.
//!
//! One call at host startup; safe to call twice (the second init is a
//! no-op), which keeps tests that each initialize logging from
//! panicking.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The filter comes from `VOX_LOG` when set, else `default_filter`
/// (e.g. `"info,vox_stream=debug"`).
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_env("VOX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_does_not_panic() {
        init_tracing("info");
        init_tracing("debug");
    }
}
