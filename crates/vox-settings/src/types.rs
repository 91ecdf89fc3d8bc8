//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the host
//! JSON wire format. Each type implements [`Default`] with production
//! default values. Types marked with `#[serde(default)]` allow partial
//! JSON — missing fields get their default value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the vox session engine.
///
/// Loaded from `~/.vox/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoxSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Session lifetime and resumption settings.
    pub session: SessionSettings,
    /// Reconnect backoff settings.
    pub connection: ConnectionSettings,
    /// Capture, compositing, and recording settings.
    pub media: MediaSettings,
    /// Post-session synthesis settings.
    pub synthesis: SynthesisSettings,
}

impl Default for VoxSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "vox".to_string(),
            session: SessionSettings::default(),
            connection: ConnectionSettings::default(),
            media: MediaSettings::default(),
            synthesis: SynthesisSettings::default(),
        }
    }
}

impl VoxSettings {
    /// Clamp out-of-range fields and correct invalid invariants.
    ///
    /// Called automatically during loading. Out-of-range values are
    /// clamped with a warning rather than rejected, so users get
    /// corrected behavior instead of a confusing error.
    pub fn validate(&mut self) {
        let m = &mut self.media;
        if m.frame_rate_hz == 0 || m.frame_rate_hz > 60 {
            let clamped = m.frame_rate_hz.clamp(1, 60);
            tracing::warn!(
                "media frameRateHz out of range ({}), clamped to {clamped}",
                m.frame_rate_hz
            );
            m.frame_rate_hz = clamped;
        }
        if m.pip_scale <= 0.0 || m.pip_scale > 0.5 {
            let clamped = m.pip_scale.clamp(0.05, 0.5);
            tracing::warn!(
                "media pipScale out of range ({}), clamped to {clamped}",
                m.pip_scale
            );
            m.pip_scale = clamped;
        }

        let c = &mut self.connection;
        if c.max_delay_ms < c.base_delay_ms {
            tracing::warn!(
                "connection maxDelayMs ({}) < baseDelayMs ({}), correcting",
                c.max_delay_ms,
                c.base_delay_ms
            );
            c.max_delay_ms = c.base_delay_ms;
        }
        if c.max_attempts == 0 {
            tracing::warn!("connection maxAttempts must be at least 1, correcting");
            c.max_attempts = 1;
        }
    }
}

/// Session lifetime and resumption settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Hard session lifetime in seconds.
    pub duration_budget_secs: u64,
    /// Transcript turns replayed as resumption context after a reconnect.
    pub resumption_tail_turns: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_budget_secs: 2700,
            resumption_tail_turns: 6,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Base delay for exponential backoff in ms.
    pub base_delay_ms: u64,
    /// Maximum delay between reconnects in ms.
    pub max_delay_ms: u64,
    /// Maximum reconnect attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
            max_attempts: 5,
        }
    }
}

/// Capture, compositing, and recording settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaSettings {
    /// Composite canvas width in pixels.
    pub canvas_width: u32,
    /// Composite canvas height in pixels.
    pub canvas_height: u32,
    /// Compositor tick rate.
    pub frame_rate_hz: u32,
    /// Picture-in-picture box size as a fraction of the canvas width.
    pub pip_scale: f64,
    /// Picture-in-picture margin from the canvas edge in pixels.
    pub pip_margin_px: u32,
    /// Recording container MIME type.
    pub mime_type: String,
}

impl Default for MediaSettings {
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

/// Post-session synthesis settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisSettings {
    /// How often the simulated progress signal updates, in ms.
    pub progress_interval_ms: u64,
    /// Fraction of the remaining distance to 1.0 covered per update.
    pub progress_step: f64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 250,
            progress_step: 0.05,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
