//! Composite layout selection.
//!
//! Recomputed every tick from the canvas aspect ratio and which sources
//! currently have frames: screen (when present) is the full-bleed
//! primary with the camera in a picture-in-picture box; without screen
//! the camera goes full-bleed. Losing the screen mid-session simply
//! changes what the next tick computes — devices are never re-acquired.

use serde::{Deserialize, Serialize};

use vox_core::session::SourceKind;

/// Canvas orientation, chosen from the aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Width >= height.
    Landscape,
    /// Height > width.
    Portrait,
}

/// A pixel rectangle on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Shrink the rect by `border` pixels on every side.
    #[must_use]
    pub fn inset(&self, border: u32) -> Self {
        Self {
            x: self.x + border,
            y: self.y + border,
            width: self.width.saturating_sub(border * 2),
            height: self.height.saturating_sub(border * 2),
        }
    }
}

/// One tick's compositing plan. Derived, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeLayout {
    /// Canvas width in pixels.
    pub canvas_width: u32,
    /// Canvas height in pixels.
    pub canvas_height: u32,
    /// Canvas orientation.
    pub orientation: Orientation,
    /// Full-bleed source, `None` when nothing has frames.
    pub primary: Option<SourceKind>,
    /// Picture-in-picture source.
    pub pip: Option<SourceKind>,
    /// Where the picture-in-picture box goes.
    pub pip_rect: Option<Rect>,
}

/// Compute the layout for one tick.
///
/// `has_camera` / `has_screen` reflect which sources produced a frame
/// this tick, not which were acquired.
#[must_use]
pub fn compute_layout(
    canvas_width: u32,
    canvas_height: u32,
    has_camera: bool,
    has_screen: bool,
    pip_scale: f64,
    pip_margin_px: u32,
) -> CompositeLayout {
    let orientation = if canvas_height > canvas_width {
        Orientation::Portrait
    } else {
        Orientation::Landscape
    };

    let (primary, pip) = match (has_screen, has_camera) {
        (true, true) => (Some(SourceKind::Screen), Some(SourceKind::Camera)),
        (true, false) => (Some(SourceKind::Screen), None),
        (false, true) => (Some(SourceKind::Camera), None),
        (false, false) => (None, None),
    };

    let pip_rect = pip.map(|_| {
        let pip_width = ((f64::from(canvas_width) * pip_scale).round() as u32).max(1);
        match orientation {
            // Landscape: 16:9 box anchored bottom-right.
            Orientation::Landscape => {
                let pip_height = (pip_width * 9 / 16).max(1);
                Rect {
                    x: canvas_width.saturating_sub(pip_width + pip_margin_px),
                    y: canvas_height.saturating_sub(pip_height + pip_margin_px),
                    width: pip_width,
                    height: pip_height,
                }
            }
            // Portrait: 3:4 box anchored top-right, clear of the
            // bottom-of-screen content the primary usually carries.
            Orientation::Portrait => {
                let pip_height = (pip_width * 4 / 3).max(1);
                Rect {
                    x: canvas_width.saturating_sub(pip_width + pip_margin_px),
                    y: pip_margin_px,
                    width: pip_width,
                    height: pip_height,
                }
            }
        }
    });

    CompositeLayout {
        canvas_width,
        canvas_height,
        orientation,
        primary,
        pip,
        pip_rect,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
