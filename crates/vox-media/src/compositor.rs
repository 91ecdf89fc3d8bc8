//! Software frame compositor.
//!
//! Renders one canvas per tick: full-bleed primary source plus a
//! bordered picture-in-picture box, per the tick's [`CompositeLayout`].
//! Scaling is nearest-neighbor.

use bytes::Bytes;
use tracing::warn;

use vox_core::session::SourceKind;

use crate::layout::{CompositeLayout, Rect};
use crate::sources::VideoFrame;

/// Picture-in-picture border thickness in pixels.
const PIP_BORDER_PX: u32 = 2;
/// Picture-in-picture border color (opaque white).
const PIP_BORDER_RGBA: [u8; 4] = [255, 255, 255, 255];

/// The video frames available for one tick.
#[derive(Clone, Debug, Default)]
pub struct FrameSet {
    /// Latest camera frame, if any.
    pub camera: Option<VideoFrame>,
    /// Latest screen frame, if any.
    pub screen: Option<VideoFrame>,
}

impl FrameSet {
    fn get(&self, kind: SourceKind) -> Option<&VideoFrame> {
        match kind {
            SourceKind::Camera => self.camera.as_ref(),
            SourceKind::Screen => self.screen.as_ref(),
            SourceKind::Microphone => None,
        }
    }
}

/// Stateless canvas renderer.
pub struct FrameCompositor;

impl FrameCompositor {
    /// Render one composited canvas frame.
    ///
    /// Missing sources leave their region black; a frame whose buffer
    /// does not match its declared dimensions is skipped with a warning
    /// rather than read out of bounds.
    #[must_use]
    pub fn render(layout: &CompositeLayout, frames: &FrameSet) -> VideoFrame {
        let width = layout.canvas_width;
        let height = layout.canvas_height;
        let mut canvas = vec![0u8; (width as usize) * (height as usize) * 4];
        // Opaque black base.
        for px in canvas.chunks_exact_mut(4) {
            px[3] = 255;
        }

        if let Some(primary) = layout.primary
            && let Some(frame) = frames.get(primary)
        {
            blit_scaled(
                &mut canvas,
                width,
                frame,
                Rect {
                    x: 0,
                    y: 0,
                    width,
                    height,
                },
            );
        }

        if let (Some(pip), Some(rect)) = (layout.pip, layout.pip_rect)
            && let Some(frame) = frames.get(pip)
        {
            fill_rect(&mut canvas, width, rect, PIP_BORDER_RGBA);
            blit_scaled(&mut canvas, width, frame, rect.inset(PIP_BORDER_PX));
        }

        VideoFrame {
            width,
            height,
            data: Bytes::from(canvas),
        }
    }
}

/// Nearest-neighbor blit of `src` into `dst_rect` on the canvas.
fn blit_scaled(canvas: &mut [u8], canvas_width: u32, src: &VideoFrame, dst_rect: Rect) {
    if src.width == 0 || src.height == 0 || dst_rect.width == 0 || dst_rect.height == 0 {
        return;
    }
    let expected = (src.width as usize) * (src.height as usize) * 4;
    if src.data.len() < expected {
        warn!(
            declared = expected,
            actual = src.data.len(),
            "video frame buffer shorter than declared dimensions, skipping"
        );
        return;
    }

    for dy in 0..dst_rect.height {
        let sy = (u64::from(dy) * u64::from(src.height) / u64::from(dst_rect.height)) as u32;
        for dx in 0..dst_rect.width {
            let sx = (u64::from(dx) * u64::from(src.width) / u64::from(dst_rect.width)) as u32;
            let src_idx = ((sy * src.width + sx) * 4) as usize;
            let dst_idx = (((dst_rect.y + dy) * canvas_width + dst_rect.x + dx) * 4) as usize;
            if dst_idx + 4 <= canvas.len() {
                canvas[dst_idx..dst_idx + 4].copy_from_slice(&src.data[src_idx..src_idx + 4]);
            }
        }
    }
}

/// Fill a canvas rectangle with a solid color.
fn fill_rect(canvas: &mut [u8], canvas_width: u32, rect: Rect, rgba: [u8; 4]) {
    for dy in 0..rect.height {
        for dx in 0..rect.width {
            let idx = (((rect.y + dy) * canvas_width + rect.x + dx) * 4) as usize;
            if idx + 4 <= canvas.len() {
                canvas[idx..idx + 4].copy_from_slice(&rgba);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_layout;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    #[test]
    fn primary_fills_canvas() {
        let layout = compute_layout(64, 32, true, false, 0.25, 2);
        let frames = FrameSet {
            camera: Some(VideoFrame::solid(16, 8, RED)),
            screen: None,
        };
        let out = FrameCompositor::render(&layout, &frames);
        assert_eq!(out.width, 64);
        assert_eq!(out.height, 32);
        assert_eq!(out.pixel(0, 0), Some(RED));
        assert_eq!(out.pixel(63, 31), Some(RED));
        assert_eq!(out.pixel(32, 16), Some(RED));
    }

    #[test]
    fn no_sources_renders_black() {
        let layout = compute_layout(8, 8, false, false, 0.25, 1);
        let out = FrameCompositor::render(&layout, &FrameSet::default());
        assert_eq!(out.pixel(0, 0), Some(BLACK));
        assert_eq!(out.pixel(7, 7), Some(BLACK));
    }

    #[test]
    fn pip_box_has_border_and_content() {
        // 64x32 landscape: pip 16x9 anchored bottom-right with margin 2.
        let layout = compute_layout(64, 32, true, true, 0.25, 2);
        let rect = layout.pip_rect.unwrap();
        let frames = FrameSet {
            camera: Some(VideoFrame::solid(8, 8, BLUE)),
            screen: Some(VideoFrame::solid(8, 8, RED)),
        };
        let out = FrameCompositor::render(&layout, &frames);

        // Outside the pip: primary (screen).
        assert_eq!(out.pixel(0, 0), Some(RED));
        // Pip border corner.
        assert_eq!(out.pixel(rect.x, rect.y), Some(WHITE));
        // Pip interior: camera.
        let inner = rect.inset(2);
        assert_eq!(
            out.pixel(inner.x + inner.width / 2, inner.y + inner.height / 2),
            Some(BLUE)
        );
    }

    #[test]
    fn screen_loss_degrades_to_camera_primary() {
        // Same sources minus the screen frame: camera goes full-bleed.
        let layout = compute_layout(64, 32, true, false, 0.25, 2);
        let frames = FrameSet {
            camera: Some(VideoFrame::solid(8, 8, BLUE)),
            screen: None,
        };
        let out = FrameCompositor::render(&layout, &frames);
        assert_eq!(out.pixel(0, 0), Some(BLUE));
        assert_eq!(out.pixel(63, 31), Some(BLUE));
    }

    #[test]
    fn nearest_neighbor_scaling_splits_evenly() {
        // 2x1 source (left red, right blue) scaled to 8x4: left half red.
        let mut data = Vec::new();
        data.extend_from_slice(&RED);
        data.extend_from_slice(&BLUE);
        let src = VideoFrame {
            width: 2,
            height: 1,
            data: Bytes::from(data),
        };
        let layout = compute_layout(8, 4, false, true, 0.25, 0);
        let frames = FrameSet {
            camera: None,
            screen: Some(src),
        };
        let out = FrameCompositor::render(&layout, &frames);
        assert_eq!(out.pixel(0, 0), Some(RED));
        assert_eq!(out.pixel(3, 3), Some(RED));
        assert_eq!(out.pixel(4, 0), Some(BLUE));
        assert_eq!(out.pixel(7, 3), Some(BLUE));
    }

    #[test]
    fn undersized_buffer_is_skipped_not_read() {
        let bad = VideoFrame {
            width: 100,
            height: 100,
            data: Bytes::from_static(&[0u8; 16]),
        };
        let layout = compute_layout(8, 8, false, true, 0.25, 1);
        let frames = FrameSet {
            camera: None,
            screen: Some(bad),
        };
        let out = FrameCompositor::render(&layout, &frames);
        // Canvas stays black instead of panicking.
        assert_eq!(out.pixel(4, 4), Some(BLACK));
    }
}
