//! Crop a large image to a sub-rectangle and present the crop as its own image
//!
//! Downstream code sees only the cropped coordinate space; source rectangles
//! are shifted by the clip origin before they reach the wrapped image.

use kurbo::{Rect, Vec2};

use crate::geometry::PixelRect;

/// Which clip was requested last
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ClipMode {
    #[default]
    None,
    /// Absolute source pixels
    Rect(PixelRect),
    /// Fractions of the source size, `[0, 1]`
    Percent(Rect),
}

#[derive(Clone, Debug, Default)]
pub struct ClipTransform {
    mode: ClipMode,
    source: Option<(u32, u32)>,
    clip: PixelRect,
}

impl ClipTransform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> ClipMode {
        self.mode
    }

    /// Resolved clip in source pixels; empty when nothing is drawn.
    #[must_use]
    pub fn clip(&self) -> PixelRect {
        self.clip
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clip.is_empty()
    }

    /// Size reported to the viewport: the clip size, `0x0` when empty.
    #[must_use]
    pub fn intrinsic_size(&self) -> (u32, u32) {
        if self.clip.is_empty() {
            (0, 0)
        } else {
            (self.clip.width(), self.clip.height())
        }
    }

    /// Sets or clears the wrapped image size and re-resolves the clip.
    pub fn set_source_size(&mut self, size: Option<(u32, u32)>) {
        self.source = size;
        self.update_clip();
    }

    /// Returns `true` when the request changed the mode or its rectangle.
    pub fn set_clip_rect(&mut self, rect: PixelRect) -> bool {
        self.set_mode(ClipMode::Rect(rect))
    }

    /// Returns `true` when the request changed the mode or its rectangle.
    pub fn set_clip_percent(&mut self, percent: Rect) -> bool {
        self.set_mode(ClipMode::Percent(percent))
    }

    pub fn clear_clip(&mut self) -> bool {
        self.set_mode(ClipMode::None)
    }

    fn set_mode(&mut self, mode: ClipMode) -> bool {
        if self.mode == mode {
            return false;
        }
        self.mode = mode;
        self.update_clip();
        true
    }

    fn update_clip(&mut self) {
        let Some((width, height)) = self.source else {
            self.clip = PixelRect::EMPTY;
            return;
        };
        let full = PixelRect::from_size(width, height);

        let wanted = match self.mode {
            ClipMode::None => Some(full),
            ClipMode::Rect(rect) => Some(rect).filter(|r| !r.is_empty()),
            ClipMode::Percent(p) => {
                let empty = p.x0 >= p.x1 || p.y0 >= p.y1;
                (!empty).then(|| {
                    let (w, h) = (f64::from(width), f64::from(height));
                    PixelRect::new(
                        (p.x0 * w) as i32,
                        (p.y0 * h) as i32,
                        (p.x1 * w) as i32,
                        (p.y1 * h) as i32,
                    )
                })
            }
        };

        self.clip = wanted
            .and_then(|r| full.intersect(&r))
            .unwrap_or(PixelRect::EMPTY);
    }

    /// Maps a rectangle in clip space into the wrapped image's space.
    /// `None` when the clip is empty and nothing may be drawn.
    #[must_use]
    pub fn map_source_rect(&self, src: Rect) -> Option<Rect> {
        if self.clip.is_empty() {
            return None;
        }
        Some(src + Vec2::new(f64::from(self.clip.left), f64::from(self.clip.top)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clipped(width: u32, height: u32) -> ClipTransform {
        let mut clip = ClipTransform::new();
        clip.set_source_size(Some((width, height)));
        clip
    }

    #[test]
    fn no_clip_covers_the_source() {
        let clip = clipped(400, 300);
        assert_eq!(clip.intrinsic_size(), (400, 300));
        assert_eq!(
            clip.map_source_rect(Rect::new(1.0, 2.0, 3.0, 4.0)),
            Some(Rect::new(1.0, 2.0, 3.0, 4.0))
        );
    }

    #[test]
    fn rect_clip_is_clamped_and_offsets_queries() {
        let mut clip = clipped(400, 300);
        assert!(clip.set_clip_rect(PixelRect::new(300, -20, 600, 100)));
        assert_eq!(clip.clip(), PixelRect::new(300, 0, 400, 100));
        assert_eq!(clip.intrinsic_size(), (100, 100));
        assert_eq!(
            clip.map_source_rect(Rect::new(10.0, 10.0, 50.0, 60.0)),
            Some(Rect::new(310.0, 10.0, 350.0, 60.0))
        );
    }

    #[test]
    fn disjoint_clip_is_empty_and_forwards_nothing() {
        let mut clip = clipped(400, 300);
        clip.set_clip_rect(PixelRect::new(500, 500, 600, 600));
        assert!(clip.is_empty());
        assert_eq!(clip.intrinsic_size(), (0, 0));
        assert_eq!(clip.map_source_rect(Rect::new(0.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn percent_clip_truncates_toward_zero() {
        let mut clip = clipped(333, 100);
        clip.set_clip_percent(Rect::new(0.5, 0.25, 1.0, 0.755));
        assert_eq!(clip.clip(), PixelRect::new(166, 25, 333, 75));

        clip.set_source_size(Some((1000, 1000)));
        assert_eq!(clip.clip(), PixelRect::new(500, 250, 1000, 755));
    }

    #[test]
    fn inverted_percent_is_empty() {
        let mut clip = clipped(100, 100);
        clip.set_clip_percent(Rect::new(0.8, 0.0, 0.2, 1.0));
        assert!(clip.is_empty());
    }

    #[test]
    fn repeated_requests_report_no_change() {
        let mut clip = clipped(100, 100);
        assert!(!clip.clear_clip());
        assert!(clip.set_clip_rect(PixelRect::new(0, 0, 10, 10)));
        assert!(!clip.set_clip_rect(PixelRect::new(0, 0, 10, 10)));
        assert!(clip.clear_clip());
        assert_eq!(clip.intrinsic_size(), (100, 100));
    }

    #[test]
    fn unbound_source_clips_everything() {
        let mut clip = clipped(100, 100);
        clip.set_source_size(None);
        assert!(clip.is_empty());
    }
}
