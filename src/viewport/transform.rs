//! Scale and pan state for a large image inside a view rectangle
//!
//! Offsets are in view pixels relative to the bounds origin; content pixel
//! `(x, y)` lands at `bounds.origin + offset + (x, y) * scale`.

use kurbo::{Point, Rect, Size, Vec2};
use log::trace;

use super::types::{Anchor, DrawRects, ScaleLimits, ScaleType, ViewportDebugInfo};
use crate::geometry::{clamp, intersect_rect};

/// Visible rectangle that clips nothing
pub const UNBOUNDED: Rect = Rect::new(
    f64::NEG_INFINITY,
    f64::NEG_INFINITY,
    f64::INFINITY,
    f64::INFINITY,
);

/// Levels closer than this are the same level
const LEVEL_DEDUP_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct ViewportTransform {
    bounds: Rect,
    visible_rect: Rect,
    content: Size,
    offset: Vec2,
    scale: f64,
    scale_levels: Vec<f64>,
    min_scale: f64,
    max_scale: f64,
    scale_type: ScaleType,
    anchor: Anchor,
    limits: ScaleLimits,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::new(ScaleLimits::default())
    }
}

impl ViewportTransform {
    #[must_use]
    pub fn new(limits: ScaleLimits) -> Self {
        Self {
            bounds: Rect::ZERO,
            visible_rect: UNBOUNDED,
            content: Size::ZERO,
            offset: Vec2::ZERO,
            scale: 0.0,
            scale_levels: Vec::new(),
            min_scale: 0.0,
            max_scale: 0.0,
            scale_type: ScaleType::default(),
            anchor: Anchor::default(),
            limits,
        }
    }

    #[must_use]
    pub fn with_policy(limits: ScaleLimits, scale_type: ScaleType, anchor: Anchor) -> Self {
        let mut vt = Self::new(limits);
        vt.scale_type = scale_type;
        vt.anchor = anchor;
        vt
    }

    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    #[must_use]
    pub fn visible_rect(&self) -> Rect {
        self.visible_rect
    }

    #[must_use]
    pub fn content_size(&self) -> Size {
        self.content
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    #[must_use]
    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    #[must_use]
    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Sorted ascending, empty until both bounds and content are set.
    #[must_use]
    pub fn scale_levels(&self) -> &[f64] {
        &self.scale_levels
    }

    #[must_use]
    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    #[must_use]
    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    #[must_use]
    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    /// True when bounds or content have no area; every gesture is a no-op then.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.content.width <= 0.0
            || self.content.height <= 0.0
            || self.bounds.width() <= 0.0
            || self.bounds.height() <= 0.0
    }

    fn is_laid_out(&self) -> bool {
        !self.is_degenerate() && self.scale > 0.0 && !self.scale_levels.is_empty()
    }

    /// Sets the destination rectangle and lays the content out again.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.relayout();
    }

    /// Sets the intrinsic content size. A zero size unbinds the content.
    pub fn set_content_size(&mut self, size: Size) {
        if size == self.content {
            return;
        }
        self.content = size;
        if size.width <= 0.0 || size.height <= 0.0 {
            self.scale = 0.0;
            self.offset = Vec2::ZERO;
            self.scale_levels.clear();
            return;
        }
        self.relayout();
    }

    /// Restricts drawing to `rect` (view coordinates).
    pub fn set_visible_rect(&mut self, rect: Rect) {
        self.visible_rect = rect;
    }

    /// Switches to [`ScaleType::Fixed`] at `scale` (clamped to the levels).
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.scale_type = ScaleType::Fixed;
        self.reset_layout();
    }

    pub fn set_scale_type(&mut self, scale_type: ScaleType) {
        self.scale_type = scale_type;
        self.reset_layout();
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
        self.reset_layout();
    }

    fn relayout(&mut self) {
        self.update_scale_levels();
        self.reset_layout();
    }

    fn fit_scales(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.content.width,
            self.bounds.height() / self.content.height,
        )
    }

    fn update_scale_levels(&mut self) {
        if self.is_degenerate() {
            return;
        }

        let (w_scale, h_scale) = self.fit_scales();
        let mut levels = vec![self.limits.base_scale, w_scale, h_scale];
        if w_scale.max(h_scale) < self.limits.max_scale {
            levels.push(self.limits.max_scale);
        }
        levels.retain(|s| s.is_finite() && *s > 0.0);
        levels.sort_by(f64::total_cmp);
        levels.dedup_by(|a, b| (*a - *b).abs() < LEVEL_DEDUP_EPSILON);

        if let (Some(&min), Some(&max)) = (levels.first(), levels.last()) {
            self.min_scale = min;
            self.max_scale = max;
        }
        self.scale_levels = levels;
    }

    /// Recomputes scale from the scale type and offset from the anchor, then clamps.
    fn reset_layout(&mut self) {
        if self.is_degenerate() || self.scale_levels.is_empty() {
            return;
        }

        let (w_scale, h_scale) = self.fit_scales();
        self.scale = match self.scale_type {
            ScaleType::Origin => 1.0,
            ScaleType::FitWidth => w_scale,
            ScaleType::FitHeight => h_scale,
            ScaleType::Fit => w_scale.min(h_scale),
            ScaleType::Fixed => clamp(self.scale, self.min_scale, self.max_scale),
        };

        let (vw, vh) = (self.bounds.width(), self.bounds.height());
        let (tw, th) = (self.content.width * self.scale, self.content.height * self.scale);
        self.offset = match self.anchor {
            Anchor::TopLeft => Vec2::new(0.0, 0.0),
            Anchor::TopRight => Vec2::new(vw - tw, 0.0),
            Anchor::BottomLeft => Vec2::new(0.0, vh - th),
            Anchor::BottomRight => Vec2::new(vw - tw, vh - th),
            Anchor::Center => Vec2::new((vw - tw) / 2.0, (vh - th) / 2.0),
        };

        self.fix_layout();
        trace!(
            "Layout reset: scale {} offset ({}, {})",
            self.scale, self.offset.x, self.offset.y
        );
    }

    /// Clamps scale into the levels, then each axis: content wider than the
    /// view keeps both view edges covered, narrower content is centered.
    fn fix_layout(&mut self) {
        if self.is_degenerate() || self.scale_levels.is_empty() {
            return;
        }

        self.scale = clamp(self.scale, self.min_scale, self.max_scale);
        self.offset.x = fix_axis(self.offset.x, self.bounds.width(), self.content.width * self.scale);
        self.offset.y = fix_axis(
            self.offset.y,
            self.bounds.height(),
            self.content.height * self.scale,
        );
    }

    /// Pans by `(dx, dy)` view pixels. Returns the part of the delta that
    /// clamping rejected; the whole delta when nothing is laid out.
    pub fn scroll(&mut self, dx: f64, dy: f64) -> Vec2 {
        if !self.is_laid_out() {
            return Vec2::new(dx, dy);
        }

        let old = self.offset;
        self.offset += Vec2::new(dx, dy);
        self.fix_layout();

        Vec2::new(dx - (self.offset.x - old.x), dy - (self.offset.y - old.y))
    }

    /// Zooms by `factor` keeping view point `focal` over the same content point.
    ///
    /// Returns `factor / applied`; the whole `factor` when the scale is
    /// already at the bound it is pushing against or nothing is laid out.
    pub fn scale_at(&mut self, focal: Point, factor: f64) -> f64 {
        if !self.is_laid_out() || !factor.is_finite() || factor <= 0.0 {
            return factor;
        }

        let old_scale = self.scale;
        let new_scale = clamp(old_scale * factor, self.min_scale, self.max_scale);
        if new_scale == old_scale {
            return factor;
        }
        let actual = new_scale / old_scale;
        self.scale = new_scale;

        let local = focal - self.bounds.origin();
        self.offset = local - (local - self.offset) * actual;
        self.fix_layout();

        factor / actual
    }

    /// The next level up from the current scale, wrapping to the smallest.
    #[must_use]
    pub fn next_scale_level(&self) -> f64 {
        let Some(&first) = self.scale_levels.first() else {
            return self.scale;
        };
        self.scale_levels
            .iter()
            .copied()
            .find(|&level| self.scale < level - self.limits.level_epsilon)
            .unwrap_or(first)
    }

    /// Content rectangle in view coordinates.
    #[must_use]
    pub fn displayed_rect(&self) -> Option<Rect> {
        if !self.is_laid_out() {
            return None;
        }
        let origin = self.bounds.origin() + self.offset;
        Some(Rect::from_origin_size(origin, self.content * self.scale))
    }

    /// Source and destination rectangles for the current frame.
    ///
    /// The destination is clipped in view space first (bounds, visible rect,
    /// displayed content) and only then mapped back into content space.
    #[must_use]
    pub fn draw_rects(&self) -> Option<DrawRects> {
        let displayed = self.displayed_rect()?;
        let dst = intersect_rect(self.bounds, self.visible_rect)?;
        let dst = intersect_rect(dst, displayed)?;

        let origin = self.bounds.origin() + self.offset;
        let src = Rect::new(
            (dst.x0 - origin.x) / self.scale,
            (dst.y0 - origin.y) / self.scale,
            (dst.x1 - origin.x) / self.scale,
            (dst.y1 - origin.y) / self.scale,
        );
        let src = intersect_rect(src, Rect::from_origin_size(Point::ORIGIN, self.content))?;

        Some(DrawRects { src, dst })
    }

    /// Content point under view point `p`.
    #[must_use]
    pub fn view_to_source(&self, p: Point) -> Option<Point> {
        if !self.is_laid_out() {
            return None;
        }
        let origin = self.bounds.origin() + self.offset;
        Some(Point::new(
            (p.x - origin.x) / self.scale,
            (p.y - origin.y) / self.scale,
        ))
    }

    /// View point showing content point `p`.
    #[must_use]
    pub fn source_to_view(&self, p: Point) -> Option<Point> {
        if !self.is_laid_out() {
            return None;
        }
        let origin = self.bounds.origin() + self.offset;
        Some(origin + p.to_vec2() * self.scale)
    }

    #[must_use]
    pub fn debug_info(&self) -> ViewportDebugInfo {
        ViewportDebugInfo {
            bounds: self.bounds,
            visible_rect: self.visible_rect,
            content_size: self.content,
            scale: self.scale,
            offset: self.offset,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
            scale_levels: self.scale_levels.clone(),
            scale_type: self.scale_type,
            anchor: self.anchor,
            displayed_rect: self.displayed_rect(),
        }
    }
}

fn fix_axis(offset: f64, view: f64, displayed: f64) -> f64 {
    if displayed > view {
        clamp(offset, view - displayed, 0.0)
    } else {
        (view - displayed) / 2.0
    }
}
