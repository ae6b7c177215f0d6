//! Integer pixel rectangles and the small integer/float helpers shared by the
//! tile grid, the clip transform and the viewport.

use kurbo::Rect;

/// Half-open rectangle in source pixel space: `[left, right) x [top, bottom)`.
///
/// Coordinates are signed so callers can describe regions that hang off the
/// image edge; intersecting with the image rect brings them back in range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle anchored at the origin with the given size.
    #[must_use]
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, saturating_i32(width), saturating_i32(height))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        (i64::from(self.right) - i64::from(self.left)).max(0) as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        (i64::from(self.bottom) - i64::from(self.top)).max(0) as u32
    }

    /// True when the rectangle encloses no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Intersection of two rectangles, or `None` when they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    #[must_use]
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }

    /// Number of RGBA8 bytes a raster of this rectangle occupies.
    #[must_use]
    pub fn rgba_bytes(&self) -> usize {
        self.width() as usize * self.height() as usize * 4
    }

    #[must_use]
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.right),
            f64::from(self.bottom),
        )
    }

    /// Smallest pixel rectangle containing `rect` (floor the min edges, ceil the max edges).
    #[must_use]
    pub fn enclosing(rect: Rect) -> Self {
        Self::new(
            float_to_i32(rect.x0.floor()),
            float_to_i32(rect.y0.floor()),
            float_to_i32(rect.x1.ceil()),
            float_to_i32(rect.y1.ceil()),
        )
    }
}

/// Intersection of two float rectangles, `None` when the overlap has no area.
///
/// `kurbo::Rect::intersect` returns a zero-sized rect for disjoint inputs;
/// the draw-rect computation needs to tell "touching" apart from "overlapping".
#[must_use]
pub fn intersect_rect(a: Rect, b: Rect) -> Option<Rect> {
    let r = a.intersect(b);
    if r.width() > 0.0 && r.height() > 0.0 {
        Some(r)
    } else {
        None
    }
}

/// Clamps `value` into the range spanned by `bound1` and `bound2`, whichever order they come in.
#[must_use]
pub fn clamp(value: f64, bound1: f64, bound2: f64) -> f64 {
    let (lo, hi) = if bound2 >= bound1 {
        (bound1, bound2)
    } else {
        (bound2, bound1)
    };
    if value > hi {
        hi
    } else if value < lo {
        lo
    } else {
        value
    }
}

/// Smallest power of two that is `>= n`; `next_pow2(0) == 1`.
#[must_use]
pub fn next_pow2(n: u32) -> u32 {
    n.max(1).checked_next_power_of_two().unwrap_or(1 << 31)
}

/// Largest power of two that is `<= n`; `prev_pow2(0) == 0`.
#[must_use]
pub fn prev_pow2(n: u32) -> u32 {
    if n == 0 { 0 } else { 1 << (31 - n.leading_zeros()) }
}

/// Integer division rounding toward negative infinity.
#[must_use]
pub fn floor_div(a: i32, b: i32) -> i32 {
    a.div_euclid(b) - i32::from(b < 0 && a.rem_euclid(b) != 0)
}

/// Integer division rounding toward positive infinity.
#[must_use]
pub fn ceil_div(a: i32, b: i32) -> i32 {
    -floor_div(-a, b)
}

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn float_to_i32(v: f64) -> i32 {
    if v.is_nan() {
        0
    } else {
        v.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow2_helpers() {
        assert_eq!(next_pow2(0), 1);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(5), 8);
        assert_eq!(next_pow2(64), 64);
        assert_eq!(prev_pow2(0), 0);
        assert_eq!(prev_pow2(1), 1);
        assert_eq!(prev_pow2(5), 4);
        assert_eq!(prev_pow2(1023), 512);
        assert_eq!(prev_pow2(u32::MAX), 1 << 31);
    }

    #[test]
    fn division_rounding() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-8, 2), -4);
        assert_eq!(ceil_div(7, 2), 4);
        assert_eq!(ceil_div(-7, 2), -3);
        assert_eq!(ceil_div(8, 2), 4);
    }

    #[test]
    fn clamp_accepts_bounds_in_either_order() {
        assert_eq!(clamp(5.0, 0.0, 3.0), 3.0);
        assert_eq!(clamp(5.0, 3.0, 0.0), 3.0);
        assert_eq!(clamp(-1.0, -250.0, 0.0), -1.0);
        assert_eq!(clamp(-300.0, 0.0, -250.0), -250.0);
    }

    #[test]
    fn pixel_rect_intersection() {
        let image = PixelRect::from_size(100, 50);
        let clip = PixelRect::new(-10, 20, 40, 80);
        assert_eq!(image.intersect(&clip), Some(PixelRect::new(0, 20, 40, 50)));

        let outside = PixelRect::new(200, 200, 300, 300);
        assert_eq!(image.intersect(&outside), None);
        assert!(PixelRect::EMPTY.is_empty());
        assert_eq!(PixelRect::new(5, 5, 1, 1).width(), 0);
    }

    #[test]
    fn enclosing_rounds_outward() {
        let r = PixelRect::enclosing(Rect::new(0.5, 1.2, 10.1, 19.9));
        assert_eq!(r, PixelRect::new(0, 1, 11, 20));
    }

    #[test]
    fn float_intersection_rejects_touching_rects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        assert!(intersect_rect(a, b).is_none());
        assert_eq!(
            intersect_rect(a, Rect::new(5.0, 5.0, 15.0, 15.0)),
            Some(Rect::new(5.0, 5.0, 10.0, 10.0))
        );
    }
}
