//! Precise source-rect to destination-rect drawing for large images

use std::path::Path;
use std::sync::Arc;

use kurbo::Rect;
use log::{debug, info};
use rayon::prelude::*;

use crate::decoder::{BYTES_PER_PIXEL, ImageSource, Raster};
use crate::geometry::intersect_rect;
use crate::tiles::{TileCache, TileConfig, TileStats};

/// Images with both edges at or below this are decoded whole.
pub const LARGE_IMAGE_THRESHOLD: u32 = 1024;

/// Something rasters can be blitted into.
pub trait DrawTarget {
    /// Draws the `src` region of `raster` (raster pixels, possibly
    /// fractional) scaled into `dst` (target pixels).
    fn draw_raster(&mut self, raster: &Raster, src: Rect, dst: Rect);
}

/// A displayable large image: decoded whole, or served from tiles.
pub enum LargeImage {
    Raster(Arc<Raster>),
    Tiled(TileCache),
}

impl LargeImage {
    /// Picks the representation for `source`.
    ///
    /// Images within `threshold` on both edges are decoded once at full
    /// resolution and the source is closed; larger ones (or small ones whose
    /// full decode fails) are tiled.
    #[must_use]
    pub fn from_source(mut source: ImageSource, threshold: u32, tiles: TileConfig) -> Self {
        let (width, height) = (source.width(), source.height());
        if width <= threshold && height <= threshold {
            if let Some(raster) = source.decode_region(source.full_rect(), 1) {
                source.close();
                info!("Bound {width}x{height} image as a single raster");
                return Self::Raster(Arc::new(raster));
            }
            debug!("Full decode of {width}x{height} failed, falling back to tiles");
        }
        info!("Bound {width}x{height} image as tiles");
        Self::Tiled(TileCache::new(source, tiles))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Raster(raster) => raster.width(),
            Self::Tiled(cache) => cache.width(),
        }
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Raster(raster) => raster.height(),
            Self::Tiled(cache) => cache.height(),
        }
    }

    #[must_use]
    pub fn is_tiled(&self) -> bool {
        matches!(self, Self::Tiled(_))
    }

    /// Draws source pixels `src` into target pixels `dst`.
    ///
    /// `scale` is the layout scale that produced the pair; tiles pick their
    /// sample level from it rather than from the rounded rectangle ratio.
    pub fn draw(&mut self, target: &mut dyn DrawTarget, src: Rect, dst: Rect, scale: f64) {
        if src.is_zero_area() || dst.is_zero_area() {
            return;
        }
        match self {
            Self::Raster(raster) => target.draw_raster(raster, src, dst),
            Self::Tiled(cache) => draw_tiled(cache, target, src, dst, scale),
        }
    }

    /// Drains tile completions. Returns `true` when new pixels arrived.
    pub fn poll(&mut self) -> bool {
        match self {
            Self::Raster(_) => false,
            Self::Tiled(cache) => cache
                .poll_events()
                .iter()
                .fold(false, |redraw, event| redraw | event.needs_redraw()),
        }
    }

    /// True while tile decodes are in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        match self {
            Self::Raster(_) => false,
            Self::Tiled(cache) => !cache.is_idle(),
        }
    }

    #[must_use]
    pub fn tile_stats(&self) -> Option<TileStats> {
        match self {
            Self::Raster(_) => None,
            Self::Tiled(cache) => Some(cache.stats()),
        }
    }

    #[must_use]
    pub fn tile_cache(&mut self) -> Option<&mut TileCache> {
        match self {
            Self::Raster(_) => None,
            Self::Tiled(cache) => Some(cache),
        }
    }
}

fn draw_tiled(
    cache: &mut TileCache,
    target: &mut dyn DrawTarget,
    src: Rect,
    dst: Rect,
    scale: f64,
) {
    let sx = dst.width() / src.width();
    let sy = dst.height() / src.height();

    for piece in cache.resolve(src, scale) {
        let Some(piece_src) = intersect_rect(piece.source_rect.to_rect(), src) else {
            continue;
        };
        let piece_dst = Rect::new(
            dst.x0 + (piece_src.x0 - src.x0) * sx,
            dst.y0 + (piece_src.y0 - src.y0) * sy,
            dst.x0 + (piece_src.x1 - src.x0) * sx,
            dst.y0 + (piece_src.y1 - src.y0) * sy,
        );
        target.draw_raster(&piece.raster, piece.raster_rect(piece_src), piece_dst);
    }
}

/// CPU RGBA8 draw target.
///
/// A target pixel is written when its center falls inside `dst`; it takes
/// the raster pixel under the mapped center (nearest neighbour). Abutting
/// destination rectangles therefore never overlap or leave gaps.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterCanvas {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0, 0, 0, 0])
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let raster = Raster::filled(width, height, rgba);
        Self {
            width,
            height,
            pixels: raster.pixels().to_vec(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.pixels[idx..idx + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
    }

    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        image::save_buffer_with_format(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )
    }
}

impl std::fmt::Debug for RasterCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterCanvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Target pixel indices whose centers fall in `[lo, hi)`, clipped to `len`.
fn covered(lo: f64, hi: f64, len: u32) -> std::ops::Range<u32> {
    let first = (lo - 0.5).ceil().max(0.0);
    let end = (hi - 0.5).ceil().clamp(0.0, f64::from(len));
    if first >= end {
        return 0..0;
    }
    first as u32..end as u32
}

impl DrawTarget for RasterCanvas {
    fn draw_raster(&mut self, raster: &Raster, src: Rect, dst: Rect) {
        if raster.width() == 0 || raster.height() == 0 || dst.is_zero_area() {
            return;
        }

        let cols = covered(dst.x0, dst.x1, self.width);
        let rows = covered(dst.y0, dst.y1, self.height);
        if cols.is_empty() || rows.is_empty() {
            return;
        }

        let kx = src.width() / dst.width();
        let ky = src.height() / dst.height();
        let max_x = f64::from(raster.width() - 1);
        let max_y = f64::from(raster.height() - 1);

        // Source column for each covered target column, shared by every row.
        let source_cols: Vec<usize> = cols
            .clone()
            .map(|x| {
                let center = f64::from(x) + 0.5;
                (src.x0 + (center - dst.x0) * kx).floor().clamp(0.0, max_x) as usize
            })
            .collect();

        let stride = self.width as usize * BYTES_PER_PIXEL;
        let raster_stride = raster.width() as usize * BYTES_PER_PIXEL;
        let source = raster.pixels();
        let first_col = cols.start as usize;

        self.pixels
            .par_chunks_mut(stride)
            .enumerate()
            .skip(rows.start as usize)
            .take(rows.len())
            .for_each(|(y, row)| {
                let center = y as f64 + 0.5;
                let sy = (src.y0 + (center - dst.y0) * ky).floor().clamp(0.0, max_y) as usize;
                let source_row = &source[sy * raster_stride..(sy + 1) * raster_stride];
                for (i, &sx) in source_cols.iter().enumerate() {
                    let out = (first_col + i) * BYTES_PER_PIXEL;
                    let inp = sx * BYTES_PER_PIXEL;
                    row[out..out + BYTES_PER_PIXEL]
                        .copy_from_slice(&source_row[inp..inp + BYTES_PER_PIXEL]);
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Raster {
        let mut pixels = Vec::new();
        for y in 0..2u8 {
            for x in 0..2u8 {
                pixels.extend_from_slice(&[x * 100, y * 100, 0, 255]);
            }
        }
        Raster::from_rgba(2, 2, pixels).expect("2x2")
    }

    #[test]
    fn covered_uses_pixel_centers() {
        assert_eq!(covered(0.0, 10.0, 100), 0..10);
        assert_eq!(covered(9.6, 20.0, 100), 10..20);
        assert_eq!(covered(9.4, 20.4, 100), 9..20);
        assert_eq!(covered(-5.0, 3.0, 2), 0..2);
        assert_eq!(covered(5.0, 5.2, 100), 0..0);
    }

    #[test]
    fn canvas_scales_up_nearest_neighbour() {
        let mut canvas = RasterCanvas::new(4, 4);
        canvas.draw_raster(
            &checker(),
            Rect::new(0.0, 0.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 4.0, 4.0),
        );
        assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([0, 0, 0, 255]));
        assert_eq!(canvas.pixel(2, 1), Some([100, 0, 0, 255]));
        assert_eq!(canvas.pixel(3, 3), Some([100, 100, 0, 255]));
    }

    #[test]
    fn abutting_rects_cover_without_gaps() {
        let mut canvas = RasterCanvas::new(10, 1);
        let red = Raster::filled(1, 1, [255, 0, 0, 255]);
        let blue = Raster::filled(1, 1, [0, 0, 255, 255]);
        let unit = Rect::new(0.0, 0.0, 1.0, 1.0);
        canvas.draw_raster(&red, unit, Rect::new(0.0, 0.0, 3.3, 1.0));
        canvas.draw_raster(&blue, unit, Rect::new(3.3, 0.0, 10.0, 1.0));

        for x in 0..3 {
            assert_eq!(canvas.pixel(x, 0), Some([255, 0, 0, 255]));
        }
        for x in 3..10 {
            assert_eq!(canvas.pixel(x, 0), Some([0, 0, 255, 255]));
        }
    }

    #[test]
    fn raster_image_draws_directly() {
        let mut image = LargeImage::Raster(Arc::new(checker()));
        let mut canvas = RasterCanvas::new(2, 2);
        image.draw(
            &mut canvas,
            Rect::new(1.0, 0.0, 2.0, 2.0),
            Rect::new(0.0, 0.0, 2.0, 2.0),
            2.0,
        );
        assert_eq!(canvas.pixel(0, 0), Some([100, 0, 0, 255]));
        assert_eq!(canvas.pixel(1, 1), Some([100, 100, 0, 255]));
        assert!(!image.poll());
        assert!(!image.is_loading());
    }
}
