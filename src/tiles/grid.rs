//! Fixed source-space tile grid and sample-level selection

use crate::geometry::{PixelRect, ceil_div, floor_div, prev_pow2};

/// Smallest tile edge the grid accepts.
pub const MIN_TILE_SIZE: u32 = 64;

/// Default tile edge: a 512x512 RGBA8 tile is 1 MiB at sample 1.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// One grid cell, addressed by row and column from the image origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[must_use]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// Rectangular block of cells, half-open in both directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellRange {
    pub rows: (u32, u32),
    pub cols: (u32, u32),
}

impl CellRange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.0 >= self.rows.1 || self.cols.0 >= self.cols.1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.rows.1 - self.rows.0) as usize * (self.cols.1 - self.cols.0) as usize
    }

    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        (self.rows.0..self.rows.1).contains(&cell.row)
            && (self.cols.0..self.cols.1).contains(&cell.col)
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols;
        (self.rows.0..self.rows.1)
            .flat_map(move |row| (cols.0..cols.1).map(move |col| Cell::new(row, col)))
    }
}

/// Partition of a `width x height` image into square cells of `tile_size`
/// source pixels. The last row and column may be partial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
}

impl TileGrid {
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            width,
            height,
            tile_size: normalize_tile_size(tile_size),
        }
    }

    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    #[must_use]
    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.tile_size)
    }

    #[must_use]
    pub fn cols(&self) -> u32 {
        self.width.div_ceil(self.tile_size)
    }

    #[must_use]
    pub fn image_rect(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }

    /// Source pixels covered by `cell`, clipped to the image.
    #[must_use]
    pub fn cell_rect(&self, cell: Cell) -> PixelRect {
        let size = self.tile_size as i32;
        let left = cell.col as i32 * size;
        let top = cell.row as i32 * size;
        let full = PixelRect::new(left, top, left + size, top + size);
        self.image_rect().intersect(&full).unwrap_or(PixelRect::EMPTY)
    }

    /// Cells overlapping `rect`. Empty when `rect` misses the image.
    #[must_use]
    pub fn cells_covering(&self, rect: PixelRect) -> CellRange {
        let Some(rect) = self.image_rect().intersect(&rect) else {
            return CellRange::default();
        };
        let size = self.tile_size as i32;
        CellRange {
            rows: (
                floor_div(rect.top, size) as u32,
                ceil_div(rect.bottom, size) as u32,
            ),
            cols: (
                floor_div(rect.left, size) as u32,
                ceil_div(rect.right, size) as u32,
            ),
        }
    }

    /// `range` grown by `ring` cells on every side, clipped to the grid.
    #[must_use]
    pub fn expand(&self, range: CellRange, ring: u32) -> CellRange {
        if range.is_empty() {
            return range;
        }
        CellRange {
            rows: (
                range.rows.0.saturating_sub(ring),
                range.rows.1.saturating_add(ring).min(self.rows()),
            ),
            cols: (
                range.cols.0.saturating_sub(ring),
                range.cols.1.saturating_add(ring).min(self.cols()),
            ),
        }
    }
}

/// Rounds down to a power of two, never below [`MIN_TILE_SIZE`].
#[must_use]
pub fn normalize_tile_size(tile_size: u32) -> u32 {
    prev_pow2(tile_size).max(MIN_TILE_SIZE)
}

/// Downsample factor for drawing at `scale` destination pixels per source
/// pixel: the largest power of two not above `1 / scale`, at least 1.
#[must_use]
pub fn sample_level_for(scale: f64) -> u32 {
    if !scale.is_finite() || scale <= 0.0 {
        return 1;
    }
    let inverse = (1.0 / scale).floor();
    if inverse < 1.0 {
        return 1;
    }
    prev_pow2(inverse.min(f64::from(u32::MAX)) as u32).max(1)
}
