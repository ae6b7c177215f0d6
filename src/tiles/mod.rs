//! Tile grid, level-of-detail selection and the byte-bounded tile cache

mod cache;
mod grid;
mod request;
mod service;
mod state;
mod worker;

pub use cache::{RetainWindow, Tile, TileStore};
pub use grid::{
    Cell, CellRange, DEFAULT_TILE_SIZE, MIN_TILE_SIZE, TileGrid, normalize_tile_size,
    sample_level_for,
};
pub use request::{DecodeRequest, PendingDecode, RequestId, TileEvent, TileKey};
pub use service::{PieceKind, TileCache, TilePiece, TileStats};
pub use state::TileState;

/// Default resident tile budget
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default number of decode threads
pub const DEFAULT_WORKERS: usize = 2;

/// Extra ring of cells kept around the requested rectangle
pub const DEFAULT_RETAIN_RING: u32 = 1;

/// Per-cache tuning
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileConfig {
    /// Cell edge in source pixels; rounded down to a power of two
    pub tile_size: u32,
    /// Ceiling on resident tile bytes
    pub cache_bytes: usize,
    pub workers: usize,
    pub retain_ring: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            cache_bytes: DEFAULT_CACHE_BYTES,
            workers: DEFAULT_WORKERS,
            retain_ring: DEFAULT_RETAIN_RING,
        }
    }
}
