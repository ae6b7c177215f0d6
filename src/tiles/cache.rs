//! Byte-bounded LRU store of decoded tiles

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use lru::LruCache;

use super::grid::{Cell, CellRange};
use super::request::TileKey;
use crate::decoder::Raster;
use crate::geometry::PixelRect;

/// A decoded raster for one cell at one sample level. Immutable.
#[derive(Debug)]
pub struct Tile {
    key: TileKey,
    rect: PixelRect,
    raster: Arc<Raster>,
}

impl Tile {
    #[must_use]
    pub fn new(key: TileKey, rect: PixelRect, raster: Raster) -> Self {
        Self {
            key,
            rect,
            raster: Arc::new(raster),
        }
    }

    #[must_use]
    pub fn key(&self) -> TileKey {
        self.key
    }

    /// Source pixels this tile covers.
    #[must_use]
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    #[must_use]
    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }

    #[must_use]
    pub fn sample(&self) -> u32 {
        self.key.sample
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.raster.byte_len()
    }
}

/// Cells around the last requested rectangle, at the level it wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetainWindow {
    pub cells: CellRange,
    pub sample: u32,
}

impl RetainWindow {
    #[must_use]
    pub fn keeps(&self, key: &TileKey) -> bool {
        key.sample == self.sample && self.cells.contains(key.cell)
    }
}

/// Tile storage bounded by resident raster bytes rather than entry count
pub struct TileStore {
    tiles: LruCache<TileKey, Arc<Tile>>,
    levels: HashMap<Cell, Vec<u32>>,
    resident_bytes: usize,
    byte_ceiling: usize,
}

impl TileStore {
    #[must_use]
    pub fn new(byte_ceiling: usize) -> Self {
        Self {
            tiles: LruCache::unbounded(),
            levels: HashMap::new(),
            resident_bytes: 0,
            byte_ceiling,
        }
    }

    /// Get a tile, promoting it in the LRU order
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<Tile>> {
        self.tiles.get(key).map(Arc::clone)
    }

    /// Check if a key is resident without promoting it
    #[must_use]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains(key)
    }

    /// Sample levels resident for `cell`.
    #[must_use]
    pub fn levels(&self, cell: Cell) -> &[u32] {
        self.levels.get(&cell).map_or(&[][..], Vec::as_slice)
    }

    /// Any resident tile for `cell` other than the `ideal` level, the one
    /// nearest to `ideal` preferred (finer wins ties).
    pub fn placeholder(&mut self, cell: Cell, ideal: u32) -> Option<Arc<Tile>> {
        let ideal_log = ideal.max(1).trailing_zeros() as i32;
        let sample = self
            .levels(cell)
            .iter()
            .copied()
            .filter(|&s| s != ideal)
            .min_by_key(|&s| ((s.trailing_zeros() as i32 - ideal_log).abs(), s))?;
        self.get(&TileKey::new(cell, sample))
    }

    /// Insert a tile, replacing any tile with the same key
    pub fn insert(&mut self, tile: Tile) -> Arc<Tile> {
        let key = tile.key();
        self.remove(&key);

        let tile = Arc::new(tile);
        self.resident_bytes += tile.byte_len();
        self.tiles.put(key, Arc::clone(&tile));
        self.levels.entry(key.cell).or_default().push(key.sample);
        tile
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<Arc<Tile>> {
        let tile = self.tiles.pop(key)?;
        self.resident_bytes -= tile.byte_len();
        if let Some(levels) = self.levels.get_mut(&key.cell) {
            levels.retain(|&s| s != key.sample);
            if levels.is_empty() {
                self.levels.remove(&key.cell);
            }
        }
        Some(tile)
    }

    /// Drop every level of `cell` except `keep`. Returns bytes freed.
    pub fn remove_other_levels(&mut self, cell: Cell, keep: u32) -> usize {
        let stale: Vec<u32> = self
            .levels(cell)
            .iter()
            .copied()
            .filter(|&s| s != keep)
            .collect();

        stale
            .into_iter()
            .filter_map(|sample| self.remove(&TileKey::new(cell, sample)))
            .map(|tile| tile.byte_len())
            .sum()
    }

    /// Evict until resident bytes fit the ceiling.
    ///
    /// Tiles outside `window` (wrong cell or stale level) go first, then the
    /// rest, least recently used first within each group. `pinned` tiles are
    /// never evicted, so the store may stay over budget by their size.
    pub fn enforce_budget(
        &mut self,
        pinned: &HashSet<TileKey>,
        window: Option<&RetainWindow>,
    ) -> usize {
        if self.resident_bytes <= self.byte_ceiling {
            return 0;
        }

        let mut candidates: Vec<(bool, TileKey)> = self
            .tiles
            .iter()
            .rev()
            .filter(|(key, _)| !pinned.contains(*key))
            .map(|(key, _)| (window.is_some_and(|w| w.keeps(key)), *key))
            .collect();
        candidates.sort_by_key(|(kept, _)| *kept);

        let mut freed = 0;
        let mut evicted = 0;
        for (_, key) in candidates {
            if self.resident_bytes <= self.byte_ceiling {
                break;
            }
            if let Some(tile) = self.remove(&key) {
                freed += tile.byte_len();
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                "Evicted {evicted} tiles, freed {freed} bytes, {} of {} bytes resident",
                self.resident_bytes, self.byte_ceiling
            );
        }
        freed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes
    }

    #[must_use]
    pub fn byte_ceiling(&self) -> usize {
        self.byte_ceiling
    }
}
