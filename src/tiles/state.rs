//! Tile map shared between the resolving thread and decode workers

use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};

use super::cache::{RetainWindow, Tile, TileStore};
use super::grid::Cell;
use super::request::{PendingDecode, RequestId, TileEvent, TileKey};
use crate::decoder::Raster;
use crate::geometry::PixelRect;

/// Everything guarded by the tile map mutex
pub struct TileState {
    pub(crate) store: TileStore,
    pub(crate) pending: HashMap<Cell, PendingDecode>,
    pub(crate) failed: HashSet<TileKey>,
    pub(crate) pinned: HashSet<TileKey>,
    pub(crate) window: Option<RetainWindow>,
    pub(crate) closing: bool,
    pub(crate) completed: u64,
    pub(crate) discarded: u64,
    pub(crate) failures: u64,
}

impl TileState {
    #[must_use]
    pub fn new(byte_ceiling: usize) -> Self {
        Self {
            store: TileStore::new(byte_ceiling),
            pending: HashMap::new(),
            failed: HashSet::new(),
            pinned: HashSet::new(),
            window: None,
            closing: false,
            completed: 0,
            discarded: 0,
            failures: 0,
        }
    }

    /// Whether `id` is still the live request for `cell`.
    #[must_use]
    pub fn is_current(&self, cell: Cell, id: RequestId) -> bool {
        !self.closing && self.pending.get(&cell).is_some_and(|p| p.id == id)
    }

    /// Whether a new decode at `sample` should be issued for `cell`.
    ///
    /// Skipped when a pending decode is at `sample` or finer, or when this
    /// exact level already failed.
    #[must_use]
    pub fn wants_decode(&self, cell: Cell, sample: u32) -> bool {
        if self.closing || self.failed.contains(&TileKey::new(cell, sample)) {
            return false;
        }
        self.pending.get(&cell).is_none_or(|p| p.sample > sample)
    }

    /// Makes `window` the retained region for the next pass.
    ///
    /// Pending decodes for cells outside it are dropped; workers skip or
    /// discard them when they surface. A change of ideal level forgets
    /// failures at every other level so they are asked for again.
    pub fn install_window(&mut self, window: RetainWindow) {
        let before = self.pending.len();
        self.pending.retain(|cell, _| window.cells.contains(*cell));
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            debug!("Cancelled {cancelled} decodes outside the retained window");
        }

        if self.window.is_some_and(|w| w.sample != window.sample) {
            self.failed.retain(|key| key.sample == window.sample);
        }
        self.window = Some(window);
    }

    /// Registers `id` as the live request for the cell, superseding any
    /// older one. Returns the superseded request.
    pub fn begin(&mut self, id: RequestId, key: TileKey) -> Option<PendingDecode> {
        let superseded = self.pending.insert(
            key.cell,
            PendingDecode {
                id,
                sample: key.sample,
            },
        );
        if let Some(old) = superseded {
            trace!(
                "Request {:?} for {:?} supersedes {:?} at sample {}",
                id, key.cell, old.id, old.sample
            );
        }
        superseded
    }

    /// Marks a request the worker will not run.
    pub fn skip(&mut self, id: RequestId, key: TileKey) -> TileEvent {
        trace!("Dropping request {id:?} for {key:?} before decode");
        self.discarded += 1;
        TileEvent::Discarded { id, key }
    }

    /// Applies a finished decode.
    ///
    /// Results are applied only while `id` is still the cell's live request,
    /// so a late completion can never replace data from a newer request. A
    /// tile at the currently wanted level replaces the cell's other levels.
    pub fn complete(
        &mut self,
        id: RequestId,
        key: TileKey,
        rect: PixelRect,
        raster: Option<Raster>,
    ) -> TileEvent {
        if !self.is_current(key.cell, id) {
            trace!("Discarding stale completion {id:?} for {key:?}");
            self.discarded += 1;
            return TileEvent::Discarded { id, key };
        }
        self.pending.remove(&key.cell);

        let Some(raster) = raster else {
            warn!("Tile {key:?} unavailable, keeping coarser data");
            self.failed.insert(key);
            self.failures += 1;
            return TileEvent::Failed { id, key };
        };

        self.store.insert(Tile::new(key, rect, raster));
        if self.window.is_some_and(|w| w.sample == key.sample) {
            self.store.remove_other_levels(key.cell, key.sample);
        }
        self.store.enforce_budget(&self.pinned, self.window.as_ref());
        self.completed += 1;
        TileEvent::Ready { id, key }
    }
}
