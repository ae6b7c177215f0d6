//! Tile cache service - owns the worker pool and the shared tile map

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};
use kurbo::Rect;
use log::{debug, info, warn};

use super::TileConfig;
use super::cache::{RetainWindow, Tile};
use super::grid::{Cell, TileGrid, sample_level_for};
use super::request::{DecodeRequest, RequestId, TileEvent, TileKey};
use super::state::TileState;
use super::worker::decode_worker;
use crate::decoder::{ImageSource, Raster};
use crate::geometry::PixelRect;

/// Where a piece's pixels came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PieceKind {
    /// Tile at the level the current scale asks for
    Ideal,
    /// Resident tile at another level, shown until the ideal one lands
    Placeholder,
    /// Region of the always-resident preview
    Preview,
}

/// The best available pixels for one grid cell.
///
/// `raster` pixel `(0, 0)` sits at source `origin`; one raster pixel spans
/// `sample` source pixels. For preview pieces the raster is the whole preview.
#[derive(Clone, Debug)]
pub struct TilePiece {
    pub cell: Cell,
    pub source_rect: PixelRect,
    pub raster: Arc<Raster>,
    pub origin: (i32, i32),
    pub sample: u32,
    pub kind: PieceKind,
}

impl TilePiece {
    fn from_tile(tile: &Tile, kind: PieceKind) -> Self {
        let rect = tile.rect();
        Self {
            cell: tile.key().cell,
            source_rect: rect,
            raster: Arc::clone(tile.raster()),
            origin: (rect.left, rect.top),
            sample: tile.sample(),
            kind,
        }
    }

    /// Maps `source` (source pixel space) into this piece's raster pixels.
    #[must_use]
    pub fn raster_rect(&self, source: Rect) -> Rect {
        let s = f64::from(self.sample.max(1));
        let (ox, oy) = (f64::from(self.origin.0), f64::from(self.origin.1));
        Rect::new(
            (source.x0 - ox) / s,
            (source.y0 - oy) / s,
            (source.x1 - ox) / s,
            (source.y1 - oy) / s,
        )
    }
}

/// Snapshot of cache occupancy and traffic
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    pub resident_bytes: usize,
    pub byte_ceiling: usize,
    pub tiles: usize,
    pub pending: usize,
    pub completed: u64,
    pub discarded: u64,
    pub failed: u64,
}

impl std::fmt::Display for TileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tiles {} ({} / {} KiB), pending {}, completed {}, discarded {}, failed {}",
            self.tiles,
            self.resident_bytes / 1024,
            self.byte_ceiling / 1024,
            self.pending,
            self.completed,
            self.discarded,
            self.failed
        )
    }
}

/// Serves the best available raster for any source rectangle of a large
/// image, decoding missing tiles on worker threads.
pub struct TileCache {
    grid: TileGrid,
    config: TileConfig,
    preview: Arc<Raster>,
    preview_sample: u32,
    source: Arc<Mutex<ImageSource>>,
    state: Arc<Mutex<TileState>>,
    request_tx: Sender<DecodeRequest>,
    event_rx: Receiver<TileEvent>,
    workers: Vec<JoinHandle<()>>,
    next_request_id: u64,
}

impl TileCache {
    /// Takes ownership of `source` and starts the decode workers.
    #[must_use]
    pub fn new(source: ImageSource, config: TileConfig) -> Self {
        let grid = TileGrid::new(source.width(), source.height(), config.tile_size);
        let preview = source.preview();
        let preview_sample = source.preview_sample();

        let source = Arc::new(Mutex::new(source));
        let state = Arc::new(Mutex::new(TileState::new(config.cache_bytes)));

        // MPMC: every worker pulls from the same request queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let workers = (0..config.workers.max(1))
            .map(|index| {
                let source = Arc::clone(&source);
                let state = Arc::clone(&state);
                let rx = request_rx.clone();
                let tx = event_tx.clone();
                std::thread::spawn(move || decode_worker(index, source, state, rx, tx))
            })
            .collect();

        info!(
            "Tile cache: {}x{} cells of {}px, {} bytes budget, {} workers",
            grid.cols(),
            grid.rows(),
            grid.tile_size(),
            config.cache_bytes,
            config.workers.max(1)
        );

        Self {
            grid,
            config,
            preview,
            preview_sample,
            source,
            state,
            request_tx,
            event_rx,
            workers,
            next_request_id: 1,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.grid.image_rect().width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.grid.image_rect().height()
    }

    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    #[must_use]
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    #[must_use]
    pub fn preview(&self) -> &Arc<Raster> {
        &self.preview
    }

    /// Resolves `rect` (source pixels) at `scale` into one piece per cell.
    ///
    /// Never waits on a decode. Each cell gets its ideal-level tile when
    /// resident, else the nearest resident level, else the preview. Cells
    /// lacking the ideal tile get a decode queued unless an equal or finer
    /// one is already pending. Decodes still pending for cells outside the
    /// retained window are cancelled. Tiles served here are pinned against
    /// eviction until the next call.
    pub fn resolve(&mut self, rect: Rect, scale: f64) -> Vec<TilePiece> {
        let Some(pixels) = self
            .grid
            .image_rect()
            .intersect(&PixelRect::enclosing(rect))
        else {
            return Vec::new();
        };

        let sample = sample_level_for(scale);
        let needed = self.grid.cells_covering(pixels);
        let window = RetainWindow {
            cells: self.grid.expand(needed, self.config.retain_ring),
            sample,
        };

        let mut pieces = Vec::with_capacity(needed.len());
        let mut requests = Vec::new();
        {
            let mut guard = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let state = &mut *guard;
            state.install_window(window);
            state.pinned.clear();

            for cell in needed.iter() {
                let key = TileKey::new(cell, sample);
                if let Some(tile) = state.store.get(&key) {
                    state.pinned.insert(key);
                    pieces.push(TilePiece::from_tile(&tile, PieceKind::Ideal));
                    continue;
                }

                if let Some(tile) = state.store.placeholder(cell, sample) {
                    state.pinned.insert(tile.key());
                    pieces.push(TilePiece::from_tile(&tile, PieceKind::Placeholder));
                } else {
                    pieces.push(TilePiece {
                        cell,
                        source_rect: self.grid.cell_rect(cell),
                        raster: Arc::clone(&self.preview),
                        origin: (0, 0),
                        sample: self.preview_sample,
                        kind: PieceKind::Preview,
                    });
                }

                if state.wants_decode(cell, sample) {
                    let id = RequestId::new(self.next_request_id);
                    self.next_request_id += 1;
                    state.begin(id, key);
                    requests.push(DecodeRequest::Tile {
                        id,
                        key,
                        rect: self.grid.cell_rect(cell),
                    });
                }
            }
        }

        if !requests.is_empty() {
            debug!("Queued {} tile decodes at sample {sample}", requests.len());
        }
        for request in requests {
            let _ = self.request_tx.send(request);
        }

        pieces
    }

    /// Drains completion events without blocking
    pub fn poll_events(&mut self) -> Vec<TileEvent> {
        let mut events = vec![];
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Waits up to `timeout` for the next completion event
    pub fn wait_event(&self, timeout: Duration) -> Option<TileEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    #[must_use]
    pub fn stats(&self) -> TileStats {
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        TileStats {
            resident_bytes: state.store.resident_bytes(),
            byte_ceiling: state.store.byte_ceiling(),
            tiles: state.store.len(),
            pending: state.pending.len(),
            completed: state.completed,
            discarded: state.discarded,
            failed: state.failures,
        }
    }

    /// True when no decode is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pending
            .is_empty()
    }

    /// Forget failed decodes so the next resolve asks for them again
    pub fn retry_failed(&mut self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.failed.is_empty() {
            debug!("Retrying {} failed tiles", state.failed.len());
            state.failed.clear();
        }
    }

    /// Stops the workers and releases the image source.
    ///
    /// Queued requests are dropped, in-flight decodes finish first. Safe to
    /// call more than once; the source is closed exactly once.
    pub fn shutdown(&mut self) {
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.closing = true;
            state.pending.clear();
        }

        for _ in 0..self.workers.len() {
            let _ = self.request_tx.send(DecodeRequest::Shutdown);
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Tile worker panicked");
            }
        }

        let closed = self
            .source
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .close();
        if closed {
            info!("Tile cache shut down");
        }
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
