//! Decode request and completion event types

use crate::geometry::PixelRect;

use super::grid::Cell;

/// Unique identifier for decode requests; issued in increasing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Identity of a resident tile: a grid cell at one sample level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub cell: Cell,
    pub sample: u32,
}

impl TileKey {
    #[must_use]
    pub const fn new(cell: Cell, sample: u32) -> Self {
        Self { cell, sample }
    }
}

/// Request sent to decode workers
#[derive(Debug)]
pub enum DecodeRequest {
    /// Decode the source pixels `rect` of `key.cell` at `key.sample`
    Tile {
        id: RequestId,
        key: TileKey,
        rect: PixelRect,
    },

    /// Shutdown the worker
    Shutdown,
}

/// The in-flight decode for a cell. At most one per cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingDecode {
    pub id: RequestId,
    pub sample: u32,
}

/// Completion notice delivered to the cache owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileEvent {
    /// A tile was decoded and is now resident
    Ready { id: RequestId, key: TileKey },

    /// The decode failed; the cell keeps showing coarser data
    Failed { id: RequestId, key: TileKey },

    /// The request was superseded or cancelled; its result (if any) was dropped
    Discarded { id: RequestId, key: TileKey },
}

impl TileEvent {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Ready { id, .. } | Self::Failed { id, .. } | Self::Discarded { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn key(&self) -> TileKey {
        match self {
            Self::Ready { key, .. } | Self::Failed { key, .. } | Self::Discarded { key, .. } => {
                *key
            }
        }
    }

    /// Whether the owner has new pixels to draw.
    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}
