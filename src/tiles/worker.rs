//! Tile decode worker - runs in separate thread(s)

use std::sync::{Arc, Mutex};

use flume::{Receiver, Sender};
use log::debug;

use super::request::{DecodeRequest, RequestId, TileEvent, TileKey};
use super::state::TileState;
use crate::decoder::ImageSource;
use crate::geometry::PixelRect;

pub fn decode_worker(
    index: usize,
    source: Arc<Mutex<ImageSource>>,
    state: Arc<Mutex<TileState>>,
    requests: Receiver<DecodeRequest>,
    events: Sender<TileEvent>,
) {
    debug!("Tile worker {index} started");

    for request in requests {
        match request {
            DecodeRequest::Tile { id, key, rect } => {
                let event = handle_tile_request(&source, &state, id, key, rect);
                let _ = events.send(event);
            }

            DecodeRequest::Shutdown => break,
        }
    }

    debug!("Tile worker {index} stopped");
}

fn handle_tile_request(
    source: &Mutex<ImageSource>,
    state: &Mutex<TileState>,
    id: RequestId,
    key: TileKey,
    rect: PixelRect,
) -> TileEvent {
    {
        let mut state = state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.is_current(key.cell, id) {
            return state.skip(id, key);
        }
    }

    // The source lock serializes decodes across workers.
    let raster = source
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .decode_region(rect, key.sample);

    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .complete(id, key, rect, raster)
}
