//! Failure types for opening a source and decoding its regions

use crate::geometry::PixelRect;

/// Binding an image source failed. Nothing can be displayed.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("reading image source: {0}")]
    Io(#[from] std::io::Error),

    #[error("image codec: {0}")]
    Format(#[from] image::ImageError),

    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("could not generate preview at sample {sample}")]
    Preview { sample: u32 },
}

/// A single region decode failed. Never fatal: the tile cache treats it as
/// "tile not available" and keeps serving coarser data.
#[derive(Debug, thiserror::Error)]
pub enum DecodeFault {
    #[error("image source is closed")]
    Closed,

    #[error("region is empty after clamping")]
    EmptyRegion,

    #[error("region {rect:?} lies outside a {width}x{height} image")]
    OutOfBounds {
        rect: PixelRect,
        width: u32,
        height: u32,
    },

    #[error("image codec: {0}")]
    Image(#[from] image::ImageError),

    #[error("resize: {detail}")]
    Resize { detail: String },
}

impl DecodeFault {
    pub fn resize(msg: impl Into<String>) -> Self {
        Self::Resize { detail: msg.into() }
    }
}
