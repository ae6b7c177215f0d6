//! Region decoding: open a large image once, keep a small preview resident,
//! decode arbitrary rectangles on demand

mod error;
mod image_decoder;
mod raster;
mod source;

pub use error::{DecodeFault, OpenError};
pub use image_decoder::{ImageRegionDecoder, open, open_path};
pub use raster::{BYTES_PER_PIXEL, Raster, sampled_extent};
pub use source::{DEFAULT_PREVIEW_MAX_DIMENSION, ImageSource, RegionDecoder, preview_sample_for};
