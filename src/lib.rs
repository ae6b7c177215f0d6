// Export modules for use in tests
pub mod clip;
pub mod decoder;
pub mod drawable;
pub mod geometry;
pub mod panic_handler;
pub mod settings;
pub mod tiles;
pub mod viewer;
pub mod viewport;

pub mod test_utils;

// Re-export the host-facing surface
pub use clip::{ClipMode, ClipTransform};
pub use decoder::{ImageSource, OpenError, Raster, RegionDecoder};
pub use drawable::{DrawTarget, LargeImage, RasterCanvas};
pub use geometry::PixelRect;
pub use settings::Settings;
pub use tiles::{TileCache, TileConfig};
pub use viewer::{Command, Effect, ImageViewer, ViewerConfig};
pub use viewport::{Anchor, ScaleLimits, ScaleType, ViewportTransform};
