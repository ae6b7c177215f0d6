//! The region-decode contract and the image source that wraps it

use std::sync::Arc;

use log::{debug, error, info, warn};

use super::error::{DecodeFault, OpenError};
use super::raster::Raster;
use crate::geometry::{PixelRect, next_pow2};

/// Default bound on the preview raster's larger edge.
pub const DEFAULT_PREVIEW_MAX_DIMENSION: u32 = 1024;

/// A codec that can decode an arbitrary rectangle of an image at a
/// power-of-two downsample factor.
///
/// Implementations own the native decode handle; dropping the decoder
/// releases it. Calls are never made concurrently for one decoder.
pub trait RegionDecoder: Send {
    /// Full image width in pixels.
    fn width(&self) -> u32;

    /// Full image height in pixels.
    fn height(&self) -> u32;

    /// Decodes `rect` (already clamped to the image) downsampled by `sample`.
    fn decode(&mut self, rect: PixelRect, sample: u32) -> Result<Raster, DecodeFault>;
}

/// An opened large image: dimensions, an always-resident preview and the
/// decode capability.
///
/// The decoder is released exactly once, by [`ImageSource::close`] or on drop.
pub struct ImageSource {
    width: u32,
    height: u32,
    preview: Arc<Raster>,
    preview_sample: u32,
    decoder: Option<Box<dyn RegionDecoder>>,
}

impl ImageSource {
    /// Opens a source with the default preview size limit.
    pub fn open(decoder: Box<dyn RegionDecoder>) -> Result<Self, OpenError> {
        Self::open_with_preview_limit(decoder, DEFAULT_PREVIEW_MAX_DIMENSION)
    }

    /// Opens a source and eagerly produces its preview raster.
    ///
    /// The preview is the whole image at the smallest power-of-two sample
    /// that brings its larger edge to `preview_max_dimension` or below.
    /// If the preview cannot be decoded the decoder is released and the
    /// open fails.
    pub fn open_with_preview_limit(
        mut decoder: Box<dyn RegionDecoder>,
        preview_max_dimension: u32,
    ) -> Result<Self, OpenError> {
        let width = decoder.width();
        let height = decoder.height();
        if width == 0 || height == 0 {
            error!("Refusing to open image with dimensions {width}x{height}");
            return Err(OpenError::InvalidDimensions { width, height });
        }

        let preview_sample = preview_sample_for(width, height, preview_max_dimension);
        let preview = match decoder.decode(PixelRect::from_size(width, height), preview_sample) {
            Ok(raster) => raster,
            Err(e) => {
                error!("Can't generate preview at sample {preview_sample}: {e}");
                drop(decoder);
                return Err(OpenError::Preview {
                    sample: preview_sample,
                });
            }
        };

        info!(
            "Opened {width}x{height} image, preview {}x{} at sample {preview_sample}",
            preview.width(),
            preview.height()
        );

        Ok(Self {
            width,
            height,
            preview: Arc::new(preview),
            preview_sample,
            decoder: Some(decoder),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[0, width) x [0, height)`
    #[must_use]
    pub fn full_rect(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }

    /// The low-resolution whole-image raster.
    #[must_use]
    pub fn preview(&self) -> Arc<Raster> {
        Arc::clone(&self.preview)
    }

    /// Downsample factor the preview was decoded at.
    #[must_use]
    pub fn preview_sample(&self) -> u32 {
        self.preview_sample
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.decoder.is_none()
    }

    /// Decodes `rect` at `sample`.
    ///
    /// Returns `None` when the region is unavailable right now (empty after
    /// clamping, codec failure, or the source is closed). Failures are logged,
    /// never propagated.
    pub fn decode_region(&mut self, rect: PixelRect, sample: u32) -> Option<Raster> {
        let Some(decoder) = self.decoder.as_mut() else {
            warn!("Decode of {rect:?} requested after close");
            return None;
        };

        let Some(clamped) = PixelRect::from_size(self.width, self.height).intersect(&rect) else {
            debug!("Skipping decode of {rect:?}: empty after clamping");
            return None;
        };

        match decoder.decode(clamped, sample.max(1)) {
            Ok(raster) => Some(raster),
            Err(e) => {
                warn!("Can't decode region {clamped:?} at sample {sample}: {e}");
                None
            }
        }
    }

    /// Releases the decoder. Returns `true` only for the call that released it.
    pub fn close(&mut self) -> bool {
        match self.decoder.take() {
            Some(decoder) => {
                drop(decoder);
                debug!("Closed {}x{} image source", self.width, self.height);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("preview_sample", &self.preview_sample)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Smallest power-of-two sample that fits the larger edge into `max_dimension`.
#[must_use]
pub fn preview_sample_for(width: u32, height: u32, max_dimension: u32) -> u32 {
    let largest = width.max(height);
    let max_dimension = max_dimension.max(1);
    next_pow2(largest.div_ceil(max_dimension))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Flat {
        width: u32,
        height: u32,
        fail_preview: bool,
        drops: Arc<AtomicUsize>,
    }

    impl RegionDecoder for Flat {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn decode(&mut self, rect: PixelRect, sample: u32) -> Result<Raster, DecodeFault> {
            if self.fail_preview && sample > 1 {
                return Err(DecodeFault::EmptyRegion);
            }
            Ok(Raster::filled(
                rect.width().div_ceil(sample),
                rect.height().div_ceil(sample),
                [1, 2, 3, 255],
            ))
        }
    }

    impl Drop for Flat {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flat(width: u32, height: u32, fail_preview: bool) -> (Box<Flat>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let decoder = Box::new(Flat {
            width,
            height,
            fail_preview,
            drops: Arc::clone(&drops),
        });
        (decoder, drops)
    }

    #[test]
    fn preview_sample_is_power_of_two_within_limit() {
        assert_eq!(preview_sample_for(800, 600, 1024), 1);
        assert_eq!(preview_sample_for(4000, 3000, 1024), 4);
        assert_eq!(preview_sample_for(2048, 100, 1024), 2);
        assert_eq!(preview_sample_for(2049, 100, 1024), 4);
    }

    #[test]
    fn open_builds_preview() {
        let (decoder, _) = flat(4000, 3000, false);
        let source = ImageSource::open(decoder).expect("opens");
        assert_eq!(source.preview_sample(), 4);
        assert_eq!(source.preview().width(), 1000);
        assert_eq!(source.preview().height(), 750);
    }

    #[test]
    fn preview_failure_releases_decoder() {
        let (decoder, drops) = flat(4000, 3000, true);
        let result = ImageSource::open(decoder);
        assert!(matches!(result, Err(OpenError::Preview { sample: 4 })));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_dimensions_fail_to_open() {
        let (decoder, _) = flat(0, 10, false);
        assert!(matches!(
            ImageSource::open(decoder),
            Err(OpenError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn close_is_idempotent_and_disables_decoding() {
        let (decoder, drops) = flat(2000, 2000, false);
        let mut source = ImageSource::open(decoder).expect("opens");
        let tile = source
            .decode_region(PixelRect::new(0, 0, 256, 256), 1)
            .expect("decodes while open");

        assert!(source.close());
        assert!(!source.close());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(source.decode_region(PixelRect::new(0, 0, 10, 10), 1).is_none());

        // Rasters produced earlier stay valid.
        assert_eq!(tile.width(), 256);
        assert_eq!(source.preview().width(), 1000);
    }

    #[test]
    fn decode_region_clamps_and_rejects_disjoint() {
        let (decoder, _) = flat(100, 100, false);
        let mut source = ImageSource::open(decoder).expect("opens");
        let raster = source
            .decode_region(PixelRect::new(90, 90, 200, 200), 1)
            .expect("partially inside");
        assert_eq!((raster.width(), raster.height()), (10, 10));
        assert!(source.decode_region(PixelRect::new(200, 200, 300, 300), 1).is_none());
    }
}
