//! `RegionDecoder` backed by the `image` crate

use std::io::{Cursor, Read};
use std::path::Path;

use image::RgbaImage;
use log::{debug, warn};

use super::error::{DecodeFault, OpenError};
use super::raster::Raster;
use super::source::{ImageSource, RegionDecoder};
use crate::geometry::PixelRect;

/// Region decoder for the formats the `image` crate reads.
///
/// The `image` crate has no partial decoding for compressed formats, so the
/// codec's pixels are held here, inside the decode handle; everything handed
/// to the rest of the engine is still region-sized and sample-sized. A host
/// with a native region codec implements [`RegionDecoder`] directly instead.
pub struct ImageRegionDecoder {
    pixels: RgbaImage,
}

impl ImageRegionDecoder {
    /// Parses an encoded image held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OpenError> {
        match imagesize::blob_size(bytes) {
            Ok(size) if size.width == 0 || size.height == 0 => {
                return Err(OpenError::InvalidDimensions {
                    width: size.width as u32,
                    height: size.height as u32,
                });
            }
            Ok(size) => debug!("Header reports {}x{}", size.width, size.height),
            Err(e) => debug!("Header probe failed ({e}), letting the codec decide"),
        }

        let pixels = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .decode()?
            .into_rgba8();

        Ok(Self { pixels })
    }

    /// Reads an encoded image from any byte stream.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, OpenError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_path(path: &Path) -> Result<Self, OpenError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Wraps pixels that are already decoded.
    #[must_use]
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

impl RegionDecoder for ImageRegionDecoder {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn decode(&mut self, rect: PixelRect, sample: u32) -> Result<Raster, DecodeFault> {
        let bounds = PixelRect::from_size(self.pixels.width(), self.pixels.height());
        let Some(rect) = bounds.intersect(&rect) else {
            warn!("Region {rect:?} outside {bounds:?}");
            return Err(DecodeFault::OutOfBounds {
                rect,
                width: bounds.width(),
                height: bounds.height(),
            });
        };

        let region = image::imageops::crop_imm(
            &self.pixels,
            rect.left as u32,
            rect.top as u32,
            rect.width(),
            rect.height(),
        )
        .to_image();

        Raster::from_image(region).downsampled(sample)
    }
}

/// Opens an encoded byte stream as an [`ImageSource`].
pub fn open<R: Read>(reader: R, preview_max_dimension: u32) -> Result<ImageSource, OpenError> {
    let decoder = ImageRegionDecoder::from_reader(reader)?;
    ImageSource::open_with_preview_limit(Box::new(decoder), preview_max_dimension)
}

/// Opens an image file as an [`ImageSource`].
pub fn open_path(path: &Path, preview_max_dimension: u32) -> Result<ImageSource, OpenError> {
    let decoder = ImageRegionDecoder::from_path(path)?;
    ImageSource::open_with_preview_limit(Box::new(decoder), preview_max_dimension)
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, Rgba};

    use super::*;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 7, 255])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("png encodes");
        out.into_inner()
    }

    #[test]
    fn opens_png_and_decodes_regions() {
        let bytes = encoded_png(300, 200);
        let mut source = open(Cursor::new(bytes), 128).expect("valid png");
        assert_eq!((source.width(), source.height()), (300, 200));
        assert_eq!(source.preview_sample(), 4);

        let region = source
            .decode_region(PixelRect::new(10, 20, 30, 50), 1)
            .expect("decodes");
        assert_eq!((region.width(), region.height()), (20, 30));
        assert_eq!(region.pixel(0, 0), Some([10, 20, 7, 255]));
        assert_eq!(region.pixel(19, 29), Some([29, 49, 7, 255]));
    }

    #[test]
    fn sampled_region_has_reduced_size() {
        let bytes = encoded_png(256, 256);
        let mut source = open(Cursor::new(bytes), 1024).expect("valid png");
        let region = source
            .decode_region(PixelRect::new(0, 0, 128, 128), 4)
            .expect("decodes");
        assert_eq!((region.width(), region.height()), (32, 32));
    }

    #[test]
    fn garbage_bytes_fail_to_open() {
        let result = open(Cursor::new(b"definitely not an image".to_vec()), 1024);
        assert!(result.is_err());
    }
}
