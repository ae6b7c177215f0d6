//! Decoded RGBA8 pixel buffers

use std::num::NonZeroU32;

use fast_image_resize as fr;
use image::RgbaImage;

use super::DecodeFault;
use crate::geometry::PixelRect;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// An immutable RGBA8 raster.
///
/// Rasters are independent copies of decoded pixels: they stay valid after
/// the [`ImageSource`](super::ImageSource) that produced them is closed.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Wraps an RGBA8 buffer. Returns `None` when the buffer length does not
    /// match `width * height * 4`.
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    /// A raster filled with one color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * BYTES_PER_PIXEL)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory held by the pixel buffer.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    /// RGBA value at `(x, y)`, or `None` outside the raster.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = &self.pixels[idx..idx + BYTES_PER_PIXEL];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Copies the pixels covered by `rect` (clamped to the raster) into a new raster.
    #[must_use]
    pub fn crop(&self, rect: PixelRect) -> Option<Self> {
        let bounds = PixelRect::from_size(self.width, self.height);
        let rect = bounds.intersect(&rect)?;
        let row_bytes = rect.width() as usize * BYTES_PER_PIXEL;
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * rect.height() as usize);
        for y in rect.top..rect.bottom {
            let start = y as usize * stride + rect.left as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.pixels[start..start + row_bytes]);
        }
        Some(Self {
            width: rect.width(),
            height: rect.height(),
            pixels: out,
        })
    }

    /// Resizes to exactly `width x height` with a box-filter convolution.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self, DecodeFault> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        let src_width = NonZeroU32::new(self.width).ok_or(DecodeFault::EmptyRegion)?;
        let src_height = NonZeroU32::new(self.height).ok_or(DecodeFault::EmptyRegion)?;
        let dst_width = NonZeroU32::new(width).ok_or(DecodeFault::EmptyRegion)?;
        let dst_height = NonZeroU32::new(height).ok_or(DecodeFault::EmptyRegion)?;

        let src = fr::Image::from_vec_u8(
            src_width,
            src_height,
            self.pixels.clone(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| DecodeFault::resize(e.to_string()))?;
        let mut dst = fr::Image::new(dst_width, dst_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new(fr::ResizeAlg::Convolution(fr::FilterType::Box));
        resizer
            .resize(&src.view(), &mut dst.view_mut())
            .map_err(|e| DecodeFault::resize(e.to_string()))?;

        Ok(Self {
            width,
            height,
            pixels: dst.into_vec(),
        })
    }

    /// Downsamples by an integer factor, rounding the output size up so that
    /// a partial trailing block still produces a pixel.
    pub fn downsampled(&self, sample: u32) -> Result<Self, DecodeFault> {
        let sample = sample.max(1);
        if sample == 1 {
            return Ok(self.clone());
        }
        self.resized(
            sampled_extent(self.width, sample),
            sampled_extent(self.height, sample),
        )
    }
}

/// Size of `extent` source pixels after downsampling by `sample`.
#[must_use]
pub fn sampled_extent(extent: u32, sample: u32) -> u32 {
    extent.div_ceil(sample.max(1))
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> Raster {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        Raster::from_rgba(width, height, pixels).expect("buffer matches size")
    }

    #[test]
    fn from_rgba_rejects_wrong_length() {
        assert!(Raster::from_rgba(2, 2, vec![0; 15]).is_none());
        assert!(Raster::from_rgba(2, 2, vec![0; 16]).is_some());
    }

    #[test]
    fn crop_copies_the_requested_pixels() {
        let raster = numbered(8, 8);
        let cropped = raster.crop(PixelRect::new(2, 3, 5, 7)).expect("overlaps");
        assert_eq!((cropped.width(), cropped.height()), (3, 4));
        assert_eq!(cropped.pixel(0, 0), Some([2, 3, 0, 255]));
        assert_eq!(cropped.pixel(2, 3), Some([4, 6, 0, 255]));
    }

    #[test]
    fn crop_clamps_and_rejects_disjoint() {
        let raster = numbered(4, 4);
        let cropped = raster.crop(PixelRect::new(-2, -2, 2, 2)).expect("overlaps");
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert!(raster.crop(PixelRect::new(10, 10, 12, 12)).is_none());
    }

    #[test]
    fn downsample_rounds_size_up() {
        let raster = Raster::filled(10, 7, [200, 100, 50, 255]);
        let small = raster.downsampled(4).expect("resize works");
        assert_eq!((small.width(), small.height()), (3, 2));
        let px = small.pixel(1, 1).expect("inside");
        for (got, want) in px.iter().zip([200u8, 100, 50, 255]) {
            assert!(got.abs_diff(want) <= 1, "channel {got} vs {want}");
        }
    }

    #[test]
    fn sampled_extent_never_zero_for_nonempty() {
        assert_eq!(sampled_extent(1, 16), 1);
        assert_eq!(sampled_extent(512, 4), 128);
        assert_eq!(sampled_extent(513, 4), 129);
    }
}
