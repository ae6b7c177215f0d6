pub mod test_helpers {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use crate::decoder::{DecodeFault, Raster, RegionDecoder, sampled_extent};
    use crate::geometry::PixelRect;
    use crate::tiles::TileCache;

    /// Color of source pixel `(x, y)` in a [`GradientDecoder`] image.
    #[must_use]
    pub fn gradient_pixel(x: u32, y: u32) -> [u8; 4] {
        [
            (x % 251) as u8,
            (y % 241) as u8,
            ((x / 251 + y / 241) % 256) as u8,
            255,
        ]
    }

    /// Deterministic region decoder whose pixel values encode their source
    /// coordinates. Downsampling picks the top-left pixel of each block.
    pub struct GradientDecoder {
        width: u32,
        height: u32,
        delay: Duration,
        fail: Arc<AtomicBool>,
        failing_rects: HashSet<PixelRect>,
        decodes: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<(PixelRect, u32)>>>,
        dropped: Arc<AtomicBool>,
    }

    impl GradientDecoder {
        #[must_use]
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                delay: Duration::ZERO,
                fail: Arc::new(AtomicBool::new(false)),
                failing_rects: HashSet::new(),
                decodes: Arc::new(AtomicUsize::new(0)),
                log: Arc::new(Mutex::new(Vec::new())),
                dropped: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Sleep this long inside every decode.
        #[must_use]
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Fail every decode of exactly `rect`.
        #[must_use]
        pub fn failing_on(mut self, rect: PixelRect) -> Self {
            self.failing_rects.insert(rect);
            self
        }

        /// While the flag is set, every decode fails.
        #[must_use]
        pub fn fail_switch(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.fail)
        }

        /// Number of decode calls made so far.
        #[must_use]
        pub fn decode_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.decodes)
        }

        /// Every `(rect, sample)` decoded, in call order.
        #[must_use]
        pub fn decode_log(&self) -> Arc<Mutex<Vec<(PixelRect, u32)>>> {
            Arc::clone(&self.log)
        }

        /// Set once the decoder has been dropped (closed).
        #[must_use]
        pub fn dropped_flag(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.dropped)
        }
    }

    impl RegionDecoder for GradientDecoder {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn decode(&mut self, rect: PixelRect, sample: u32) -> Result<Raster, DecodeFault> {
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.decodes.fetch_add(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((rect, sample));

            if self.fail.load(Ordering::SeqCst) || self.failing_rects.contains(&rect) {
                return Err(DecodeFault::EmptyRegion);
            }

            let sample = sample.max(1);
            let width = sampled_extent(rect.width(), sample);
            let height = sampled_extent(rect.height(), sample);
            if width == 0 || height == 0 {
                return Err(DecodeFault::EmptyRegion);
            }

            let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
            for j in 0..height {
                for i in 0..width {
                    let x = rect.left as u32 + i * sample;
                    let y = rect.top as u32 + j * sample;
                    pixels.extend_from_slice(&gradient_pixel(x, y));
                }
            }
            Raster::from_rgba(width, height, pixels).ok_or(DecodeFault::EmptyRegion)
        }
    }

    impl Drop for GradientDecoder {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// Pumps completion events until nothing is pending or `timeout` passes.
    pub fn wait_until_idle(cache: &mut TileCache, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            cache.poll_events();
            if cache.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            cache.wait_event(Duration::from_millis(10));
        }
    }
}
