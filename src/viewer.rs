//! Host-facing viewer: clip, viewport and image composed into one surface

use kurbo::{Point, Rect, Size, Vec2};
use log::{debug, info};

use crate::clip::ClipTransform;
use crate::decoder::ImageSource;
use crate::drawable::{DrawTarget, LARGE_IMAGE_THRESHOLD, LargeImage};
use crate::geometry::PixelRect;
use crate::tiles::{TileConfig, TileStats};
use crate::viewport::{Anchor, ScaleLimits, ScaleType, ViewportTransform};

/// Everything a viewer instance is configured with
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerConfig {
    pub tiles: TileConfig,
    pub large_image_threshold: u32,
    pub limits: ScaleLimits,
    pub scale_type: ScaleType,
    pub anchor: Anchor,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tiles: TileConfig::default(),
            large_image_threshold: LARGE_IMAGE_THRESHOLD,
            limits: ScaleLimits::default(),
            scale_type: ScaleType::default(),
            anchor: Anchor::default(),
        }
    }
}

/// Commands that modify viewer state
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Destination rectangle in view coordinates
    SetBounds(Rect),
    /// Part of the view that may be drawn into
    SetVisibleRect(Rect),
    SetScale(f64),
    SetScaleType(ScaleType),
    SetAnchor(Anchor),
    SetClipRect(PixelRect),
    SetClipPercent(Rect),
    ClearClip,
}

/// What changed as a result of a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Displayed content size changed; scale and offset were laid out again
    Relayout,
    /// The host should redraw
    Invalidate,
}

pub struct ImageViewer {
    config: ViewerConfig,
    viewport: ViewportTransform,
    clip: ClipTransform,
    image: Option<LargeImage>,
}

impl Default for ImageViewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl ImageViewer {
    #[must_use]
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            viewport: ViewportTransform::with_policy(
                config.limits,
                config.scale_type,
                config.anchor,
            ),
            clip: ClipTransform::new(),
            image: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[must_use]
    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    #[must_use]
    pub fn clip(&self) -> &ClipTransform {
        &self.clip
    }

    #[must_use]
    pub fn image(&self) -> Option<&LargeImage> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.image.is_some()
    }

    /// Displays `source`, replacing (and shutting down) any bound image.
    pub fn bind(&mut self, source: ImageSource) -> Vec<Effect> {
        self.unbind();

        let image = LargeImage::from_source(
            source,
            self.config.large_image_threshold,
            self.config.tiles,
        );
        info!(
            "Bound {}x{} image ({})",
            image.width(),
            image.height(),
            if image.is_tiled() { "tiled" } else { "raster" }
        );
        self.clip.set_source_size(Some((image.width(), image.height())));
        self.image = Some(image);
        self.sync_content_size();

        vec![Effect::Relayout, Effect::Invalidate]
    }

    /// Drops the bound image, stopping its workers and closing its source.
    pub fn unbind(&mut self) -> Vec<Effect> {
        let Some(image) = self.image.take() else {
            return vec![];
        };
        info!("Unbinding {}x{} image", image.width(), image.height());
        drop(image);

        self.clip.set_source_size(None);
        self.sync_content_size();
        vec![Effect::Relayout, Effect::Invalidate]
    }

    /// Apply a command and return resulting effects
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        let effects = match cmd {
            Command::SetBounds(bounds) => {
                if self.viewport.bounds() == bounds {
                    vec![]
                } else {
                    self.viewport.set_bounds(bounds);
                    vec![Effect::Invalidate]
                }
            }

            Command::SetVisibleRect(rect) => {
                self.viewport.set_visible_rect(rect);
                vec![Effect::Invalidate]
            }

            Command::SetScale(scale) => {
                self.viewport.set_scale(scale);
                vec![Effect::Invalidate]
            }

            Command::SetScaleType(scale_type) => {
                self.viewport.set_scale_type(scale_type);
                vec![Effect::Invalidate]
            }

            Command::SetAnchor(anchor) => {
                self.viewport.set_anchor(anchor);
                vec![Effect::Invalidate]
            }

            Command::SetClipRect(rect) => clip_effects(self.clip.set_clip_rect(rect)),

            Command::SetClipPercent(percent) => {
                clip_effects(self.clip.set_clip_percent(percent))
            }

            Command::ClearClip => clip_effects(self.clip.clear_clip()),
        };

        if effects.contains(&Effect::Relayout) {
            self.sync_content_size();
        }
        effects
    }

    fn sync_content_size(&mut self) {
        let (width, height) = self.clip.intrinsic_size();
        debug!("Content size now {width}x{height}");
        self.viewport
            .set_content_size(Size::new(f64::from(width), f64::from(height)));
    }

    /// Scroll gesture. Returns the delta rejected by clamping.
    pub fn scroll(&mut self, dx: f64, dy: f64) -> Vec2 {
        self.viewport.scroll(dx, dy)
    }

    /// Pinch gesture. Returns the factor rejected by clamping.
    pub fn scale_at(&mut self, focal: Point, factor: f64) -> f64 {
        self.viewport.scale_at(focal, factor)
    }

    /// Zooms to the next scale level about the view center.
    pub fn zoom_to_next_level(&mut self) -> f64 {
        let current = self.viewport.scale();
        let next = self.viewport.next_scale_level();
        if current > 0.0 {
            let center = self.viewport.bounds().center();
            self.viewport.scale_at(center, next / current);
        }
        self.viewport.scale()
    }

    /// Draws the current frame. Returns `false` when nothing was drawn.
    pub fn draw(&mut self, target: &mut dyn DrawTarget) -> bool {
        let Some(image) = self.image.as_mut() else {
            return false;
        };
        let Some(rects) = self.viewport.draw_rects() else {
            return false;
        };
        let Some(src) = self.clip.map_source_rect(rects.src) else {
            return false;
        };
        image.draw(target, src, rects.dst, self.viewport.scale());
        true
    }

    /// Drains decode completions. Returns `true` when a redraw would show more detail.
    pub fn poll(&mut self) -> bool {
        self.image.as_mut().is_some_and(LargeImage::poll)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.image.as_ref().is_some_and(LargeImage::is_loading)
    }

    #[must_use]
    pub fn tile_stats(&self) -> Option<TileStats> {
        self.image.as_ref().and_then(LargeImage::tile_stats)
    }
}

fn clip_effects(changed: bool) -> Vec<Effect> {
    if changed {
        vec![Effect::Relayout, Effect::Invalidate]
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::RasterCanvas;
    use crate::test_utils::test_helpers::{GradientDecoder, gradient_pixel};

    fn source(width: u32, height: u32) -> ImageSource {
        ImageSource::open(Box::new(GradientDecoder::new(width, height))).expect("opens")
    }

    #[test]
    fn small_images_bind_as_raster() {
        let mut viewer = ImageViewer::default();
        viewer.bind(source(640, 480));
        assert!(!viewer.image().expect("bound").is_tiled());
        assert!(viewer.tile_stats().is_none());

        viewer.bind(source(4000, 3000));
        assert!(viewer.image().expect("bound").is_tiled());
    }

    #[test]
    fn clip_change_relayouts_viewport() {
        let mut viewer = ImageViewer::default();
        viewer.apply(Command::SetBounds(Rect::new(0.0, 0.0, 400.0, 300.0)));
        viewer.bind(source(800, 600));
        assert_eq!(viewer.viewport().scale(), 0.5);

        let effects = viewer.apply(Command::SetClipRect(PixelRect::new(0, 0, 200, 150)));
        assert_eq!(effects, vec![Effect::Relayout, Effect::Invalidate]);
        assert_eq!(viewer.viewport().content_size(), Size::new(200.0, 150.0));
        assert_eq!(viewer.viewport().scale(), 2.0);

        assert!(viewer
            .apply(Command::SetClipRect(PixelRect::new(0, 0, 200, 150)))
            .is_empty());
    }

    #[test]
    fn clipped_raster_draws_clip_origin_at_view_origin() {
        let mut viewer = ImageViewer::default();
        viewer.apply(Command::SetBounds(Rect::new(0.0, 0.0, 100.0, 100.0)));
        viewer.bind(source(640, 480));
        viewer.apply(Command::SetClipRect(PixelRect::new(300, 200, 400, 300)));
        viewer.apply(Command::SetScaleType(ScaleType::Origin));

        let mut canvas = RasterCanvas::new(100, 100);
        assert!(viewer.draw(&mut canvas));
        assert_eq!(canvas.pixel(0, 0), Some(gradient_pixel(300, 200)));
        assert_eq!(canvas.pixel(99, 99), Some(gradient_pixel(399, 299)));
    }

    #[test]
    fn empty_clip_draws_nothing() {
        let mut viewer = ImageViewer::default();
        viewer.apply(Command::SetBounds(Rect::new(0.0, 0.0, 100.0, 100.0)));
        viewer.bind(source(640, 480));
        viewer.apply(Command::SetClipRect(PixelRect::new(700, 0, 800, 10)));

        let mut canvas = RasterCanvas::new(100, 100);
        assert!(!viewer.draw(&mut canvas));
        assert_eq!(canvas.pixel(50, 50), Some([0, 0, 0, 0]));
    }

    #[test]
    fn unbind_resets_layout() {
        let mut viewer = ImageViewer::default();
        viewer.apply(Command::SetBounds(Rect::new(0.0, 0.0, 100.0, 100.0)));
        viewer.bind(source(2000, 2000));
        assert!(viewer.viewport().scale() > 0.0);

        assert_eq!(viewer.unbind(), vec![Effect::Relayout, Effect::Invalidate]);
        assert!(!viewer.is_bound());
        assert_eq!(viewer.viewport().scale(), 0.0);
        assert!(viewer.unbind().is_empty());
    }

    #[test]
    fn next_level_zooms_about_center() {
        let mut viewer = ImageViewer::default();
        viewer.apply(Command::SetBounds(Rect::new(0.0, 0.0, 1000.0, 750.0)));
        viewer.bind(source(4000, 3000));
        assert_eq!(viewer.viewport().scale(), 0.25);
        assert_eq!(viewer.zoom_to_next_level(), 1.0);
        assert_eq!(viewer.zoom_to_next_level(), 3.0);
        assert_eq!(viewer.zoom_to_next_level(), 0.25);
    }
}
