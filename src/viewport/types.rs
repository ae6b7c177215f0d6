//! Viewport policies, limits and snapshots

use std::fmt;
use std::str::FromStr;

use kurbo::{Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// How the initial scale is derived from viewport and content size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// One source pixel per view pixel
    Origin,
    FitWidth,
    FitHeight,
    /// Whole image visible
    #[default]
    Fit,
    /// Explicit scale, clamped to the levels
    Fixed,
}

/// Where content smaller than the viewport starts out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl ScaleType {
    pub const ALL: [Self; 5] = [
        Self::Origin,
        Self::FitWidth,
        Self::FitHeight,
        Self::Fit,
        Self::Fixed,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::FitWidth => "fit_width",
            Self::FitHeight => "fit_height",
            Self::Fit => "fit",
            Self::Fixed => "fixed",
        }
    }
}

impl Anchor {
    pub const ALL: [Self; 5] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
        Self::Center,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
            Self::Center => "center",
        }
    }
}

fn parse_name<T: Copy>(all: &[T], name: fn(T) -> &'static str, input: &str) -> Option<T> {
    let wanted = input.trim().replace('-', "_").to_ascii_lowercase();
    all.iter().copied().find(|v| name(*v) == wanted)
}

impl FromStr for ScaleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(&Self::ALL, Self::name, s).ok_or_else(|| format!("unknown scale type: {s}"))
    }
}

impl FromStr for Anchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(&Self::ALL, Self::name, s).ok_or_else(|| format!("unknown anchor: {s}"))
    }
}

impl fmt::Display for ScaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-viewport scale configuration.
///
/// `base_scale` and `max_scale` join the fit-width and fit-height scales in
/// the level set; `max_scale` is only added while both fit scales are below it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleLimits {
    pub base_scale: f64,
    pub max_scale: f64,
    /// Tolerance when comparing the current scale with a level
    pub level_epsilon: f64,
}

impl ScaleLimits {
    pub const DEFAULT_BASE_SCALE: f64 = 1.0;
    pub const DEFAULT_MAX_SCALE: f64 = 3.0;
    pub const DEFAULT_LEVEL_EPSILON: f64 = 0.01;
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            base_scale: Self::DEFAULT_BASE_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
            level_epsilon: Self::DEFAULT_LEVEL_EPSILON,
        }
    }
}

/// Source rectangle to sample and where it lands in view coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawRects {
    pub src: Rect,
    pub dst: Rect,
}

/// Snapshot of a [`ViewportTransform`](super::ViewportTransform)
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportDebugInfo {
    pub bounds: Rect,
    pub visible_rect: Rect,
    pub content_size: Size,
    pub scale: f64,
    pub offset: Vec2,
    pub min_scale: f64,
    pub max_scale: f64,
    pub scale_levels: Vec<f64>,
    pub scale_type: ScaleType,
    pub anchor: Anchor,
    /// Content rectangle in view coordinates
    pub displayed_rect: Option<Rect>,
}

impl fmt::Display for ViewportDebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scale {:.4} ({}, levels {:?})",
            self.scale, self.scale_type, self.scale_levels
        )?;
        writeln!(f, "offset ({:.2}, {:.2})", self.offset.x, self.offset.y)?;
        write!(
            f,
            "content {}x{} in {}x{} view, anchor {}",
            self.content_size.width,
            self.content_size.height,
            self.bounds.width(),
            self.bounds.height(),
            self.anchor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_parse_from_cli_spelling() {
        assert_eq!("fit-width".parse::<ScaleType>(), Ok(ScaleType::FitWidth));
        assert_eq!("FIT".parse::<ScaleType>(), Ok(ScaleType::Fit));
        assert_eq!("bottom_right".parse::<Anchor>(), Ok(Anchor::BottomRight));
        assert!("middle".parse::<Anchor>().is_err());
    }

    #[test]
    fn policies_round_trip_through_display() {
        for anchor in Anchor::ALL {
            assert_eq!(anchor.to_string().parse::<Anchor>(), Ok(anchor));
        }
        for scale_type in ScaleType::ALL {
            assert_eq!(scale_type.to_string().parse::<ScaleType>(), Ok(scale_type));
        }
    }
}
