//! Pan and zoom state: scale levels, anchor layout, clamping and the
//! source/destination mapping used for each draw

mod transform;
mod types;

pub use transform::{UNBOUNDED, ViewportTransform};
pub use types::{Anchor, DrawRects, ScaleLimits, ScaleType, ViewportDebugInfo};
