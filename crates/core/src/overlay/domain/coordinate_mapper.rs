//! Normalized-to-pixel mapping for raster targets.
//!
//! Shader targets skip this entirely: normalized coordinates are fed to the
//! GPU as-is and transformed by the projection matrix there.

use crate::detection::domain::detection::{Keypoint, RelativeBoundingBox};

/// Inclusive pixel rectangle; every corner lies inside the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left) + 1
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top) + 1
    }
}

/// Maps one normalized coordinate onto `[0, dimension - 1]`.
///
/// 1.0 lands on the last pixel rather than one past it.
pub fn to_pixel(normalized: f32, dimension: u32) -> u32 {
    if dimension == 0 || !normalized.is_finite() {
        return 0;
    }
    let scaled = (normalized * dimension as f32).floor();
    scaled.clamp(0.0, (dimension - 1) as f32) as u32
}

pub fn map_keypoint(kp: &Keypoint, width: u32, height: u32) -> (u32, u32) {
    (to_pixel(kp.x, width), to_pixel(kp.y, height))
}

pub fn map_bounding_box(bbox: &RelativeBoundingBox, width: u32, height: u32) -> PixelRect {
    PixelRect {
        left: to_pixel(bbox.xmin, width),
        top: to_pixel(bbox.ymin, height),
        right: to_pixel(bbox.xmax(), width),
        bottom: to_pixel(bbox.ymax(), height),
    }
}
