use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

use crate::detection::domain::detection::{Detection, DetectionResult};
use crate::overlay::domain::coordinate_mapper::{map_bounding_box, map_keypoint, PixelRect};
use crate::overlay::domain::overlay_style::OverlayStyle;

/// Draws detection overlays onto a copy of the input image on the CPU.
///
/// Keypoints become filled circles, bounding boxes become outlines whose
/// stroke is centered on the box edge.
pub struct RasterOverlayRenderer {
    style: OverlayStyle,
}

impl RasterOverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Returns a new image with overlays, or `None` if the result has no
    /// image to draw on. The input frame is left untouched.
    pub fn draw(&self, result: &DetectionResult) -> Option<RgbaImage> {
        let frame = result.image.as_ref()?;
        let mut canvas = frame.to_rgba_image()?;
        for detection in &result.detections {
            self.draw_detection(&mut canvas, detection);
        }
        Some(canvas)
    }

    fn draw_detection(&self, canvas: &mut RgbaImage, detection: &Detection) {
        let Some(location) = detection.location.as_ref() else {
            return;
        };
        let (width, height) = canvas.dimensions();

        let keypoint_color = Rgba(self.style.keypoint_color);
        let radius = self.style.keypoint_radius as i32;
        for kp in &location.keypoints {
            let (x, y) = map_keypoint(kp, width, height);
            draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, keypoint_color);
        }

        if let Some(bbox) = location.bounding_box.as_ref() {
            let rect = map_bounding_box(bbox, width, height);
            self.draw_outline(canvas, &rect);
        }
    }

    fn draw_outline(&self, canvas: &mut RgbaImage, rect: &PixelRect) {
        let thickness = self.style.bbox_thickness;
        if thickness == 0 {
            return;
        }
        let color = Rgba(self.style.bbox_color);
        let half = (thickness / 2) as i32;
        let outer_left = rect.left as i32 - half;
        let outer_top = rect.top as i32 - half;
        let outer_width = rect.width() + thickness - 1;
        let outer_height = rect.height() + thickness - 1;

        // top, bottom, left, right bands; imageproc clips them to the canvas
        let bands = [
            Rect::at(outer_left, outer_top).of_size(outer_width, thickness),
            Rect::at(outer_left, rect.bottom as i32 - half).of_size(outer_width, thickness),
            Rect::at(outer_left, outer_top).of_size(thickness, outer_height),
            Rect::at(rect.right as i32 - half, outer_top).of_size(thickness, outer_height),
        ];
        for band in bands {
            draw_filled_rect_mut(canvas, band, color);
        }
    }
}

impl Default for RasterOverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}
