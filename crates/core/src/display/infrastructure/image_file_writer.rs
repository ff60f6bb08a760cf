use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::display::domain::image_writer::ImageWriter;

/// Writes rendered images with the `image` crate; the format follows the
/// file extension.
///
/// Formats without an alpha channel (JPEG, BMP) get the RGB planes only.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn supports_alpha(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    !matches!(ext.as_deref(), Some("jpg" | "jpeg" | "bmp"))
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, image: &RgbaImage) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if supports_alpha(path) {
            image.save(path)?;
        } else {
            DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(path)?;
        }
        Ok(())
    }
}
