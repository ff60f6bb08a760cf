use std::path::Path;

use image::RgbaImage;

/// Persists one rendered image.
pub trait ImageWriter: Send {
    fn write(&self, path: &Path, image: &RgbaImage) -> Result<(), Box<dyn std::error::Error>>;
}
