use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};

use crate::shared::frame::Frame;

/// Loads a still image as an upright RGB frame sized for the display.
///
/// EXIF orientation is applied first, then the image is scaled to fit
/// `max_width` x `max_height` keeping its aspect ratio. A zero bound keeps
/// the decoded size.
pub fn load(
    path: &Path,
    max_width: u32,
    max_height: u32,
) -> Result<Frame, Box<dyn std::error::Error>> {
    let image = decode_upright(path)?;
    let image = fit_within(image, max_width, max_height);
    log::info!(
        "Loaded image {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
}

fn decode_upright(path: &Path) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let reader = ImageReader::new(BufReader::new(File::open(path)?)).with_guessed_format()?;
    let mut decoder = reader.into_decoder()?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)?;
    if orientation != Orientation::NoTransforms {
        log::debug!("Applying EXIF orientation {:?}", orientation);
        image.apply_orientation(orientation);
    }
    Ok(image)
}

/// Output size that fits `max_width` x `max_height` with the source aspect
/// ratio. The constrained side is filled exactly; the other side truncates.
pub fn fitted_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return (width, height);
    }
    let aspect = width as f64 / height as f64;
    if max_width as f64 / max_height as f64 > aspect {
        (((max_height as f64 * aspect) as u32).max(1), max_height)
    } else {
        (max_width, ((max_width as f64 / aspect) as u32).max(1))
    }
}

fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = fitted_size(image.width(), image.height(), max_width, max_height);
    if (width, height) == (image.width(), image.height()) {
        return image;
    }
    image.resize_exact(width, height, FilterType::Nearest)
}
