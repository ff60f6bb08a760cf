use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::display::domain::image_writer::ImageWriter;
use crate::shared::constants::IMAGE_EXTENSIONS;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Destination {
    /// Every presented image overwrites this file.
    File(PathBuf),
    /// One `frame_NNNNNN.png` per presented image.
    Directory(PathBuf),
}

/// Presents rendered surfaces by writing them to disk.
pub struct FramePresenter {
    destination: Destination,
    writer: Box<dyn ImageWriter>,
    presented: usize,
}

impl FramePresenter {
    /// A path with an image extension is a single output file; anything
    /// else is a directory of numbered frames.
    pub fn new(output: &Path, writer: Box<dyn ImageWriter>) -> Self {
        let is_image = output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        let destination = if is_image {
            Destination::File(output.to_path_buf())
        } else {
            Destination::Directory(output.to_path_buf())
        };
        Self {
            destination,
            writer,
            presented: 0,
        }
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn path_for(&self, frame_index: usize) -> PathBuf {
        match &self.destination {
            Destination::File(path) => path.clone(),
            Destination::Directory(dir) => dir.join(format!("frame_{frame_index:06}.png")),
        }
    }

    pub fn present(
        &mut self,
        image: &RgbaImage,
        frame_index: usize,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = self.path_for(frame_index);
        self.writer.write(&path, image)?;
        self.presented += 1;
        log::debug!("Presented frame {frame_index} to {}", path.display());
        Ok(path)
    }
}
