use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("failed to read style file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid style file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Colors and sizes shared by both overlay renderers.
///
/// Raster sizes are in image pixels; shader sizes are in target pixels.
/// Missing fields in a style file fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// RGBA
    pub keypoint_color: [u8; 4],
    pub bbox_color: [u8; 4],
    pub keypoint_radius: u32,
    pub bbox_thickness: u32,
    pub point_size: f32,
    pub line_width: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            keypoint_color: [255, 0, 0, 255],
            bbox_color: [0, 255, 0, 255],
            keypoint_radius: 8,
            bbox_thickness: 5,
            point_size: 16.0,
            line_width: 8.0,
        }
    }
}

impl OverlayStyle {
    pub fn load(path: &Path) -> Result<Self, StyleError> {
        let json = fs::read_to_string(path).map_err(|source| StyleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| StyleError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn keypoint_color_f32(&self) -> [f32; 4] {
        to_unit(self.keypoint_color)
    }

    pub fn bbox_color_f32(&self) -> [f32; 4] {
        to_unit(self.bbox_color)
    }
}

fn to_unit(color: [u8; 4]) -> [f32; 4] {
    color.map(|c| c as f32 / 255.0)
}
