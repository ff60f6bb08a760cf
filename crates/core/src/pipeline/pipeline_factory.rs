use std::path::Path;

use crate::capture::domain::capture_input::{CaptureInput, CaptureSource};
use crate::detection::domain::face_detection_solution::{
    FaceDetectionOptions, FaceDetectionSolution,
};
use crate::display::domain::display_surface::DisplaySurface;
use crate::pipeline::pipeline_controller::InputSource;
use crate::shared::frame::Frame;

/// Builds the parts of a pipeline each time the controller switches source.
pub trait PipelineFactory {
    fn create_solution(
        &mut self,
        options: &FaceDetectionOptions,
    ) -> Result<Box<dyn FaceDetectionSolution>, Box<dyn std::error::Error>>;

    fn create_capture_input(&mut self, source: &CaptureSource) -> Box<dyn CaptureInput>;

    /// A surface for `source` with its overlay renderer already bound.
    fn create_surface(
        &mut self,
        source: InputSource,
    ) -> Result<Box<dyn DisplaySurface>, Box<dyn std::error::Error>>;

    /// Decodes a still image to fit within the given surface size.
    fn load_image(
        &mut self,
        path: &Path,
        max_width: u32,
        max_height: u32,
    ) -> Result<Frame, Box<dyn std::error::Error>>;
}
