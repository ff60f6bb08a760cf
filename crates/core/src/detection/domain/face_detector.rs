use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for the face-detection model.
///
/// The model is a black box: implementations adapt an external inference
/// engine and report normalized keypoints and boxes. Implementations may
/// keep state between frames, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
