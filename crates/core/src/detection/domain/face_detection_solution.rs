use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::detection::DetectionResult;
use crate::shared::frame::Frame;

/// Default minimum score for a detection to be reported.
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceDetectionOptions {
    /// Static images are never dropped when the solution is busy.
    pub static_image_mode: bool,
    /// 0 = short-range model (faces within ~2m), 1 = full-range model.
    pub model_selection: u8,
    pub min_detection_confidence: f32,
}

impl FaceDetectionOptions {
    pub fn streaming() -> Self {
        Self {
            static_image_mode: false,
            ..Self::default()
        }
    }

    pub fn static_image() -> Self {
        Self {
            static_image_mode: true,
            ..Self::default()
        }
    }
}

impl Default for FaceDetectionOptions {
    fn default() -> Self {
        Self {
            static_image_mode: false,
            model_selection: 0,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
        }
    }
}

/// Output of a running solution: one event per processed frame.
#[derive(Debug)]
pub enum SolutionEvent {
    Result {
        result: DetectionResult,
        detect_ms: f64,
    },
    Error(String),
}

/// A face-detection solution running independently of the caller.
///
/// Frames go in through [`frame_sender`](Self::frame_sender) (for capture
/// inputs) or [`send`](Self::send); results and errors come out of
/// [`events`](Self::events).
pub trait FaceDetectionSolution: Send {
    fn options(&self) -> &FaceDetectionOptions;

    /// A sender that capture inputs can push frames into. `None` once closed.
    fn frame_sender(&self) -> Option<Sender<Frame>>;

    /// Submits one frame. Returns `false` if the frame was not accepted
    /// (solution closed, or busy in streaming mode).
    fn send(&self, frame: Frame) -> bool;

    fn events(&self) -> Receiver<SolutionEvent>;

    /// Stops accepting frames and waits for in-flight frames to finish.
    /// Idempotent.
    fn close(&mut self);
}
