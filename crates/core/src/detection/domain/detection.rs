//! Detection results as produced by a face-detection solution.
//!
//! All geometry is normalized to `[0, 1]` relative to the input image
//! width and height.

use std::sync::Arc;

use crate::shared::frame::Frame;

/// Number of keypoints the face-detection model reports per face.
pub const NUM_KEY_POINTS: usize = 6;

/// Named indices into [`LocationData::keypoints`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceKeypoint {
    RightEye = 0,
    LeftEye = 1,
    NoseTip = 2,
    MouthCenter = 3,
    RightEarTragion = 4,
    LeftEarTragion = 5,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeBoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeBoundingBox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationData {
    pub keypoints: [Keypoint; NUM_KEY_POINTS],
    pub bounding_box: Option<RelativeBoundingBox>,
}

impl LocationData {
    pub fn keypoint(&self, which: FaceKeypoint) -> Keypoint {
        self.keypoints[which as usize]
    }
}

/// One detected face. Without location data there is nothing to draw.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub score: f32,
    pub location: Option<LocationData>,
}

impl Detection {
    pub fn new(
        score: f32,
        keypoints: [Keypoint; NUM_KEY_POINTS],
        bounding_box: Option<RelativeBoundingBox>,
    ) -> Self {
        Self {
            score,
            location: Some(LocationData {
                keypoints,
                bounding_box,
            }),
        }
    }

    pub fn without_location(score: f32) -> Self {
        Self {
            score,
            location: None,
        }
    }

    pub fn bounding_box(&self) -> Option<&RelativeBoundingBox> {
        self.location.as_ref()?.bounding_box.as_ref()
    }
}

/// Everything the detector produced for one frame.
///
/// `image` is the frame the detections refer to. It is shared rather than
/// copied so the detector and the renderer can both hold it.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub image: Option<Arc<Frame>>,
    pub frame_index: usize,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>, image: Option<Arc<Frame>>, frame_index: usize) -> Self {
        Self {
            detections,
            image,
            frame_index,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
