/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// Produces normalized bounding boxes plus the six face keypoints the
/// model regresses alongside each box.
use std::path::Path;

use crate::detection::domain::detection::{
    Detection, Keypoint, RelativeBoundingBox, NUM_KEY_POINTS,
};
use crate::detection::domain::face_detection_solution::FaceDetectionOptions;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: 4 box values + 6 keypoints.
const REGRESSOR_STRIDE: usize = 4 + 2 * NUM_KEY_POINTS;

/// BlazeFace short-range face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f32,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    ///
    /// Only the short-range model (`model_selection = 0`) is supported.
    pub fn new(
        model_path: &Path,
        options: &FaceDetectionOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if options.model_selection != 0 {
            return Err(format!(
                "Unsupported model selection {}, only the short-range model (0) is available",
                options.model_selection
            )
            .into());
        }
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;
        log::info!("Loaded BlazeFace model from {}", model_path.display());
        Ok(Self {
            session,
            confidence: options.min_detection_confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        // 1. Preprocess: resize to 128x128, normalize to [0,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        let mut raw = decode(reg_data, score_data, &self.anchors, self.confidence);
        let kept = nms(&mut raw, NMS_IOU_THRESH);
        Ok(kept.into_iter().map(RawDet::into_detection).collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDet {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    keypoints: [Keypoint; NUM_KEY_POINTS],
}

impl RawDet {
    fn into_detection(self) -> Detection {
        let bbox = RelativeBoundingBox::new(self.x1, self.y1, self.x2 - self.x1, self.y2 - self.y1);
        Detection::new(self.score, self.keypoints, Some(bbox))
    }
}

/// Decodes anchor-relative regressors into normalized detections above
/// `confidence`. Boxes are clamped to the unit square.
fn decode(reg_data: &[f32], score_data: &[f32], anchors: &[[f32; 2]], confidence: f32) -> Vec<RawDet> {
    let scale = INPUT_SIZE as f32;
    let mut dets = Vec::new();

    for (i, &raw_score) in score_data.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw_score);
        if score < confidence {
            continue;
        }

        let offset = i * REGRESSOR_STRIDE;
        let Some(reg) = reg_data.get(offset..offset + REGRESSOR_STRIDE) else {
            break;
        };
        let anchor = anchors[i];

        let cx = anchor[0] + reg[0] / scale;
        let cy = anchor[1] + reg[1] / scale;
        let w = reg[2] / scale;
        let h = reg[3] / scale;

        let mut keypoints = [Keypoint::default(); NUM_KEY_POINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            kp.x = anchor[0] + reg[4 + 2 * k] / scale;
            kp.y = anchor[1] + reg[5 + 2 * k] / scale;
        }

        dets.push(RawDet {
            x1: (cx - w / 2.0).clamp(0.0, 1.0),
            y1: (cy - h / 2.0).clamp(0.0, 1.0),
            x2: (cx + w / 2.0).clamp(0.0, 1.0),
            y2: (cy + h / 2.0).clamp(0.0, 1.0),
            score,
            keypoints,
        });
    }

    dets
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [RawDet], iou_thresh: f32) -> Vec<RawDet> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn bbox_iou(a: &RawDet, b: &RawDet) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> RawDet {
        RawDet {
            x1,
            y1,
            x2,
            y2,
            score,
            keypoints: [Keypoint::default(); NUM_KEY_POINTS],
        }
    }

    #[test]
    fn test_preprocess_shape() {
        let data = vec![128u8; 200 * 100 * 3];
        let frame = Frame::new(data, 200, 100, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_accepts_rgba() {
        let data = vec![255u8; 20 * 10 * 4];
        let frame = Frame::new(data, 20, 10, 4, 0);
        let tensor = preprocess(&frame, 128);
        assert!((tensor[[0, 2, 127, 127]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_box_and_keypoints_relative_to_anchor() {
        let anchors = vec![[0.5, 0.5]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        reg[2] = 64.0; // width = 0.5
        reg[3] = 32.0; // height = 0.25
        reg[4] = 12.8; // first keypoint x offset = 0.1
        reg[5] = -12.8; // first keypoint y offset = -0.1

        let dets = decode(&reg, &[10.0], &anchors, 0.5);
        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_relative_eq!(d.x1, 0.25);
        assert_relative_eq!(d.x2, 0.75);
        assert_relative_eq!(d.y1, 0.375);
        assert_relative_eq!(d.y2, 0.625);
        assert_relative_eq!(d.keypoints[0].x, 0.6);
        assert_relative_eq!(d.keypoints[0].y, 0.4);
        assert_relative_eq!(d.keypoints[1].x, 0.5);
    }

    #[test]
    fn test_decode_skips_low_scores() {
        let anchors = vec![[0.5, 0.5]];
        let reg = vec![0.0f32; REGRESSOR_STRIDE];
        assert!(decode(&reg, &[-10.0], &anchors, 0.5).is_empty());
    }

    #[test]
    fn test_decode_clamps_to_unit_square() {
        let anchors = vec![[0.05, 0.95]];
        let mut reg = vec![0.0f32; REGRESSOR_STRIDE];
        reg[2] = 64.0;
        reg[3] = 64.0;
        let dets = decode(&reg, &[10.0], &anchors, 0.5);
        assert_relative_eq!(dets[0].x1, 0.0);
        assert_relative_eq!(dets[0].y2, 1.0);
    }

    #[test]
    fn test_into_detection_keeps_box_geometry() {
        let det = raw(0.1, 0.2, 0.4, 0.6, 0.9).into_detection();
        let bbox = det.bounding_box().unwrap();
        assert_relative_eq!(bbox.xmin, 0.1);
        assert_relative_eq!(bbox.width, 0.3);
        assert_relative_eq!(bbox.height, 0.4);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![raw(0.0, 0.0, 0.5, 0.5, 0.9), raw(0.02, 0.02, 0.52, 0.52, 0.7)];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![raw(0.0, 0.0, 0.2, 0.2, 0.9), raw(0.6, 0.6, 0.8, 0.8, 0.8)];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }
}
