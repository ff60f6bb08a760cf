use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::detection::domain::detection::DetectionResult;
use crate::detection::domain::face_detection_solution::{
    FaceDetectionOptions, FaceDetectionSolution, SolutionEvent,
};
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;

const DEFAULT_FRAME_QUEUE: usize = 2;

/// How often an idle worker checks whether it has been closed.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Runs a [`FaceDetector`] on a dedicated worker thread.
///
/// Layout: `frames (bounded) → worker [detect] → events (unbounded)`
///
/// In streaming mode a full frame queue drops the new frame instead of
/// blocking the capture thread. Static images always wait for room.
pub struct ThreadedFaceDetectionSolution {
    options: FaceDetectionOptions,
    frame_tx: Option<Sender<Frame>>,
    events_rx: Receiver<SolutionEvent>,
    closing: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedFaceDetectionSolution {
    pub fn start(detector: Box<dyn FaceDetector>, options: FaceDetectionOptions) -> Self {
        Self::with_queue(detector, options, DEFAULT_FRAME_QUEUE)
    }

    pub fn with_queue(
        detector: Box<dyn FaceDetector>,
        options: FaceDetectionOptions,
        queue: usize,
    ) -> Self {
        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(queue.max(1));
        let (event_tx, events_rx) = crossbeam_channel::unbounded::<SolutionEvent>();
        let closing = Arc::new(AtomicBool::new(false));

        let handle = spawn_worker(
            detector,
            frame_rx,
            event_tx,
            closing.clone(),
            options.min_detection_confidence,
        );

        Self {
            options,
            frame_tx: Some(frame_tx),
            events_rx,
            closing,
            handle: Some(handle),
        }
    }
}

fn spawn_worker(
    mut detector: Box<dyn FaceDetector>,
    frame_rx: Receiver<Frame>,
    event_tx: Sender<SolutionEvent>,
    closing: Arc<AtomicBool>,
    min_confidence: f32,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        let frame = match frame_rx.recv_timeout(IDLE_POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => {
                if closing.load(Ordering::Relaxed) {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let started = Instant::now();
        let event = match detector.detect(&frame) {
            Ok(detections) => {
                let detections = detections
                    .into_iter()
                    .filter(|d| d.score >= min_confidence)
                    .collect();
                let index = frame.index();
                SolutionEvent::Result {
                    result: DetectionResult::new(detections, Some(Arc::new(frame)), index),
                    detect_ms: started.elapsed().as_secs_f64() * 1000.0,
                }
            }
            Err(e) => SolutionEvent::Error(e.to_string()),
        };

        if event_tx.send(event).is_err() {
            break;
        }
    })
}

impl FaceDetectionSolution for ThreadedFaceDetectionSolution {
    fn options(&self) -> &FaceDetectionOptions {
        &self.options
    }

    fn frame_sender(&self) -> Option<Sender<Frame>> {
        self.frame_tx.clone()
    }

    fn send(&self, frame: Frame) -> bool {
        let Some(tx) = self.frame_tx.as_ref() else {
            return false;
        };
        if self.options.static_image_mode {
            tx.send(frame).is_ok()
        } else {
            tx.try_send(frame).is_ok()
        }
    }

    fn events(&self) -> Receiver<SolutionEvent> {
        self.events_rx.clone()
    }

    fn close(&mut self) {
        self.frame_tx = None;
        self.closing.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Face detection worker panicked");
            }
        }
    }
}

impl Drop for ThreadedFaceDetectionSolution {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{Detection, Keypoint, NUM_KEY_POINTS};

    struct FixedDetector {
        scores: Vec<f32>,
    }

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(self
                .scores
                .iter()
                .map(|&s| Detection::new(s, [Keypoint::new(0.5, 0.5); NUM_KEY_POINTS], None))
                .collect())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Err("model exploded".into())
        }
    }

    fn make_frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, index)
    }

    fn recv(solution: &ThreadedFaceDetectionSolution) -> SolutionEvent {
        solution
            .events()
            .recv_timeout(Duration::from_secs(5))
            .expect("solution should emit an event")
    }

    #[test]
    fn test_result_carries_frame_and_index() {
        let solution = ThreadedFaceDetectionSolution::start(
            Box::new(FixedDetector { scores: vec![0.9] }),
            FaceDetectionOptions::static_image(),
        );
        assert!(solution.send(make_frame(7)));

        match recv(&solution) {
            SolutionEvent::Result { result, .. } => {
                assert_eq!(result.frame_index, 7);
                assert_eq!(result.detections.len(), 1);
                assert_eq!(result.image.unwrap().width(), 4);
            }
            SolutionEvent::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_low_confidence_detections_filtered() {
        let solution = ThreadedFaceDetectionSolution::start(
            Box::new(FixedDetector {
                scores: vec![0.9, 0.2, 0.6],
            }),
            FaceDetectionOptions::static_image(),
        );
        solution.send(make_frame(0));

        match recv(&solution) {
            SolutionEvent::Result { result, .. } => assert_eq!(result.detections.len(), 2),
            SolutionEvent::Error(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_detector_error_becomes_error_event() {
        let solution = ThreadedFaceDetectionSolution::start(
            Box::new(FailingDetector),
            FaceDetectionOptions::static_image(),
        );
        solution.send(make_frame(0));

        match recv(&solution) {
            SolutionEvent::Error(msg) => assert!(msg.contains("model exploded")),
            SolutionEvent::Result { .. } => panic!("expected an error event"),
        }
    }

    #[test]
    fn test_worker_survives_errors() {
        let solution = ThreadedFaceDetectionSolution::start(
            Box::new(FailingDetector),
            FaceDetectionOptions::static_image(),
        );
        solution.send(make_frame(0));
        solution.send(make_frame(1));
        assert!(matches!(recv(&solution), SolutionEvent::Error(_)));
        assert!(matches!(recv(&solution), SolutionEvent::Error(_)));
    }

    #[test]
    fn test_close_drains_queued_frames() {
        let mut solution = ThreadedFaceDetectionSolution::start(
            Box::new(FixedDetector { scores: vec![0.9] }),
            FaceDetectionOptions::static_image(),
        );
        let events = solution.events();
        solution.send(make_frame(3));
        solution.close();

        let collected: Vec<_> = events.try_iter().collect();
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_close_is_idempotent_and_rejects_frames() {
        let mut solution = ThreadedFaceDetectionSolution::start(
            Box::new(FixedDetector { scores: vec![] }),
            FaceDetectionOptions::streaming(),
        );
        solution.close();
        solution.close();
        assert!(!solution.send(make_frame(0)));
        assert!(solution.frame_sender().is_none());
    }

    #[test]
    fn test_close_returns_while_stale_sender_alive() {
        let mut solution = ThreadedFaceDetectionSolution::start(
            Box::new(FixedDetector { scores: vec![] }),
            FaceDetectionOptions::streaming(),
        );
        let _stale = solution.frame_sender().unwrap();
        solution.close();
    }
}
