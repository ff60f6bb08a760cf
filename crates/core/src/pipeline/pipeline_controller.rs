use std::path::Path;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::capture::domain::capture_input::{CameraFacing, CaptureInput, CaptureSource};
use crate::detection::domain::detection::{DetectionResult, FaceKeypoint};
use crate::detection::domain::face_detection_solution::{
    FaceDetectionOptions, FaceDetectionSolution, SolutionEvent, DEFAULT_MIN_DETECTION_CONFIDENCE,
};
use crate::display::domain::display_surface::DisplaySurface;
use crate::pipeline::pipeline_factory::PipelineFactory;
use crate::pipeline::pipeline_logger::PipelineLogger;

/// How long `run` waits for an event before checking whether the stream ended.
const EVENT_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputSource {
    #[default]
    Unknown,
    Image,
    Video,
    Camera,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    pub facing: CameraFacing,
    pub min_detection_confidence: f32,
    /// Log nose-tip coordinates in image pixels instead of [0, 1].
    pub log_pixel_coordinates: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Front,
            min_detection_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
            log_pixel_coordinates: false,
        }
    }
}

/// Everything belonging to the active input source. Replaced as a whole
/// whenever the source changes.
#[derive(Default)]
struct PipelineState {
    source: InputSource,
    capture_source: Option<CaptureSource>,
    solution: Option<Box<dyn FaceDetectionSolution>>,
    events: Option<Receiver<SolutionEvent>>,
    capture: Option<Box<dyn CaptureInput>>,
    surface: Option<Box<dyn DisplaySurface>>,
}

/// Wires an input source into a face-detection solution and its results
/// into a display surface.
///
/// Solution events are consumed on the caller's thread through
/// [`dispatch_pending`](Self::dispatch_pending) or [`run`](Self::run), so
/// rendering never happens concurrently.
pub struct PipelineController {
    factory: Box<dyn PipelineFactory>,
    config: ControllerConfig,
    logger: Box<dyn PipelineLogger>,
    state: PipelineState,
    rendered: usize,
}

impl PipelineController {
    pub fn new(
        factory: Box<dyn PipelineFactory>,
        config: ControllerConfig,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            factory,
            config,
            logger,
            state: PipelineState::default(),
            rendered: 0,
        }
    }

    pub fn input_source(&self) -> InputSource {
        self.state.source
    }

    pub fn surface(&self) -> Option<&dyn DisplaySurface> {
        self.state.surface.as_deref()
    }

    /// Total results handed to a surface since construction.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Switches to the camera. Returns `false` without touching anything if
    /// the camera is already the active source.
    pub fn start_camera(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
        if self.state.source == InputSource::Camera {
            return Ok(false);
        }
        self.stop_current_pipeline();
        self.setup_streaming_pipeline(InputSource::Camera, CaptureSource::Camera)?;
        Ok(true)
    }

    pub fn start_video(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.stop_current_pipeline();
        self.setup_streaming_pipeline(
            InputSource::Video,
            CaptureSource::VideoFile(path.to_path_buf()),
        )
    }

    /// Runs detection on a single still image, rendered on a raster surface.
    pub fn open_image(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.stop_current_pipeline();

        let options = FaceDetectionOptions {
            min_detection_confidence: self.config.min_detection_confidence,
            ..FaceDetectionOptions::static_image()
        };
        let solution = self.factory.create_solution(&options)?;
        let mut surface = self.factory.create_surface(InputSource::Image)?;
        let (width, height) = surface.size();
        let frame = self.factory.load_image(path, width, height)?;

        surface.set_visible(true);
        let accepted = solution.send(frame);
        self.state = PipelineState {
            source: InputSource::Image,
            capture_source: None,
            events: Some(solution.events()),
            solution: Some(solution),
            capture: None,
            surface: Some(surface),
        };
        if !accepted {
            return Err("Face detection solution rejected the image".into());
        }
        log::info!("Image pipeline started: {}", path.display());
        Ok(())
    }

    /// Tears down the active pipeline. The capture listener is detached
    /// before anything is closed so no frame reaches a closed solution.
    pub fn stop_current_pipeline(&mut self) {
        let mut state = std::mem::take(&mut self.state);

        if let Some(mut capture) = state.capture.take() {
            capture.set_new_frame_listener(None);
            capture.close();
        }
        if let Some(surface) = state.surface.as_mut() {
            surface.set_visible(false);
        }
        if let Some(mut solution) = state.solution.take() {
            solution.close();
        }

        if state.source != InputSource::Unknown {
            log::info!("Stopped {:?} pipeline", state.source);
        }
    }

    /// Camera only: hides the surface and releases the camera.
    pub fn on_pause(&mut self) {
        if self.state.source != InputSource::Camera {
            return;
        }
        if let Some(surface) = self.state.surface.as_mut() {
            surface.set_visible(false);
        }
        if let Some(mut capture) = self.state.capture.take() {
            capture.close();
        }
        log::debug!("Camera paused");
    }

    /// Camera only: reopens the camera into the running solution.
    pub fn on_resume(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.state.source != InputSource::Camera {
            return Ok(());
        }
        self.start_capture()?;
        log::debug!("Camera resumed");
        Ok(())
    }

    /// Handles every event already waiting. Returns how many results were
    /// rendered.
    pub fn dispatch_pending(&mut self) -> usize {
        let Some(events) = self.state.events.clone() else {
            return 0;
        };
        let mut rendered = 0;
        while let Ok(event) = events.try_recv() {
            if self.handle_event(event) {
                rendered += 1;
            }
        }
        rendered
    }

    /// Handles events until the source is exhausted: one event for an
    /// image, end of stream for a video, or `max_frames` rendered results.
    /// A camera runs until `max_frames` or until its device stops.
    ///
    /// When a stream ends, frames still queued in the solution are processed
    /// and rendered before returning. Returns the number of rendered results.
    pub fn run(&mut self, max_frames: Option<usize>) -> usize {
        let started_at = self.rendered;

        while let Some(events) = self.state.events.clone() {
            if max_frames.is_some_and(|max| self.rendered - started_at >= max) {
                break;
            }
            match events.recv_timeout(EVENT_POLL) {
                Ok(event) => {
                    self.handle_event(event);
                    // a still image yields exactly one event
                    if self.state.source == InputSource::Image {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stream_ended() {
                        self.finish_stream();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.logger.summary();
        self.rendered - started_at
    }

    fn setup_streaming_pipeline(
        &mut self,
        source: InputSource,
        capture_source: CaptureSource,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let options = FaceDetectionOptions {
            min_detection_confidence: self.config.min_detection_confidence,
            ..FaceDetectionOptions::streaming()
        };
        let solution = self.factory.create_solution(&options)?;
        let surface = self.factory.create_surface(source)?;

        self.state = PipelineState {
            source,
            capture_source: Some(capture_source),
            events: Some(solution.events()),
            solution: Some(solution),
            capture: None,
            surface: Some(surface),
        };
        if let Err(e) = self.start_capture() {
            self.stop_current_pipeline();
            return Err(e);
        }
        log::info!("{source:?} pipeline started");
        Ok(())
    }

    fn start_capture(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(capture_source) = self.state.capture_source.clone() else {
            return Ok(());
        };
        let mut capture = self.factory.create_capture_input(&capture_source);
        capture.set_new_frame_listener(
            self.state
                .solution
                .as_ref()
                .and_then(|solution| solution.frame_sender()),
        );

        let (width, height) = match self.state.surface.as_mut() {
            Some(surface) => {
                surface.set_visible(true);
                surface.size()
            }
            None => (0, 0),
        };
        if let Err(e) = capture.start(self.config.facing, width, height) {
            capture.set_new_frame_listener(None);
            capture.close();
            return Err(e);
        }
        self.state.capture = Some(capture);
        Ok(())
    }

    fn stream_ended(&self) -> bool {
        matches!(self.state.capture.as_ref(), Some(capture) if !capture.is_streaming())
    }

    /// Closes the finished capture and the solution; the solution finishes
    /// its queued frames and then disconnects the event channel.
    fn finish_stream(&mut self) {
        if let Some(mut capture) = self.state.capture.take() {
            capture.set_new_frame_listener(None);
            capture.close();
        }
        if let Some(solution) = self.state.solution.as_mut() {
            solution.close();
        }
        log::info!("{:?} stream ended", self.state.source);
    }

    /// Returns true when the event was a result that reached the surface.
    fn handle_event(&mut self, event: SolutionEvent) -> bool {
        let (result, detect_ms) = match event {
            SolutionEvent::Result { result, detect_ms } => (result, detect_ms),
            SolutionEvent::Error(message) => {
                log::warn!("Face detection error: {message}");
                return false;
            }
        };

        self.logger.timing("detect", detect_ms);
        self.logger.metric("faces", result.detections.len() as f64);
        if let Some(message) = nose_tip_message(&result, self.config.log_pixel_coordinates) {
            self.logger.info(&message);
        }

        let Some(surface) = self.state.surface.as_mut() else {
            return false;
        };
        if !surface.is_visible() {
            log::debug!("Surface hidden, dropping frame {}", result.frame_index);
            return false;
        }
        let frame_index = result.frame_index;
        let started = Instant::now();
        surface.set_render_data(result);
        if let Err(e) = surface.request_render() {
            log::warn!("Rendering frame {frame_index} failed: {e}");
            return false;
        }
        self.logger
            .timing("render", started.elapsed().as_secs_f64() * 1000.0);
        self.logger.frame_rendered(frame_index);
        self.rendered += 1;
        true
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.stop_current_pipeline();
    }
}

/// Nose-tip position of the first detected face, normalized or in pixels
/// of the input image. `None` when there is nothing to report.
pub fn nose_tip_message(result: &DetectionResult, pixel_values: bool) -> Option<String> {
    let location = result.detections.first()?.location.as_ref()?;
    let nose_tip = location.keypoint(FaceKeypoint::NoseTip);

    match result.image.as_ref() {
        Some(image) if pixel_values => Some(format!(
            "Face detection nose tip coordinates (pixel values): x={:.1}, y={:.1}",
            nose_tip.x * image.width() as f32,
            nose_tip.y * image.height() as f32
        )),
        _ => Some(format!(
            "Face detection nose tip normalized coordinates (value range: [0, 1]): x={:.4}, y={:.4}",
            nose_tip.x, nose_tip.y
        )),
    }
}
