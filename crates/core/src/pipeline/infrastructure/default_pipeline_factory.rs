use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::capture::domain::capture_input::{CaptureInput, CaptureSource};
use crate::capture::infrastructure::ffmpeg_capture_input::{CameraDevices, FfmpegCaptureInput};
use crate::capture::infrastructure::still_image_loader;
use crate::detection::domain::face_detection_solution::{
    FaceDetectionOptions, FaceDetectionSolution,
};
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::detection::infrastructure::threaded_detection_solution::ThreadedFaceDetectionSolution;
use crate::display::domain::display_surface::DisplaySurface;
use crate::display::infrastructure::frame_presenter::FramePresenter;
use crate::display::infrastructure::gpu_surface::GpuSurface;
use crate::display::infrastructure::image_file_writer::ImageFileWriter;
use crate::display::infrastructure::image_view_surface::ImageViewSurface;
use crate::overlay::domain::overlay_style::OverlayStyle;
use crate::overlay::infrastructure::gpu_context::GpuContext;
use crate::overlay::infrastructure::overlay_renderer::{OverlayRenderer, RendererKind};
use crate::pipeline::pipeline_controller::InputSource;
use crate::pipeline::pipeline_factory::PipelineFactory;
use crate::shared::constants::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};
use crate::shared::frame::Frame;

pub struct DefaultPipelineConfig {
    pub model_path: PathBuf,
    /// Renderer for camera and video sources. Still images always use the
    /// raster renderer.
    pub streaming_renderer: RendererKind,
    pub style: OverlayStyle,
    pub devices: CameraDevices,
    pub surface_size: (u32, u32),
    /// Where rendered surfaces are written; `None` renders without saving.
    pub output: Option<PathBuf>,
    /// Draw the camera/video frame under the GPU overlay.
    pub render_input_image: bool,
}

impl DefaultPipelineConfig {
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            streaming_renderer: RendererKind::Shader,
            style: OverlayStyle::default(),
            devices: CameraDevices::default(),
            surface_size: (DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT),
            output: None,
            render_input_image: true,
        }
    }
}

/// Builds pipelines from the BlazeFace ONNX detector, ffmpeg capture and
/// the raster or GPU surfaces.
///
/// The GPU context is created on first use and shared by every GPU surface.
/// Without a GPU adapter, streaming sources fall back to the raster renderer.
pub struct DefaultPipelineFactory {
    config: DefaultPipelineConfig,
    gpu: Option<Arc<GpuContext>>,
    gpu_probed: bool,
}

impl DefaultPipelineFactory {
    pub fn new(config: DefaultPipelineConfig) -> Self {
        Self {
            config,
            gpu: None,
            gpu_probed: false,
        }
    }

    fn gpu(&mut self) -> Option<Arc<GpuContext>> {
        if !self.gpu_probed {
            self.gpu_probed = true;
            self.gpu = GpuContext::new().map(Arc::new);
            if self.gpu.is_none() {
                log::warn!("No GPU adapter available, falling back to the raster renderer");
            }
        }
        self.gpu.clone()
    }

    fn presenter(&self) -> Option<FramePresenter> {
        self.config
            .output
            .as_deref()
            .map(|output| FramePresenter::new(output, Box::new(ImageFileWriter::new())))
    }

    fn raster_surface(&self) -> Result<Box<dyn DisplaySurface>, Box<dyn std::error::Error>> {
        let (width, height) = self.config.surface_size;
        let mut surface = ImageViewSurface::new(width, height);
        if let Some(presenter) = self.presenter() {
            surface = surface.with_presenter(presenter);
        }
        surface.set_solution_result_renderer(OverlayRenderer::new(
            RendererKind::Raster,
            self.config.style.clone(),
        ))?;
        Ok(Box::new(surface))
    }

    fn gpu_surface(
        &self,
        gpu: Arc<GpuContext>,
    ) -> Result<Box<dyn DisplaySurface>, Box<dyn std::error::Error>> {
        let (width, height) = self.config.surface_size;
        let mut surface = GpuSurface::new(gpu, width, height);
        if let Some(presenter) = self.presenter() {
            surface = surface.with_presenter(presenter);
        }
        surface.set_render_input_image(self.config.render_input_image);
        surface.set_solution_result_renderer(OverlayRenderer::new(
            RendererKind::Shader,
            self.config.style.clone(),
        ))?;
        Ok(Box::new(surface))
    }
}

impl PipelineFactory for DefaultPipelineFactory {
    fn create_solution(
        &mut self,
        options: &FaceDetectionOptions,
    ) -> Result<Box<dyn FaceDetectionSolution>, Box<dyn std::error::Error>> {
        let detector = OnnxBlazefaceDetector::new(&self.config.model_path, options)?;
        Ok(Box::new(ThreadedFaceDetectionSolution::start(
            Box::new(detector),
            options.clone(),
        )))
    }

    fn create_capture_input(&mut self, source: &CaptureSource) -> Box<dyn CaptureInput> {
        Box::new(FfmpegCaptureInput::new(
            source.clone(),
            self.config.devices.clone(),
        ))
    }

    fn create_surface(
        &mut self,
        source: InputSource,
    ) -> Result<Box<dyn DisplaySurface>, Box<dyn std::error::Error>> {
        if source == InputSource::Image || self.config.streaming_renderer == RendererKind::Raster {
            return self.raster_surface();
        }
        match self.gpu() {
            Some(gpu) => self.gpu_surface(gpu),
            None => self.raster_surface(),
        }
    }

    fn load_image(
        &mut self,
        path: &Path,
        max_width: u32,
        max_height: u32,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        still_image_loader::load(path, max_width, max_height)
    }
}
