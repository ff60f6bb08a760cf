use image::RgbaImage;

use crate::detection::domain::detection::DetectionResult;
use crate::display::domain::display_surface::DisplaySurface;
use crate::overlay::domain::render_error::RenderError;
use crate::overlay::infrastructure::overlay_renderer::{
    OverlayRenderer, RenderTarget, RendererKind,
};

use super::frame_presenter::FramePresenter;

/// CPU surface showing the latest raster-rendered bitmap.
///
/// Pairs only with the raster renderer. Each rendered bitmap is optionally
/// handed to a [`FramePresenter`].
pub struct ImageViewSurface {
    width: u32,
    height: u32,
    renderer: Option<OverlayRenderer>,
    pending: Option<DetectionResult>,
    image: Option<RgbaImage>,
    visible: bool,
    presenter: Option<FramePresenter>,
}

impl ImageViewSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            renderer: None,
            pending: None,
            image: None,
            visible: false,
            presenter: None,
        }
    }

    pub fn with_presenter(mut self, presenter: FramePresenter) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// The bitmap currently on display.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }
}

impl DisplaySurface for ImageViewSurface {
    fn set_solution_result_renderer(
        &mut self,
        mut renderer: OverlayRenderer,
    ) -> Result<(), RenderError> {
        if renderer.kind() != RendererKind::Raster {
            return Err(RenderError::TargetMismatch {
                renderer: renderer.kind().name(),
                target: "raster",
            });
        }
        renderer.setup(None)?;
        if let Some(mut previous) = self.renderer.replace(renderer) {
            previous.release();
        }
        Ok(())
    }

    fn set_render_data(&mut self, result: DetectionResult) {
        self.pending = Some(result);
    }

    fn request_render(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.visible {
            return Ok(());
        }
        let Some(result) = self.pending.take() else {
            return Ok(());
        };
        let renderer = self.renderer.as_ref().ok_or(RenderError::NotSetUp)?;
        renderer.render(&result, RenderTarget::Raster(&mut self.image))?;

        if result.image.is_none() {
            return Ok(());
        }
        if let (Some(presenter), Some(image)) = (self.presenter.as_mut(), self.image.as_ref()) {
            presenter.present(image, result.frame_index)?;
        }
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{Detection, Keypoint, NUM_KEY_POINTS};
    use crate::display::infrastructure::image_file_writer::ImageFileWriter;
    use crate::overlay::domain::overlay_style::OverlayStyle;
    use crate::shared::frame::Frame;
    use std::sync::Arc;

    fn raster_surface() -> ImageViewSurface {
        let mut surface = ImageViewSurface::new(32, 32);
        surface
            .set_solution_result_renderer(OverlayRenderer::new(
                RendererKind::Raster,
                OverlayStyle::default(),
            ))
            .unwrap();
        surface.set_visible(true);
        surface
    }

    fn result_with_image(index: usize) -> DetectionResult {
        let frame = Arc::new(Frame::new(vec![10; 32 * 32 * 3], 32, 32, 3, index));
        DetectionResult::new(
            vec![Detection::new(0.9, [Keypoint::new(0.5, 0.5); NUM_KEY_POINTS], None)],
            Some(frame),
            index,
        )
    }

    #[test]
    fn test_rejects_shader_renderer() {
        let mut surface = ImageViewSurface::new(8, 8);
        let outcome = surface.set_solution_result_renderer(OverlayRenderer::new(
            RendererKind::Shader,
            OverlayStyle::default(),
        ));
        assert!(matches!(outcome, Err(RenderError::TargetMismatch { .. })));
    }

    #[test]
    fn test_render_without_renderer_fails() {
        let mut surface = ImageViewSurface::new(8, 8);
        surface.set_visible(true);
        surface.set_render_data(result_with_image(0));
        assert!(surface.request_render().is_err());
    }

    #[test]
    fn test_request_render_shows_overlay() {
        let mut surface = raster_surface();
        surface.set_render_data(result_with_image(0));
        surface.request_render().unwrap();
        assert_eq!(surface.image().unwrap().get_pixel(16, 16).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_hidden_surface_does_not_render() {
        let mut surface = raster_surface();
        surface.set_visible(false);
        surface.set_render_data(result_with_image(0));
        surface.request_render().unwrap();
        assert!(surface.image().is_none());
    }

    #[test]
    fn test_result_without_image_keeps_previous_bitmap() {
        let mut surface = raster_surface();
        surface.set_render_data(result_with_image(0));
        surface.request_render().unwrap();
        let before = surface.image().cloned();

        surface.set_render_data(DetectionResult::new(vec![], None, 1));
        surface.request_render().unwrap();
        assert_eq!(surface.image().cloned(), before);
    }

    #[test]
    fn test_rendered_bitmaps_are_presented() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = FramePresenter::new(&dir.path().join("out"), Box::new(ImageFileWriter::new()));
        let mut surface = raster_surface().with_presenter(presenter);

        surface.set_render_data(result_with_image(4));
        surface.request_render().unwrap();
        // no new data: nothing presented
        surface.request_render().unwrap();

        assert!(dir.path().join("out").join("frame_000004.png").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }
}
