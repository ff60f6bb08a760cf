use image::RgbaImage;

use crate::detection::domain::detection::DetectionResult;
use crate::overlay::domain::overlay_style::OverlayStyle;
use crate::overlay::domain::render_error::RenderError;

use super::gpu_context::GpuContext;
use super::raster_overlay_renderer::RasterOverlayRenderer;
use super::shader_overlay_renderer::{GpuRenderTarget, ShaderOverlayRenderer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererKind {
    Raster,
    Shader,
}

impl RendererKind {
    pub fn name(self) -> &'static str {
        match self {
            RendererKind::Raster => "raster",
            RendererKind::Shader => "shader",
        }
    }
}

/// Destination handed to [`OverlayRenderer::render`] by a display surface.
pub enum RenderTarget<'a> {
    /// Slot that receives the new bitmap. Left as-is when there is nothing to draw.
    Raster(&'a mut Option<RgbaImage>),
    Gpu {
        gpu: &'a GpuContext,
        target: GpuRenderTarget<'a>,
    },
}

impl RenderTarget<'_> {
    fn name(&self) -> &'static str {
        match self {
            RenderTarget::Raster(_) => "raster",
            RenderTarget::Gpu { .. } => "gpu",
        }
    }
}

/// The two overlay renderers behind one setup/render/release contract.
pub enum OverlayRenderer {
    Raster(RasterOverlayRenderer),
    Shader(ShaderOverlayRenderer),
}

impl OverlayRenderer {
    pub fn new(kind: RendererKind, style: OverlayStyle) -> Self {
        match kind {
            RendererKind::Raster => OverlayRenderer::Raster(RasterOverlayRenderer::new(style)),
            RendererKind::Shader => OverlayRenderer::Shader(ShaderOverlayRenderer::new(style)),
        }
    }

    pub fn kind(&self) -> RendererKind {
        match self {
            OverlayRenderer::Raster(_) => RendererKind::Raster,
            OverlayRenderer::Shader(_) => RendererKind::Shader,
        }
    }

    /// Prepares GPU resources. The raster renderer needs none.
    pub fn setup(&mut self, gpu: Option<&GpuContext>) -> Result<(), RenderError> {
        match self {
            OverlayRenderer::Raster(_) => Ok(()),
            OverlayRenderer::Shader(renderer) => {
                let gpu = gpu.ok_or(RenderError::GpuUnavailable)?;
                renderer.setup(gpu);
                Ok(())
            }
        }
    }

    pub fn render(
        &self,
        result: &DetectionResult,
        target: RenderTarget<'_>,
    ) -> Result<(), RenderError> {
        match (self, target) {
            (OverlayRenderer::Raster(renderer), RenderTarget::Raster(slot)) => {
                if let Some(image) = renderer.draw(result) {
                    *slot = Some(image);
                }
                Ok(())
            }
            (OverlayRenderer::Shader(renderer), RenderTarget::Gpu { gpu, target }) => {
                let draws = renderer.render(gpu, &target, result)?;
                log::trace!("Overlay frame {}: {} draw calls", result.frame_index, draws);
                Ok(())
            }
            (renderer, target) => Err(RenderError::TargetMismatch {
                renderer: renderer.kind().name(),
                target: target.name(),
            }),
        }
    }

    pub fn release(&mut self) {
        if let OverlayRenderer::Shader(renderer) = self {
            renderer.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{Detection, Keypoint, NUM_KEY_POINTS};
    use crate::shared::frame::Frame;
    use std::sync::Arc;

    fn frame_result() -> DetectionResult {
        let frame = Arc::new(Frame::new(vec![0; 20 * 20 * 3], 20, 20, 3, 0));
        DetectionResult::new(
            vec![Detection::new(0.9, [Keypoint::new(0.5, 0.5); NUM_KEY_POINTS], None)],
            Some(frame),
            0,
        )
    }

    #[test]
    fn test_kind_matches_construction() {
        let raster = OverlayRenderer::new(RendererKind::Raster, OverlayStyle::default());
        let shader = OverlayRenderer::new(RendererKind::Shader, OverlayStyle::default());
        assert_eq!(raster.kind(), RendererKind::Raster);
        assert_eq!(shader.kind(), RendererKind::Shader);
    }

    #[test]
    fn test_raster_render_fills_slot() {
        let renderer = OverlayRenderer::new(RendererKind::Raster, OverlayStyle::default());
        let mut slot = None;
        renderer
            .render(&frame_result(), RenderTarget::Raster(&mut slot))
            .unwrap();
        let image = slot.unwrap();
        assert_eq!(image.dimensions(), (20, 20));
        assert_eq!(image.get_pixel(10, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_raster_render_without_image_keeps_previous_bitmap() {
        let renderer = OverlayRenderer::new(RendererKind::Raster, OverlayStyle::default());
        let previous = RgbaImage::from_pixel(4, 4, image::Rgba([7, 7, 7, 255]));
        let mut slot = Some(previous.clone());
        let result = DetectionResult::new(vec![], None, 3);
        renderer
            .render(&result, RenderTarget::Raster(&mut slot))
            .unwrap();
        assert_eq!(slot, Some(previous));
    }

    #[test]
    fn test_shader_setup_without_gpu_fails() {
        let mut renderer = OverlayRenderer::new(RendererKind::Shader, OverlayStyle::default());
        assert!(matches!(
            renderer.setup(None),
            Err(RenderError::GpuUnavailable)
        ));
    }

    #[test]
    fn test_shader_into_raster_target_is_mismatch() {
        let renderer = OverlayRenderer::new(RendererKind::Shader, OverlayStyle::default());
        let mut slot = None;
        let outcome = renderer.render(&frame_result(), RenderTarget::Raster(&mut slot));
        assert!(matches!(
            outcome,
            Err(RenderError::TargetMismatch {
                renderer: "shader",
                target: "raster"
            })
        ));
    }

    #[test]
    fn test_release_twice_is_harmless() {
        let mut shader = OverlayRenderer::new(RendererKind::Shader, OverlayStyle::default());
        shader.release();
        shader.release();
        let mut raster = OverlayRenderer::new(RendererKind::Raster, OverlayStyle::default());
        raster.release();
        raster.release();
    }
}
