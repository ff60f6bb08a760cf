use std::sync::Arc;

use image::RgbaImage;

use crate::detection::domain::detection::DetectionResult;
use crate::display::domain::display_surface::DisplaySurface;
use crate::overlay::domain::render_error::RenderError;
use crate::overlay::infrastructure::gpu_context::{GpuContext, OffscreenTarget, TARGET_FORMAT};
use crate::overlay::infrastructure::overlay_renderer::{
    OverlayRenderer, RenderTarget, RendererKind,
};
use crate::overlay::infrastructure::shader_overlay_renderer::GpuRenderTarget;
use crate::shared::projection::normalized_image_projection;

use super::frame_presenter::FramePresenter;

/// Draws the input image as a textured full-target quad.
struct InputImageProgram {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl InputImageProgram {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("input-image-shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../overlay/infrastructure/shaders/textured_quad.wgsl").into(),
            ),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("input-image-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("input-image-pipeline-layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("input-image-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("input-image-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            layout,
            sampler,
        }
    }

    fn draw(&self, gpu: &GpuContext, target: &OffscreenTarget, image: &RgbaImage) {
        let texture = gpu.upload_texture(image);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("input-image-bind-group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("input-image"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("input-image-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        gpu.queue.submit(Some(encoder.finish()));
    }
}

/// Offscreen GPU surface: input image (optional) plus shader overlay,
/// read back after every render.
///
/// Results are drawn with the normalized image projection, so overlays line
/// up with the input image whatever the surface size.
pub struct GpuSurface {
    gpu: Arc<GpuContext>,
    target: OffscreenTarget,
    input_program: InputImageProgram,
    renderer: Option<OverlayRenderer>,
    render_input_image: bool,
    pending: Option<DetectionResult>,
    image: Option<RgbaImage>,
    visible: bool,
    presenter: Option<FramePresenter>,
}

impl GpuSurface {
    pub fn new(gpu: Arc<GpuContext>, width: u32, height: u32) -> Self {
        let target = gpu.create_target(width.max(1), height.max(1));
        let input_program = InputImageProgram::new(&gpu);
        Self {
            gpu,
            target,
            input_program,
            renderer: None,
            render_input_image: false,
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

    /// Draw the result's input image under the overlay. Off by default, in
    /// which case the overlay is drawn over black.
    pub fn set_render_input_image(&mut self, enabled: bool) {
        self.render_input_image = enabled;
    }

    /// The most recent read-back of the surface.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    fn draw(
        &self,
        renderer: &OverlayRenderer,
        result: &DetectionResult,
    ) -> Result<RgbaImage, Box<dyn std::error::Error>> {
        self.gpu.clear(&self.target);

        if self.render_input_image {
            if let Some(frame) = result.image.as_ref() {
                let input = frame.to_rgba_image().ok_or_else(|| {
                    RenderError::InvalidFrame(format!(
                        "{} channels at {}x{}",
                        frame.channels(),
                        frame.width(),
                        frame.height()
                    ))
                })?;
                self.input_program.draw(&self.gpu, &self.target, &input);
            }
        }

        renderer.render(
            result,
            RenderTarget::Gpu {
                gpu: &self.gpu,
                target: GpuRenderTarget {
                    view: &self.target.view,
                    width: self.target.width,
                    height: self.target.height,
                    projection: normalized_image_projection(),
                },
            },
        )?;

        let pixels = self.gpu.read_rgba(&self.target);
        let image = RgbaImage::from_raw(self.target.width, self.target.height, pixels)
            .ok_or("Read-back size does not match the surface")?;
        Ok(image)
    }
}

impl DisplaySurface for GpuSurface {
    fn set_solution_result_renderer(
        &mut self,
        mut renderer: OverlayRenderer,
    ) -> Result<(), RenderError> {
        if renderer.kind() != RendererKind::Shader {
            return Err(RenderError::TargetMismatch {
                renderer: renderer.kind().name(),
                target: "gpu",
            });
        }
        renderer.setup(Some(&self.gpu))?;
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
        let image = self.draw(renderer, &result)?;
        if let Some(presenter) = self.presenter.as_mut() {
            presenter.present(&image, result.frame_index)?;
        }
        self.image = Some(image);
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn size(&self) -> (u32, u32) {
        (self.target.width, self.target.height)
    }
}

impl Drop for GpuSurface {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::{
        Detection, Keypoint, RelativeBoundingBox, NUM_KEY_POINTS,
    };
    use crate::overlay::domain::overlay_style::OverlayStyle;
    use crate::shared::frame::Frame;

    fn try_gpu_context() -> Option<Arc<GpuContext>> {
        GpuContext::new().map(Arc::new)
    }

    fn shader_surface(gpu: Arc<GpuContext>) -> GpuSurface {
        let mut surface = GpuSurface::new(gpu, 64, 64);
        surface
            .set_solution_result_renderer(OverlayRenderer::new(
                RendererKind::Shader,
                OverlayStyle::default(),
            ))
            .unwrap();
        surface.set_visible(true);
        surface
    }

    fn blue_result() -> DetectionResult {
        let mut data = Vec::with_capacity(32 * 32 * 3);
        for _ in 0..32 * 32 {
            data.extend_from_slice(&[0, 0, 255]);
        }
        let frame = Arc::new(Frame::new(data, 32, 32, 3, 0));
        let bbox = RelativeBoundingBox::new(0.25, 0.25, 0.5, 0.5);
        DetectionResult::new(
            vec![Detection::new(0.9, [Keypoint::new(0.9, 0.9); NUM_KEY_POINTS], Some(bbox))],
            Some(frame),
            0,
        )
    }

    #[test]
    fn test_rejects_raster_renderer() {
        let Some(gpu) = try_gpu_context() else {
            return;
        };
        let mut surface = GpuSurface::new(gpu, 8, 8);
        let outcome = surface.set_solution_result_renderer(OverlayRenderer::new(
            RendererKind::Raster,
            OverlayStyle::default(),
        ));
        assert!(matches!(outcome, Err(RenderError::TargetMismatch { .. })));
    }

    #[test]
    fn test_overlay_over_black_by_default() {
        let Some(gpu) = try_gpu_context() else {
            return;
        };
        let mut surface = shader_surface(gpu);
        surface.set_render_data(blue_result());
        surface.request_render().unwrap();

        let image = surface.image().unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(32, 32).0, [0, 0, 0, 255]);
        assert_eq!(image.get_pixel(32, 16).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_input_image_rendered_underneath() {
        let Some(gpu) = try_gpu_context() else {
            return;
        };
        let mut surface = shader_surface(gpu);
        surface.set_render_input_image(true);
        surface.set_render_data(blue_result());
        surface.request_render().unwrap();

        let image = surface.image().unwrap();
        assert_eq!(image.get_pixel(32, 32).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(32, 16).0, [0, 255, 0, 255]);
    }

    #[test]
    fn test_hidden_surface_keeps_previous_image() {
        let Some(gpu) = try_gpu_context() else {
            return;
        };
        let mut surface = shader_surface(gpu);
        surface.set_visible(false);
        surface.set_render_data(blue_result());
        surface.request_render().unwrap();
        assert!(surface.image().is_none());
    }
}
