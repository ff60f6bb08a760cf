use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::detection::domain::detection::DetectionResult;
use crate::overlay::domain::overlay_style::OverlayStyle;
use crate::overlay::domain::render_error::RenderError;
use crate::shared::projection::Mat4;

use super::gpu_context::{GpuContext, TARGET_FORMAT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    /// Each vertex is drawn as a square of `size` pixels.
    Points,
    /// Consecutive vertex pairs are drawn as segments `size` pixels wide.
    Lines,
}

/// One draw call: a primitive batch in a single color and size.
///
/// Vertices stay in normalized image coordinates; the projection matrix
/// handed to [`ShaderOverlayRenderer::render`] maps them to the target.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCommand {
    pub primitive: Primitive,
    pub color: [f32; 4],
    pub size: f32,
    pub vertices: Vec<[f32; 2]>,
}

/// Builds the draw calls for one result without touching the GPU.
///
/// Per detection with location data: one `Points` call for all keypoints,
/// then, if a box is present, one `Lines` call per edge (top, bottom,
/// left, right).
pub fn build_draw_list(result: &DetectionResult, style: &OverlayStyle) -> Vec<DrawCommand> {
    let keypoint_color = style.keypoint_color_f32();
    let bbox_color = style.bbox_color_f32();
    let mut commands = Vec::new();

    for detection in &result.detections {
        let Some(location) = detection.location.as_ref() else {
            continue;
        };

        commands.push(DrawCommand {
            primitive: Primitive::Points,
            color: keypoint_color,
            size: style.point_size,
            vertices: location.keypoints.iter().map(|kp| [kp.x, kp.y]).collect(),
        });

        let Some(bbox) = location.bounding_box.as_ref() else {
            continue;
        };
        let (left, top, right, bottom) = (bbox.xmin, bbox.ymin, bbox.xmax(), bbox.ymax());
        let edges = [
            [[left, top], [right, top]],
            [[left, bottom], [right, bottom]],
            [[left, top], [left, bottom]],
            [[right, top], [right, bottom]],
        ];
        for edge in edges {
            commands.push(DrawCommand {
                primitive: Primitive::Lines,
                color: bbox_color,
                size: style.line_width,
                vertices: edge.to_vec(),
            });
        }
    }

    commands
}

/// Where the shader renderer draws: a color attachment plus the matrix
/// taking normalized image coordinates to clip space.
pub struct GpuRenderTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub projection: Mat4,
}

/// Packed globals matching the WGSL layout (80 bytes).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    projection: Mat4,
    viewport: [f32; 2],
    _pad: [f32; 2],
}

/// Packed per-draw params matching the WGSL layout (32 bytes).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawParams {
    color: [f32; 4],
    size: f32,
    _pad: [f32; 3],
}

/// A primitive instance: a point has `start == end`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Instance {
    start: [f32; 2],
    end: [f32; 2],
}

const VERTICES_PER_INSTANCE: u32 = 6;

/// GPU objects that exist between `setup` and `release`.
struct OverlayProgram {
    pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    params_layout: wgpu::BindGroupLayout,
    params_stride: u64,
}

impl OverlayProgram {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/overlay.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay-globals-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // one slot per draw call, selected with a dynamic offset
        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay-params-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<DrawParams>() as u64),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &params_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("overlay-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Instance>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay-globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay-globals-bind-group"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let params_stride = (std::mem::size_of::<DrawParams>() as u64).div_ceil(alignment) * alignment;

        Self {
            pipeline,
            globals_buffer,
            globals_bind_group,
            params_layout,
            params_stride,
        }
    }
}

/// Draws detection overlays with a GPU program.
///
/// Must be set up against a [`GpuContext`] before rendering. `release`
/// frees the program and may be called any number of times; rendering
/// after release fails with [`RenderError::NotSetUp`] until `setup` runs
/// again.
pub struct ShaderOverlayRenderer {
    style: OverlayStyle,
    program: Option<OverlayProgram>,
}

impl ShaderOverlayRenderer {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            program: None,
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn is_set_up(&self) -> bool {
        self.program.is_some()
    }

    pub fn setup(&mut self, gpu: &GpuContext) {
        self.program = Some(OverlayProgram::new(gpu));
        log::debug!("Overlay shader program ready");
    }

    /// Draws `result` over whatever the target already holds.
    ///
    /// Returns the number of draw calls issued.
    pub fn render(
        &self,
        gpu: &GpuContext,
        target: &GpuRenderTarget,
        result: &DetectionResult,
    ) -> Result<usize, RenderError> {
        let program = self.program.as_ref().ok_or(RenderError::NotSetUp)?;
        let commands = build_draw_list(result, &self.style);
        if commands.is_empty() {
            return Ok(0);
        }

        let globals = Globals {
            projection: target.projection,
            viewport: [target.width as f32, target.height as f32],
            _pad: [0.0; 2],
        };
        gpu.queue
            .write_buffer(&program.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let stride = program.params_stride as usize;
        let mut params_bytes = vec![0u8; stride * commands.len()];
        let mut instances = Vec::new();
        let mut ranges = Vec::with_capacity(commands.len());
        for (i, command) in commands.iter().enumerate() {
            let params = DrawParams {
                color: command.color,
                size: command.size,
                _pad: [0.0; 3],
            };
            let bytes = bytemuck::bytes_of(&params);
            params_bytes[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);

            let first = instances.len() as u32;
            push_instances(&mut instances, command);
            ranges.push(first..instances.len() as u32);
        }

        let params_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay-params"),
                contents: &params_bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let params_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay-params-bind-group"),
            layout: &program.params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &params_buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<DrawParams>() as u64),
                }),
            }],
        });
        let instance_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay-instances"),
                contents: bytemuck::cast_slice(&instances),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("overlay"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view,
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
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &program.globals_bind_group, &[]);
            pass.set_vertex_buffer(0, instance_buffer.slice(..));
            for (i, range) in ranges.into_iter().enumerate() {
                let offset = (i * stride) as u32;
                pass.set_bind_group(1, &params_bind_group, &[offset]);
                pass.draw(0..VERTICES_PER_INSTANCE, range);
            }
        }
        gpu.queue.submit(Some(encoder.finish()));

        Ok(commands.len())
    }

    pub fn release(&mut self) {
        if self.program.take().is_some() {
            log::debug!("Overlay shader program released");
        }
    }
}

fn push_instances(instances: &mut Vec<Instance>, command: &DrawCommand) {
    match command.primitive {
        Primitive::Points => {
            instances.extend(command.vertices.iter().map(|&v| Instance { start: v, end: v }));
        }
        Primitive::Lines => {
            instances.extend(command.vertices.chunks_exact(2).map(|pair| Instance {
                start: pair[0],
                end: pair[1],
            }));
        }
    }
}
