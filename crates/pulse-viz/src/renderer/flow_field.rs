//! Fullscreen flow-noise shader.
//!
//! Renders a domain-warped fractal noise field through a wgpu pipeline into an
//! offscreen texture, then reshapes it onto the frame. Audio drive values and
//! palette colors reach the shader through a uniform block rebuilt once per
//! tick.

use super::{FrameInput, GpuTarget, SceneContext, SceneError, SceneSurface, Viewport, Visualization};
use nannou::prelude::*;
use nannou::wgpu;
use pulse_viz_core::{BandKind, BeatTracker, Color, Envelope, Palette, SmoothedEnergy};
use std::cell::RefCell;
use tracing::debug;

/// Offscreen target format (filterable, so the reshaper can sample it)
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

/// Vertex for fullscreen quad
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

const FULLSCREEN_QUAD: [QuadVertex; 6] = [
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        uv: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        uv: [0.0, 0.0],
    },
];

/// Mirrors `Uniforms` in flow_field.wgsl
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct FlowUniforms {
    /// width, height, pixel density, time
    resolution: [f32; 4],
    /// bass, mid, treble, flash
    drive: [f32; 4],
    color_a: [f32; 4],
    color_b: [f32; 4],
    color_c: [f32; 4],
}

fn rgba(color: Color) -> [f32; 4] {
    [color.r, color.g, color.b, 1.0]
}

struct FlowGpu {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    quad: wgpu::Buffer,
    texture: wgpu::Texture,
    texture_view: wgpu::TextureView,
    reshaper: wgpu::TextureReshaper,
    size: [u32; 2],
    output_format: wgpu::TextureFormat,
    output_samples: u32,
}

impl FlowGpu {
    fn new(
        device: &wgpu::Device,
        size: [u32; 2],
        output_samples: u32,
        output_format: wgpu::TextureFormat,
        uniforms: &FlowUniforms,
    ) -> Self {
        let uniform_buffer = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("Flow Field Uniforms"),
            contents: bytemuck::cast_slice(&[*uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flow Field Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flow Field Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let quad = device.create_buffer_init(&wgpu::BufferInitDescriptor {
            label: Some("Flow Field Quad"),
            contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Flow Field Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/flow_field.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Flow Field Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Flow Field Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: 8,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let texture = Self::create_texture(device, size);
        let texture_view = texture.view().build();
        let reshaper = Self::create_reshaper(device, &texture_view, output_samples, output_format);

        Self {
            pipeline,
            bind_group,
            uniform_buffer,
            quad,
            texture,
            texture_view,
            reshaper,
            size,
            output_format,
            output_samples,
        }
    }

    fn create_texture(device: &wgpu::Device, size: [u32; 2]) -> wgpu::Texture {
        wgpu::TextureBuilder::new()
            .size([size[0].max(1), size[1].max(1)])
            .usage(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
            .sample_count(1)
            .format(TEXTURE_FORMAT)
            .build(device)
    }

    fn create_reshaper(
        device: &wgpu::Device,
        view: &wgpu::TextureView,
        output_samples: u32,
        output_format: wgpu::TextureFormat,
    ) -> wgpu::TextureReshaper {
        wgpu::TextureReshaper::new(
            device,
            view,
            1,
            wgpu::TextureSampleType::Float { filterable: true },
            output_samples,
            output_format,
        )
    }

    /// Recreate the offscreen target when the output changed
    fn fit(&mut self, device: &wgpu::Device, target: &GpuTarget) {
        if self.size == target.size
            && self.output_format == target.format
            && self.output_samples == target.sample_count
        {
            return;
        }
        debug!("Flow field target {:?} -> {:?}", self.size, target.size);
        self.size = target.size;
        self.output_format = target.format;
        self.output_samples = target.sample_count;
        self.texture = Self::create_texture(device, target.size);
        self.texture_view = self.texture.view().build();
        self.reshaper = Self::create_reshaper(
            device,
            &self.texture_view,
            target.sample_count,
            target.format,
        );
    }
}

pub struct FlowField {
    palette: Palette,
    tracker: BeatTracker,
    bass: Envelope,
    mid: SmoothedEnergy,
    treble: SmoothedEnergy,
    flash: f32,
    time: f32,
    viewport: Viewport,
    uniforms: FlowUniforms,
    /// GPU resources, present between `init` and `destroy`
    gpu: RefCell<Option<FlowGpu>>,
}

impl FlowField {
    pub fn new(context: SceneContext) -> Self {
        let mut field = Self {
            palette: context.palette,
            tracker: BeatTracker::new(context.tracker),
            bass: Envelope::new(0.5, 0.08),
            mid: SmoothedEnergy::new(0.08),
            treble: SmoothedEnergy::new(0.12),
            flash: 0.0,
            time: 0.0,
            viewport: Viewport::default(),
            uniforms: bytemuck::Zeroable::zeroed(),
            gpu: RefCell::new(None),
        };
        field.rebuild_uniforms();
        field
    }

    fn rebuild_uniforms(&mut self) {
        let [w, h] = self.viewport.physical();
        self.uniforms = FlowUniforms {
            resolution: [w as f32, h as f32, self.viewport.pixel_density, self.time],
            drive: [
                self.bass.value(),
                self.mid.value(),
                self.treble.value(),
                self.flash,
            ],
            color_a: rgba(self.palette.get(0)),
            color_b: rgba(self.palette.get(1)),
            color_c: rgba(self.palette.get(2)),
        };
    }
}

impl Visualization for FlowField {
    fn init(&mut self, surface: &SceneSurface) -> Result<(), SceneError> {
        let device = surface.device.ok_or_else(|| {
            SceneError::SurfaceUnavailable("flow field needs a GPU device".to_string())
        })?;
        let size = surface.viewport.physical();
        if size[0] == 0 || size[1] == 0 {
            return Err(SceneError::ZeroSizedSurface(size[0], size[1]));
        }

        self.viewport = surface.viewport;
        self.rebuild_uniforms();
        let gpu = FlowGpu::new(
            device,
            size,
            surface.sample_count,
            surface.format,
            &self.uniforms,
        );
        *self.gpu.borrow_mut() = Some(gpu);
        Ok(())
    }

    fn tick(&mut self, input: &FrameInput) {
        let frame = self.tracker.process(input.spectrum, input.now_ms);
        self.bass.update(frame.bands.bass);
        self.mid.update(frame.bands.mid);
        self.treble.update(frame.bands.treble);

        self.flash *= 0.9;
        if let Some(beat) = frame.beat(BandKind::Bass) {
            self.flash = self.flash.max(beat.intensity * 0.6);
        }
        if let Some(intense) = frame.intense {
            self.flash = self.flash.max(intense.intensity);
        }

        self.time += input.dt * (0.6 + self.mid.value() * 0.8);
        self.rebuild_uniforms();
    }

    fn draw(&self, _draw: &Draw, _bounds: Rect) {
        // Everything is drawn in `encode`
    }

    fn encode(&self, target: &GpuTarget) {
        let mut gpu = self.gpu.borrow_mut();
        let Some(gpu) = gpu.as_mut() else {
            return;
        };
        gpu.fit(target.device, target);

        target
            .queue
            .write_buffer(&gpu.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));

        let mut encoder = target
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flow Field Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Flow Field Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &gpu.texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            render_pass.set_pipeline(&gpu.pipeline);
            render_pass.set_bind_group(0, &gpu.bind_group, &[]);
            render_pass.set_vertex_buffer(0, gpu.quad.slice(..));
            render_pass.draw(0..6, 0..1);
        }

        gpu.reshaper.encode_render_pass(target.view, &mut encoder);
        target.queue.submit(Some(encoder.finish()));
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.rebuild_uniforms();
    }

    fn destroy(&mut self) {
        self.gpu.borrow_mut().take();
        self.tracker.reset();
    }
}
