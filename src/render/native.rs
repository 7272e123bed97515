use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use bytemuck::bytes_of;
use glam::{Mat4, Vec4};
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::window::{Window, WindowId};

use super::backend::{
    BufferHandle, FrameUniforms, ProgramHandle, RenderBackend, ShaderSource, TextureHandle,
    TextureUnit, Viewport,
};
use super::shader::{GpuUniforms, FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::assets::DecodedImage;
use crate::error::{Result, ViewerError};
use crate::mesh::VertexStream;

/// Remaps OpenGL clip depth (-1..1) to the 0..1 range wgpu expects.
const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

const UNIFORM_SIZE: u64 = std::mem::size_of::<GpuUniforms>() as u64;

/// wgpu implementation of [`RenderBackend`] drawing into a winit window.
///
/// Calls between `clear` and `draw_triangles` only record state; the draw
/// encodes one render pass and presents it.
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    next_id: u32,
    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,
    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    material: Option<([TextureHandle; 3], wgpu::BindGroup)>,
    viewport: Viewport,
    frame: FrameState,
}

#[derive(Debug, Default)]
struct FrameState {
    clear: bool,
    program: Option<ProgramHandle>,
    textures: [Option<TextureHandle>; 3],
    streams: [Option<BufferHandle>; 4],
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuBackend {
    /// Initializes the device and surface for the provided window.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("using GPU adapter {}", adapter.get_info().name);

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("globe-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no texture formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals-uniform"),
            size: UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals-bind-group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Textures carry a single level; both filters are linear.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let viewport = Viewport::centered_square(size.width, size.height);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            uniform_buffer,
            uniform_bind_group,
            uniform_layout,
            material_layout,
            sampler,
            next_id: 0,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            material: None,
            viewport,
            frame: FrameState::default(),
        })
    }

    /// Returns the identifier of the window owned by the backend.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize_surface(size.width, size.height);
    }

    fn build_pipeline(
        &self,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("globe-pipeline-layout"),
                bind_group_layouts: &[&self.uniform_layout, &self.material_layout],
                push_constant_ranges: &[],
            });

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = VertexStream::ALL
            .iter()
            .map(|stream| {
                [wgpu::VertexAttribute {
                    format: vertex_format(*stream),
                    offset: 0,
                    shader_location: stream.slot(),
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = VertexStream::ALL
            .iter()
            .zip(&attributes)
            .map(|(stream, attributes)| wgpu::VertexBufferLayout {
                array_stride: (stream.components() * std::mem::size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("globe-pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            })
    }

    fn material_bind_group(&mut self, handles: [TextureHandle; 3]) -> Result<()> {
        if matches!(&self.material, Some((cached, _)) if *cached == handles) {
            return Ok(());
        }
        let mut views = Vec::with_capacity(3);
        for handle in handles {
            let texture = self.textures.get(&handle).ok_or_else(|| {
                ViewerError::Backend(format!("texture {} was released", handle.id()))
            })?;
            views.push(&texture.view);
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material-bind-group"),
            layout: &self.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        self.material = Some((handles, bind_group));
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramHandle> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("globe-vertex"),
                source: wgpu::ShaderSource::Wgsl(source.vertex.into()),
            });
        let fragment = if std::ptr::eq(source.vertex, source.fragment) {
            None
        } else {
            Some(
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("globe-fragment"),
                        source: wgpu::ShaderSource::Wgsl(source.fragment.into()),
                    }),
            )
        };
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ViewerError::ShaderCompile(err.to_string()));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.build_pipeline(&vertex, fragment.as_ref().unwrap_or(&vertex));
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ViewerError::ProgramLink(err.to_string()));
        }

        let handle = ProgramHandle::new(self.allocate());
        self.programs.insert(handle, pipeline);
        Ok(handle)
    }

    fn create_vertex_buffer(&mut self, stream: VertexStream, data: &[f32]) -> Result<BufferHandle> {
        let handle = BufferHandle::new(self.allocate());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(stream.attribute_name()),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn create_texture(&mut self, unit: TextureUnit, image: &DecodedImage) -> Result<TextureHandle> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if image.width() > limit || image.height() > limit {
            return Err(ViewerError::Backend(format!(
                "{}x{} texture exceeds the device limit of {limit}",
                image.width(),
                image.height()
            )));
        }

        let texture = self.device.create_texture_with_data(
            &self.queue,
            &texture_descriptor(unit, image),
            wgpu::util::TextureDataOrder::LayerMajor,
            image.pixels(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = TextureHandle::new(self.allocate());
        self.textures.insert(handle, GpuTexture { texture, view });
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        let Some(released) = self.textures.remove(&texture) else {
            return;
        };
        if matches!(&self.material, Some((handles, _)) if handles.contains(&texture)) {
            self.material = None;
        }
        released.texture.destroy();
        debug!("released texture {}", texture.id());
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, width, height);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn clear(&mut self) {
        self.frame.clear = true;
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.frame.program = Some(program);
    }

    fn set_uniforms(&mut self, uniforms: &FrameUniforms) {
        let corrected = FrameUniforms {
            projection: OPENGL_TO_WGPU * uniforms.projection,
            ..*uniforms
        };
        let block = GpuUniforms::from(&corrected);
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytes_of(&block));
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle) {
        self.frame.textures[unit.index()] = Some(texture);
    }

    fn bind_vertex_stream(&mut self, stream: VertexStream, buffer: BufferHandle) {
        self.frame.streams[stream.slot() as usize] = Some(buffer);
    }

    fn draw_triangles(&mut self, vertex_count: u32) -> Result<()> {
        let frame = std::mem::take(&mut self.frame);
        let program = frame
            .program
            .ok_or_else(|| ViewerError::Backend("no program bound".into()))?;
        let [Some(diffuse), Some(normal), Some(specular)] = frame.textures else {
            return Err(ViewerError::Backend("material textures are not bound".into()));
        };
        self.material_bind_group([diffuse, normal, specular])?;

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                info!("Surface timeout; retrying next frame");
                return Ok(());
            }
            Err(err) => return Err(ViewerError::Backend(err.to_string())),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let pipeline = self
            .programs
            .get(&program)
            .ok_or_else(|| ViewerError::Backend(format!("unknown program {}", program.id())))?;
        let Some((_, material)) = self.material.as_ref() else {
            return Err(ViewerError::Backend("material bind group missing".into()));
        };
        let mut vertex_buffers = Vec::with_capacity(VertexStream::ALL.len());
        for stream in VertexStream::ALL {
            let buffer = frame.streams[stream.slot() as usize]
                .and_then(|handle| self.buffers.get(&handle))
                .ok_or_else(|| {
                    let name = stream.attribute_name();
                    ViewerError::Backend(format!("{name} has no vertex buffer"))
                })?;
            vertex_buffers.push(buffer);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("globe-encoder"),
            });
        let color_load = if frame.clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("globe-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let viewport = self.viewport;
        let max_x = self.config.width.saturating_sub(viewport.x);
        let max_y = self.config.height.saturating_sub(viewport.y);
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.size.min(max_x).max(1) as f32,
            viewport.size.min(max_y).max(1) as f32,
            0.0,
            1.0,
        );
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, material, &[]);
        for (slot, buffer) in vertex_buffers.into_iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, buffer.slice(..));
        }
        pass.draw(0..vertex_count, 0..1);

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Single-level RGBA8 texture sized to `image`. Only the diffuse map is
/// sampled with sRGB decoding.
fn texture_descriptor(unit: TextureUnit, image: &DecodedImage) -> wgpu::TextureDescriptor<'static> {
    let format = if unit.is_color() {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };
    wgpu::TextureDescriptor {
        label: Some(unit.uniform_name()),
        size: wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

fn vertex_format(stream: VertexStream) -> wgpu::VertexFormat {
    match stream.components() {
        2 => wgpu::VertexFormat::Float32x2,
        _ => wgpu::VertexFormat::Float32x3,
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
