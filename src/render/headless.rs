use std::collections::BTreeMap;

use crate::assets::DecodedImage;
use crate::error::{Result, ViewerError};
use crate::mesh::VertexStream;

use super::backend::{
    BufferHandle, FrameUniforms, ProgramHandle, RenderBackend, ShaderSource, TextureHandle,
    TextureUnit, Viewport,
};
use super::frame::{FrameRequest, FrameScheduler};
use super::shader;

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize { width: u32, height: u32 },
    Viewport(Viewport),
    Clear,
    UseProgram(ProgramHandle),
    SetUniforms(FrameUniforms),
    BindTexture(TextureUnit, TextureHandle),
    BindStream(VertexStream, BufferHandle),
    Draw { vertex_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub unit: TextureUnit,
    pub width: u32,
    pub height: u32,
}

/// Backend without a GPU. Records every call and tracks object lifetimes so
/// tests and the `--headless` mode can inspect what a frame would do.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    programs: Vec<ProgramHandle>,
    buffers: BTreeMap<BufferHandle, (VertexStream, usize)>,
    textures: BTreeMap<TextureHandle, TextureInfo>,
    released: Vec<TextureHandle>,
    textures_created: usize,
    fail_texture_at: Option<usize>,
    commands: Vec<DrawCommand>,
    program: Option<ProgramHandle>,
    bound_textures: BTreeMap<TextureUnit, TextureHandle>,
    bound_streams: BTreeMap<VertexStream, BufferHandle>,
    draws: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `n`th texture creation (zero based, counted over the
    /// backend's lifetime) fail with a backend error.
    pub fn fail_texture_creation_at(mut self, n: usize) -> Self {
        self.fail_texture_at = Some(n);
        self
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn programs(&self) -> &[ProgramHandle] {
        &self.programs
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Textures created and not yet released.
    pub fn live_textures(&self) -> &BTreeMap<TextureHandle, TextureInfo> {
        &self.textures
    }

    pub fn released_textures(&self) -> &[TextureHandle] {
        &self.released
    }

    pub fn draw_count(&self) -> usize {
        self.draws
    }

    /// Vertex count of the most recent draw.
    pub fn last_draw(&self) -> Option<u32> {
        self.commands.iter().rev().find_map(|command| match command {
            DrawCommand::Draw { vertex_count } => Some(*vertex_count),
            _ => None,
        })
    }

    pub fn bound_texture(&self, unit: TextureUnit) -> Option<TextureHandle> {
        self.bound_textures.get(&unit).copied()
    }

    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RenderBackend for RecordingBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramHandle> {
        for stage in [source.vertex, source.fragment] {
            if let Some(name) = shader::missing_uniform(stage) {
                return Err(ViewerError::ShaderCompile(format!(
                    "uniform `{name}` is not declared"
                )));
            }
        }
        if let Some(name) = shader::missing_attribute(source.vertex) {
            return Err(ViewerError::ProgramLink(format!(
                "attribute `{name}` is not bound"
            )));
        }
        let handle = ProgramHandle::new(self.allocate());
        self.programs.push(handle);
        Ok(handle)
    }

    fn create_vertex_buffer(&mut self, stream: VertexStream, data: &[f32]) -> Result<BufferHandle> {
        if data.len() % stream.components() != 0 {
            return Err(ViewerError::Backend(format!(
                "{} floats do not divide into {} components",
                data.len(),
                stream.components()
            )));
        }
        let handle = BufferHandle::new(self.allocate());
        self.buffers.insert(handle, (stream, data.len()));
        Ok(handle)
    }

    fn create_texture(&mut self, unit: TextureUnit, image: &DecodedImage) -> Result<TextureHandle> {
        let index = self.textures_created;
        self.textures_created += 1;
        if self.fail_texture_at == Some(index) {
            return Err(ViewerError::Backend(format!(
                "texture allocation {index} failed"
            )));
        }
        let handle = TextureHandle::new(self.allocate());
        self.textures.insert(
            handle,
            TextureInfo {
                unit,
                width: image.width(),
                height: image.height(),
            },
        );
        Ok(handle)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture).is_some() {
            self.released.push(texture);
            self.bound_textures.retain(|_, bound| *bound != texture);
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(DrawCommand::Viewport(viewport));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.program = Some(program);
        self.commands.push(DrawCommand::UseProgram(program));
    }

    fn set_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.commands.push(DrawCommand::SetUniforms(*uniforms));
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle) {
        self.bound_textures.insert(unit, texture);
        self.commands.push(DrawCommand::BindTexture(unit, texture));
    }

    fn bind_vertex_stream(&mut self, stream: VertexStream, buffer: BufferHandle) {
        self.bound_streams.insert(stream, buffer);
        self.commands.push(DrawCommand::BindStream(stream, buffer));
    }

    fn draw_triangles(&mut self, vertex_count: u32) -> Result<()> {
        match self.program {
            Some(program) if self.programs.contains(&program) => {}
            _ => return Err(ViewerError::Backend("no program bound".into())),
        }
        for unit in TextureUnit::ALL {
            let live = self
                .bound_textures
                .get(&unit)
                .is_some_and(|texture| self.textures.contains_key(texture));
            if !live {
                return Err(ViewerError::Backend(format!(
                    "{} is not bound to a live texture",
                    unit.uniform_name()
                )));
            }
        }
        for stream in VertexStream::ALL {
            let Some((_, len)) = self
                .bound_streams
                .get(&stream)
                .and_then(|buffer| self.buffers.get(buffer))
            else {
                return Err(ViewerError::Backend(format!(
                    "{} has no vertex buffer",
                    stream.attribute_name()
                )));
            };
            if len / stream.components() < vertex_count as usize {
                return Err(ViewerError::Backend(format!(
                    "{} holds fewer than {vertex_count} vertices",
                    stream.attribute_name()
                )));
            }
        }
        self.draws += 1;
        self.commands.push(DrawCommand::Draw { vertex_count });
        Ok(())
    }
}

/// Scheduler driven by hand: the caller decides when a frame fires.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Option<FrameRequest>,
    requested: usize,
    cancelled: usize,
}

impl ManualScheduler {
    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next_id += 1;
        self.requested += 1;
        let request = FrameRequest(self.next_id);
        self.pending = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending == Some(request) {
            self.pending = None;
        }
        self.cancelled += 1;
    }
}
