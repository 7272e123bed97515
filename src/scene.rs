use glam::Mat4;
use log::debug;

use crate::camera::OrbitCamera;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::input::{InputEvent, PointerDrag};
use crate::mesh::{generate_sphere, SphereMesh, VertexStream};
use crate::render::{BufferHandle, ProgramHandle, RenderBackend, ShaderSource, Viewport};

pub const FIELD_OF_VIEW_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Visibility of the loading indicator and the render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UiState {
    pub loading_indicator: bool,
    pub surface_visible: bool,
}

/// The four static vertex buffers of the globe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffers {
    pub position: BufferHandle,
    pub normal: BufferHandle,
    pub tangent: BufferHandle,
    pub uv: BufferHandle,
    pub vertex_count: u32,
}

impl MeshBuffers {
    pub fn upload<B: RenderBackend + ?Sized>(backend: &mut B, mesh: &SphereMesh) -> Result<Self> {
        let mut upload =
            |stream: VertexStream| backend.create_vertex_buffer(stream, &mesh.stream(stream));
        Ok(Self {
            position: upload(VertexStream::Position)?,
            normal: upload(VertexStream::Normal)?,
            tangent: upload(VertexStream::Tangent)?,
            uv: upload(VertexStream::Uv)?,
            vertex_count: mesh.vertex_count(),
        })
    }

    pub fn buffer(&self, stream: VertexStream) -> BufferHandle {
        match stream {
            VertexStream::Position => self.position,
            VertexStream::Normal => self.normal,
            VertexStream::Tangent => self.tangent,
            VertexStream::Uv => self.uv,
        }
    }
}

/// Everything a frame needs apart from the active theme.
#[derive(Debug)]
pub struct Scene {
    pub camera: OrbitCamera,
    pub drag: PointerDrag,
    pub projection: Mat4,
    pub viewport: Viewport,
    pub geometry: MeshBuffers,
    pub program: ProgramHandle,
    pub ui: UiState,
}

impl Scene {
    /// Compiles the program and uploads the globe. Shader errors are returned
    /// as-is so the caller can treat them as fatal.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        config: &ViewerConfig,
        shader: ShaderSource<'_>,
    ) -> Result<Self> {
        let program = backend.compile_program(shader)?;
        let mesh = generate_sphere(config.mesh.vertical, config.mesh.horizontal)?;
        let geometry = MeshBuffers::upload(backend, &mesh)?;
        debug!(
            "uploaded globe mesh with {} vertices ({}x{})",
            geometry.vertex_count, config.mesh.vertical, config.mesh.horizontal
        );

        let viewport = Viewport::centered_square(config.window.width, config.window.height);
        backend.set_viewport(viewport);

        Ok(Self {
            camera: OrbitCamera::new(config.camera.distance, config.camera.damping),
            drag: PointerDrag::new(config.camera.drag_sensitivity),
            projection: projection(),
            viewport,
            geometry,
            program,
            ui: UiState::default(),
        })
    }

    /// Applies one queued input event.
    pub fn apply_event<B: RenderBackend + ?Sized>(&mut self, event: InputEvent, backend: &mut B) {
        match event {
            InputEvent::PointerDown { x, y } => self.drag.pointer_down(x, y, &self.camera),
            InputEvent::PointerMove { x, y } => {
                self.drag.pointer_move(x, y, &mut self.camera);
            }
            InputEvent::PointerUp { .. } => self.drag.pointer_up(),
            InputEvent::Resize { width, height } => {
                self.viewport = Viewport::centered_square(width, height);
                backend.resize_surface(width, height);
                backend.set_viewport(self.viewport);
            }
        }
    }
}

/// Fixed square perspective projection, in OpenGL clip conventions.
pub fn projection() -> Mat4 {
    Mat4::perspective_rh_gl(
        FIELD_OF_VIEW_DEGREES.to_radians(),
        1.0,
        NEAR_PLANE,
        FAR_PLANE,
    )
}
