use crate::error::Result;
use crate::mesh::VertexStream;
use crate::scene::Scene;
use crate::theme::ActiveTheme;

use super::backend::{FrameUniforms, RenderBackend, TextureUnit};

/// Opaque id of a requested display refresh callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Source of display refresh callbacks.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameRequest;

    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Start/stop bookkeeping for the per-frame driver.
#[derive(Debug)]
pub struct RenderLoop<S> {
    scheduler: S,
    pending: Option<FrameRequest>,
    last_timestamp: Option<f64>,
}

impl<S: FrameScheduler> RenderLoop<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            pending: None,
            last_timestamp: None,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests the first frame. Returns `false` if the loop was already
    /// running.
    pub fn start(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.last_timestamp = None;
        self.pending = Some(self.scheduler.request_frame());
        true
    }

    /// Cancels the pending frame. The next `start` begins a fresh baseline.
    pub fn stop(&mut self) -> bool {
        let Some(request) = self.pending.take() else {
            return false;
        };
        self.scheduler.cancel_frame(request);
        self.last_timestamp = None;
        true
    }

    /// Handles a refresh callback at `timestamp` seconds.
    ///
    /// The next frame is requested before anything is drawn so the loop keeps
    /// going even when the draw fails. Returns the elapsed time since the
    /// previous tick (zero on the first tick) or `None` when the loop is
    /// stopped.
    pub fn begin_tick(&mut self, timestamp: f64) -> Option<f32> {
        self.pending?;
        self.pending = Some(self.scheduler.request_frame());

        let dt = match self.last_timestamp {
            Some(previous) => (timestamp - previous).max(0.0) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(timestamp);
        Some(dt)
    }
}

/// Issues the draw for one frame: clear, program, uniforms, material
/// textures, vertex streams and a single non-indexed draw.
pub fn draw_frame<B: RenderBackend + ?Sized>(
    backend: &mut B,
    scene: &Scene,
    theme: &ActiveTheme,
) -> Result<()> {
    let view = scene.camera.view_matrix();
    let uniforms = FrameUniforms::new(
        scene.projection,
        view,
        scene.camera.eye(),
        &theme.descriptor,
    );

    backend.clear();
    backend.use_program(scene.program);
    backend.set_uniforms(&uniforms);
    for unit in TextureUnit::ALL {
        backend.bind_texture(unit, theme.textures.get(unit));
    }
    for stream in VertexStream::ALL {
        backend.bind_vertex_stream(stream, scene.geometry.buffer(stream));
    }
    backend.draw_triangles(scene.geometry.vertex_count)
}
