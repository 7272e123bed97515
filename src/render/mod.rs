pub mod backend;
pub mod frame;
pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
pub mod shader;

pub use backend::{
    BufferHandle, FrameUniforms, ProgramHandle, RenderBackend, ShaderSource, TextureHandle,
    TextureUnit, Viewport,
};
pub use frame::{draw_frame, FrameRequest, FrameScheduler, RenderLoop};
pub use headless::{DrawCommand, ManualScheduler, RecordingBackend};
#[cfg(not(target_arch = "wasm32"))]
pub use native::WgpuBackend;
pub use shader::{globe_shader, ATTRIBUTE_NAMES, UNIFORM_NAMES};
