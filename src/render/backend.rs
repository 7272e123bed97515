use glam::{Mat3, Mat4, Vec3};

use crate::assets::DecodedImage;
use crate::error::Result;
use crate::mesh::VertexStream;
use crate::theme::ThemeDescriptor;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            pub const fn id(self) -> u32 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Linked shader program owned by a backend.
    ProgramHandle
);
gpu_handle!(
    /// Static vertex buffer owned by a backend.
    BufferHandle
);
gpu_handle!(
    /// Texture owned by a backend until it is released.
    TextureHandle
);

/// Fixed texture units of the globe material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureUnit {
    Diffuse = 0,
    Normal = 1,
    Specular = 2,
}

impl TextureUnit {
    pub const ALL: [TextureUnit; 3] = [
        TextureUnit::Diffuse,
        TextureUnit::Normal,
        TextureUnit::Specular,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sampler name in the shader contract.
    pub const fn uniform_name(self) -> &'static str {
        match self {
            TextureUnit::Diffuse => "diffuseTexture",
            TextureUnit::Normal => "normalTexture",
            TextureUnit::Specular => "specularTexture",
        }
    }

    /// Colour textures are sampled with sRGB decoding, data textures are not.
    pub const fn is_color(self) -> bool {
        matches!(self, TextureUnit::Diffuse)
    }
}

/// Square drawing region inside the window, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl Viewport {
    /// Largest square that fits the window, centred in it.
    pub fn centered_square(width: u32, height: u32) -> Self {
        let size = width.min(height).max(1);
        Self {
            x: width.saturating_sub(size) / 2,
            y: height.saturating_sub(size) / 2,
            size,
        }
    }
}

/// Vertex and fragment source handed to [`RenderBackend::compile_program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

/// Uniform values uploaded once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub normal_matrix: Mat3,
    pub camera_position: Vec3,
    pub light_color: Vec3,
    pub light_intensity: f32,
    pub ambient_intensity: f32,
    pub specularity: f32,
    pub specular_intensity: f32,
    pub normal_map_scale: f32,
}

impl FrameUniforms {
    pub fn new(projection: Mat4, view: Mat4, eye: Vec3, theme: &ThemeDescriptor) -> Self {
        Self {
            projection,
            view,
            normal_matrix: Mat3::from_mat4(view).inverse().transpose(),
            camera_position: eye,
            light_color: theme.light.color,
            light_intensity: theme.light.intensity,
            ambient_intensity: theme.material.ambient_intensity,
            specularity: theme.material.specularity,
            specular_intensity: theme.material.specular_intensity,
            normal_map_scale: theme.material.normal_map_scale,
        }
    }
}

/// The GPU surface the viewer core drives.
///
/// Creation calls return opaque handles; the draw calls mirror an immediate
/// mode API so the frame order stays visible in the core.
pub trait RenderBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramHandle>;

    fn create_vertex_buffer(&mut self, stream: VertexStream, data: &[f32]) -> Result<BufferHandle>;

    fn create_texture(&mut self, unit: TextureUnit, image: &DecodedImage) -> Result<TextureHandle>;

    /// Frees a texture. Releasing an unknown handle is a no-op.
    fn release_texture(&mut self, texture: TextureHandle);

    fn resize_surface(&mut self, width: u32, height: u32);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Clears colour and depth before the next draw.
    fn clear(&mut self);

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniforms(&mut self, uniforms: &FrameUniforms);

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle);

    fn bind_vertex_stream(&mut self, stream: VertexStream, buffer: BufferHandle);

    /// Non-indexed triangle list draw of `vertex_count` vertices.
    fn draw_triangles(&mut self, vertex_count: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_a_centred_square() {
        assert_eq!(
            Viewport::centered_square(1280, 720),
            Viewport {
                x: 280,
                y: 0,
                size: 720
            }
        );
        assert_eq!(
            Viewport::centered_square(600, 900),
            Viewport {
                x: 0,
                y: 150,
                size: 600
            }
        );
    }

    #[test]
    fn degenerate_windows_keep_a_pixel() {
        assert_eq!(Viewport::centered_square(0, 0).size, 1);
    }

    #[test]
    fn texture_units_follow_the_material_layout() {
        let indices: Vec<_> = TextureUnit::ALL.iter().map(|unit| unit.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(TextureUnit::Normal.uniform_name(), "normalTexture");
    }
}
