use std::f64::consts::{FRAC_PI_2, PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::DVec3;

use crate::error::{Result, ViewerError};

/// Horizontal tangent lengths below this are treated as sitting on a pole.
const POLE_EPSILON: f64 = 1e-6;

/// Per-vertex attributes of the globe mesh.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub uv: [f32; 2],
}

/// One of the four separately uploaded vertex attribute streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexStream {
    Position,
    Normal,
    Tangent,
    Uv,
}

impl VertexStream {
    pub const ALL: [VertexStream; 4] = [
        VertexStream::Position,
        VertexStream::Normal,
        VertexStream::Tangent,
        VertexStream::Uv,
    ];

    /// Number of `f32` components per vertex.
    pub const fn components(self) -> usize {
        match self {
            VertexStream::Uv => 2,
            _ => 3,
        }
    }

    /// Attribute name in the shader contract.
    pub const fn attribute_name(self) -> &'static str {
        match self {
            VertexStream::Position => "vertexPosition",
            VertexStream::Normal => "vertexNormal",
            VertexStream::Tangent => "vertexTangent",
            VertexStream::Uv => "vertexUv",
        }
    }

    pub const fn slot(self) -> u32 {
        self as u32
    }
}

/// Non-indexed triangle list for a unit sphere centred on the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    vertices: Vec<Vertex>,
}

impl SphereMesh {
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len() as u32
    }

    /// Flattens one attribute across all vertices, ready for a vertex buffer.
    pub fn stream(&self, stream: VertexStream) -> Vec<f32> {
        let mut data = Vec::with_capacity(self.vertices.len() * stream.components());
        for vertex in &self.vertices {
            match stream {
                VertexStream::Position => data.extend_from_slice(&vertex.position),
                VertexStream::Normal => data.extend_from_slice(&vertex.normal),
                VertexStream::Tangent => data.extend_from_slice(&vertex.tangent),
                VertexStream::Uv => data.extend_from_slice(&vertex.uv),
            }
        }
        data
    }
}

/// Builds a UV sphere with `vertical` latitude bands and `horizontal` longitude
/// bands. Every lattice cell contributes two triangles (six vertices).
///
/// Lattice row `v = 0` is the north pole and `v = vertical` the south pole. The
/// tangent is `normalize(z, 0, -x)`; on the poles that vector collapses, so the
/// tangent falls back to `(sin yaw, 0, -cos yaw)`, which is its limit as the
/// latitude approaches the pole and only depends on the column.
pub fn generate_sphere(vertical: u32, horizontal: u32) -> Result<SphereMesh> {
    // The draw call takes a u32 vertex count.
    let count = vertical
        .checked_mul(horizontal)
        .and_then(|cells| cells.checked_mul(6))
        .filter(|&count| count > 0)
        .ok_or(ViewerError::InvalidMesh {
            vertical,
            horizontal,
        })?;

    let mut vertices = Vec::with_capacity(count as usize);
    for v in 0..vertical {
        for h in 0..horizontal {
            let corner = |dh: u32, dv: u32| lattice_vertex(h + dh, v + dv, vertical, horizontal);

            vertices.push(corner(0, 0));
            vertices.push(corner(1, 1));
            vertices.push(corner(0, 1));

            vertices.push(corner(0, 0));
            vertices.push(corner(1, 0));
            vertices.push(corner(1, 1));
        }
    }

    Ok(SphereMesh { vertices })
}

fn lattice_vertex(h: u32, v: u32, vertical: u32, horizontal: u32) -> Vertex {
    let yaw = h as f64 * TAU / horizontal as f64;
    let pitch = FRAC_PI_2 - v as f64 * PI / vertical as f64;

    let position = DVec3::new(
        yaw.cos() * pitch.cos(),
        pitch.sin(),
        yaw.sin() * pitch.cos(),
    );

    let horizontal_tangent = DVec3::new(position.z, 0.0, -position.x);
    let length = horizontal_tangent.length();
    let tangent = if length < POLE_EPSILON {
        DVec3::new(yaw.sin(), 0.0, -yaw.cos())
    } else {
        horizontal_tangent / length
    };

    let position = position.as_vec3().to_array();
    Vertex {
        position,
        normal: position,
        tangent: tangent.as_vec3().to_array(),
        uv: [
            (1.0 - h as f64 / horizontal as f64) as f32,
            (v as f64 / vertical as f64) as f32,
        ],
    }
}
