use bytemuck::{Pod, Zeroable};
use glam::Mat3;

use super::backend::{FrameUniforms, ShaderSource};

/// Uniform names every globe program must expose.
pub const UNIFORM_NAMES: [&str; 13] = [
    "projectionMatrix",
    "viewMatrix",
    "normalMatrix",
    "cameraPosition",
    "lightColor",
    "lightIntensity",
    "ambientIntensity",
    "specularity",
    "specularIntensity",
    "normalMapScale",
    "diffuseTexture",
    "normalTexture",
    "specularTexture",
];

/// Vertex attribute names, in vertex buffer slot order.
pub const ATTRIBUTE_NAMES: [&str; 4] = [
    "vertexPosition",
    "vertexNormal",
    "vertexTangent",
    "vertexUv",
];

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Returns the first contract name missing from `source`, if any.
pub fn missing_uniform(source: &str) -> Option<&'static str> {
    UNIFORM_NAMES
        .iter()
        .copied()
        .find(|name| !source.contains(name))
}

pub fn missing_attribute(source: &str) -> Option<&'static str> {
    ATTRIBUTE_NAMES
        .iter()
        .copied()
        .find(|name| !source.contains(name))
}

/// The built-in globe program. Both stages live in one WGSL module.
pub fn globe_shader() -> ShaderSource<'static> {
    ShaderSource {
        vertex: GLOBE_SHADER,
        fragment: GLOBE_SHADER,
    }
}

/// `FrameUniforms` laid out for the WGSL `Globals` block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct GpuUniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    camera_position: [f32; 3],
    light_intensity: f32,
    light_color: [f32; 3],
    ambient_intensity: f32,
    specularity: f32,
    specular_intensity: f32,
    normal_map_scale: f32,
    _padding: f32,
}

impl From<&FrameUniforms> for GpuUniforms {
    fn from(frame: &FrameUniforms) -> Self {
        Self {
            projection: frame.projection.to_cols_array_2d(),
            view: frame.view.to_cols_array_2d(),
            normal: mat3_to_3x4(frame.normal_matrix),
            camera_position: frame.camera_position.to_array(),
            light_intensity: frame.light_intensity,
            light_color: frame.light_color.to_array(),
            ambient_intensity: frame.ambient_intensity,
            specularity: frame.specularity,
            specular_intensity: frame.specular_intensity,
            normal_map_scale: frame.normal_map_scale,
            _padding: 0.0,
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

pub const GLOBE_SHADER: &str = r#"
struct Globals {
    projectionMatrix: mat4x4<f32>,
    viewMatrix: mat4x4<f32>,
    normalMatrix: mat3x3<f32>,
    cameraPosition: vec3<f32>,
    lightIntensity: f32,
    lightColor: vec3<f32>,
    ambientIntensity: f32,
    specularity: f32,
    specularIntensity: f32,
    normalMapScale: f32,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var diffuseTexture: texture_2d<f32>;
@group(1) @binding(1)
var normalTexture: texture_2d<f32>;
@group(1) @binding(2)
var specularTexture: texture_2d<f32>;
@group(1) @binding(3)
var materialSampler: sampler;

struct VertexInput {
    @location(0) vertexPosition: vec3<f32>,
    @location(1) vertexNormal: vec3<f32>,
    @location(2) vertexTangent: vec3<f32>,
    @location(3) vertexUv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tangent: vec3<f32>,
    @location(3) uv: vec2<f32>,
    @location(4) view_normal: vec3<f32>,
}

const SUN_DIRECTION: vec3<f32> = vec3<f32>(0.8, 0.35, 0.5);

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = vec4<f32>(input.vertexPosition, 1.0);
    out.position = globals.projectionMatrix * globals.viewMatrix * world_position;
    out.world_pos = world_position.xyz;
    out.normal = input.vertexNormal;
    out.tangent = input.vertexTangent;
    out.uv = input.vertexUv;
    out.view_normal = globals.normalMatrix * input.vertexNormal;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuseTexture, materialSampler, input.uv);
    let encoded = textureSample(normalTexture, materialSampler, input.uv).xyz;
    let gloss = textureSample(specularTexture, materialSampler, input.uv).r;

    let n = normalize(input.normal);
    let t = normalize(input.tangent - n * dot(n, input.tangent));
    let b = cross(n, t);
    var detail = encoded * 2.0 - vec3<f32>(1.0);
    detail = vec3<f32>(detail.xy * globals.normalMapScale, detail.z);
    let normal = normalize(mat3x3<f32>(t, b, n) * detail);

    let light_dir = normalize(SUN_DIRECTION);
    let view_dir = normalize(globals.cameraPosition - input.world_pos);
    let halfway = normalize(light_dir + view_dir);

    let light = globals.lightColor * globals.lightIntensity;
    let diffuse = max(dot(normal, light_dir), 0.0);
    let specular = pow(max(dot(normal, halfway), 0.0), max(globals.specularity, 1.0))
        * globals.specularIntensity * gloss;

    let view_normal = normalize(input.view_normal);
    let rim = pow(1.0 - clamp(view_normal.z, 0.0, 1.0), 4.0) * globals.ambientIntensity;

    let lit = albedo.rgb * (globals.ambientIntensity + diffuse * light)
        + light * specular
        + globals.lightColor * rim;
    return vec4<f32>(lit, albedo.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globe_shader_satisfies_the_contract() {
        assert_eq!(missing_uniform(GLOBE_SHADER), None);
        assert_eq!(missing_attribute(GLOBE_SHADER), None);
        assert!(GLOBE_SHADER.contains(VERTEX_ENTRY));
        assert!(GLOBE_SHADER.contains(FRAGMENT_ENTRY));
    }

    #[test]
    fn missing_names_are_reported() {
        let stripped = GLOBE_SHADER.replace("normalMapScale", "bumpScale");
        assert_eq!(missing_uniform(&stripped), Some("normalMapScale"));
        let stripped = GLOBE_SHADER.replace("vertexTangent", "tangentIn");
        assert_eq!(missing_attribute(&stripped), Some("vertexTangent"));
    }

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<GpuUniforms>(), 224);
    }
}
