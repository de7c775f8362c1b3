//! Define selection and uniform values for the model programs.

use cgmath::{Matrix, Matrix4, SquareMatrix, Vector3};

use crate::{
    data_structures::model::{AlphaMode, Material, Mesh},
    pipelines::{
        ShaderDefines,
        uniform::{Uniform, UniformValue, Uniforms},
    },
    shadows::light_matrix::shadow_direction_from_properties,
    style::{DirectionalLight, ModelPaint},
};

/// Defines implied by the mesh's material and vertex attributes.
pub fn mesh_defines(mesh: &Mesh) -> ShaderDefines {
    let mut defines = material_defines(&mesh.material);
    if let Some(color) = mesh.color_buffer {
        defines |= if color.item_size == 3 {
            ShaderDefines::HAS_ATTRIBUTE_COLOR_3F
        } else {
            ShaderDefines::HAS_ATTRIBUTE_COLOR_4F
        };
    }
    if mesh.normal_buffer.is_some() {
        defines |= ShaderDefines::HAS_ATTRIBUTE_NORMAL;
    }
    if mesh.tex_coord_buffer.is_some() {
        defines |= ShaderDefines::HAS_ATTRIBUTE_UV;
    }
    if mesh.pbr_buffer.is_some() {
        defines |= ShaderDefines::HAS_ATTRIBUTE_PBR;
    }
    defines
}

pub fn material_defines(material: &Material) -> ShaderDefines {
    if !material.defined {
        return ShaderDefines::DIFFUSE_SHADED;
    }
    let mut defines = ShaderDefines::empty();
    let pbr = &material.pbr;
    if pbr.base_color_texture.is_some() {
        defines |= ShaderDefines::HAS_TEXTURE_BASE_COLOR;
    }
    if pbr.metallic_roughness_texture.is_some() {
        defines |= ShaderDefines::HAS_TEXTURE_METALLIC_ROUGHNESS;
    }
    if material.normal_texture.is_some() {
        defines |= ShaderDefines::HAS_TEXTURE_NORMAL;
    }
    if material.occlusion_texture.is_some() {
        defines |= ShaderDefines::HAS_TEXTURE_OCCLUSION;
    }
    if material.emissive_texture.is_some() {
        defines |= ShaderDefines::HAS_TEXTURE_EMISSION;
    }
    if material.alpha_mode != AlphaMode::Blend {
        defines |= ShaderDefines::UNPREMULT_TEXTURE_IN_SHADER;
    }
    defines
}

/// Inverse transpose of the upper 3x3, widened back to 4x4.
pub fn normal_matrix(m: &Matrix4<f64>) -> Matrix4<f64> {
    m.invert().map(|inv| inv.transpose()).unwrap_or_else(Matrix4::identity)
}

pub struct ModelUniformInput<'a> {
    /// Tile or model space to clip space.
    pub matrix: Matrix4<f64>,
    /// Mesh space to world space, used for lighting.
    pub lighting_matrix: Matrix4<f64>,
    pub node_matrix: Matrix4<f64>,
    pub camera_position: Vector3<f64>,
    pub opacity: f64,
    pub material: &'a Material,
    pub paint: &'a ModelPaint,
    pub light: Option<&'a DirectionalLight>,
}

pub fn model_uniform_values(input: &ModelUniformInput<'_>) -> Uniforms {
    let material = input.material;
    let pbr = &material.pbr;
    let paint = input.paint;

    let (light_pos, light_intensity, light_color) = match input.light {
        Some(light) => {
            let dir = shadow_direction_from_properties(light.direction[0], light.direction[1], 90.0);
            (
                [dir.x as f32, dir.y as f32, dir.z as f32],
                light.intensity as f32,
                [light.color[0] as f32, light.color[1] as f32, light.color[2] as f32],
            )
        }
        None => ([0.0, 0.0, 1.0], 0.0, [1.0, 1.0, 1.0]),
    };

    let emissive = material.emissive_factor;
    let mut uniforms = Uniforms::new();
    uniforms
        .set(Uniform::Matrix, UniformValue::mat4(&input.matrix))
        .set(Uniform::LightingMatrix, UniformValue::mat4(&input.lighting_matrix))
        .set(
            Uniform::NormalMatrix,
            UniformValue::mat4(&normal_matrix(&input.lighting_matrix)),
        )
        .set(Uniform::NodeMatrix, UniformValue::mat4(&input.node_matrix))
        .set(Uniform::LightPos, UniformValue::Vec3(light_pos))
        .set(Uniform::LightIntensity, UniformValue::Float(light_intensity))
        .set(Uniform::LightColor, UniformValue::Vec3(light_color))
        .set(
            Uniform::CameraPos,
            UniformValue::Vec3([
                input.camera_position.x as f32,
                input.camera_position.y as f32,
                input.camera_position.z as f32,
            ]),
        )
        .set(Uniform::Opacity, UniformValue::Float(input.opacity as f32))
        .set(Uniform::BaseColorFactor, UniformValue::Vec4(pbr.base_color_factor))
        .set(Uniform::EmissiveFactor, UniformValue::Vec3(emissive))
        .set(Uniform::MetallicFactor, UniformValue::Float(pbr.metallic_factor))
        .set(Uniform::RoughnessFactor, UniformValue::Float(pbr.roughness_factor))
        .set(
            Uniform::EmissiveStrength,
            UniformValue::Float((material.emissive_strength as f64 * (1.0 + paint.emissive_strength)) as f32),
        )
        .set(
            Uniform::ColorMix,
            UniformValue::Vec4([
                paint.color[0] as f32,
                paint.color[1] as f32,
                paint.color[2] as f32,
                paint.color_mix_intensity as f32,
            ]),
        );
    uniforms
}

/// Uniforms for the depth-only program.
pub fn model_depth_uniform_values(matrix: &Matrix4<f64>, node_matrix: &Matrix4<f64>) -> Uniforms {
    Uniforms::new()
        .with(Uniform::Matrix, UniformValue::mat4(matrix))
        .with(Uniform::NodeMatrix, UniformValue::mat4(node_matrix))
}
