use std::collections::BTreeMap;

use crate::math::to_gpu_matrix;

/// Uniform names understood by the model, depth and ground shadow programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Uniform {
    Matrix,
    LightingMatrix,
    NormalMatrix,
    NodeMatrix,
    LightPos,
    LightIntensity,
    LightColor,
    CameraPos,
    Opacity,
    BaseColorFactor,
    EmissiveFactor,
    MetallicFactor,
    RoughnessFactor,
    EmissiveStrength,
    ColorMix,
    /// One packed instance, 16 floats.
    Instance,
    LightMatrix0,
    LightMatrix1,
    FadeRange,
    ShadowIntensity,
    ShadowDirection,
    ShadowTexelSize,
    ShadowMap0,
    ShadowMap1,
    ShadowBias,
    GroundShadowFactor,
    BaseColorTexture,
    MetallicRoughnessTexture,
    NormalTexture,
    OcclusionTexture,
    EmissionTexture,
}

impl Uniform {
    pub fn light_matrix(cascade: usize) -> Self {
        if cascade == 0 {
            Uniform::LightMatrix0
        } else {
            Uniform::LightMatrix1
        }
    }

    pub fn shadow_map(cascade: usize) -> Self {
        if cascade == 0 {
            Uniform::ShadowMap0
        } else {
            Uniform::ShadowMap1
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
    Floats16([f32; 16]),
}

impl UniformValue {
    pub fn mat4(m: &cgmath::Matrix4<f64>) -> Self {
        UniformValue::Mat4(to_gpu_matrix(m))
    }
}

/// Uniform values keyed by name, ordered for deterministic upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Uniforms {
    values: BTreeMap<Uniform, UniformValue>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: Uniform, value: UniformValue) -> &mut Self {
        self.values.insert(name, value);
        self
    }

    pub fn with(mut self, name: Uniform, value: UniformValue) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn get(&self, name: Uniform) -> Option<&UniformValue> {
        self.values.get(&name)
    }

    pub fn contains(&self, name: Uniform) -> bool {
        self.values.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uniform, &UniformValue)> {
        self.values.iter()
    }
}
