//! Per-instance data for GPU instanced models.
//!
//! Every instance is one 64 byte element of 16 `f32` lanes. Lanes 0 and 1 hold
//! the quantized tile-local position, lane 6 the elevation written by the
//! elevation updater. The remaining lanes (orientation, scale, color) are
//! produced by the bucket builder and passed through untouched.

use std::collections::BTreeMap;

use anyhow::{anyhow, ensure};

use crate::{
    terrain::DemTileKey,
    transform::{ProjectionKind, UnwrappedTileId},
};

/// Required size of one instance in bytes.
pub const INSTANCE_STRIDE: usize = 64;
/// Number of `f32` lanes per instance.
pub const INSTANCE_LANES: usize = INSTANCE_STRIDE / std::mem::size_of::<f32>();

pub const LANE_X: usize = 0;
pub const LANE_Y: usize = 1;
pub const LANE_ELEVATION: usize = 6;

/// One instance as stored on the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub data: [f32; INSTANCE_LANES],
}

impl InstanceRaw {
    pub fn at(x: u16, y: u16) -> Self {
        let mut raw = Self::default();
        raw.data[LANE_X] = x as f32;
        raw.data[LANE_Y] = y as f32;
        raw
    }

    /// Quantized tile-local position.
    pub fn tile_position(&self) -> (i32, i32) {
        (self.data[LANE_X] as i32, self.data[LANE_Y] as i32)
    }

    pub fn elevation(&self) -> f32 {
        self.data[LANE_ELEVATION]
    }

    /// Layout for renderers that upload [`InstancedDataArray::as_bytes`] as an
    /// instance-step vertex stream instead of per-draw `Instance` uniforms.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            // Four vec4 slots, same as a mat4
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Packed instance array with an explicit element stride.
///
/// Indexed access goes through [`elements`](Self::elements) or
/// [`elements_mut`](Self::elements_mut), which refuse any stride other than
/// [`INSTANCE_STRIDE`].
#[derive(Clone, Debug, PartialEq)]
pub struct InstancedDataArray {
    float32: Vec<f32>,
    bytes_per_element: usize,
}

impl Default for InstancedDataArray {
    fn default() -> Self {
        Self::new()
    }
}

impl InstancedDataArray {
    pub fn new() -> Self {
        Self {
            float32: Vec::new(),
            bytes_per_element: INSTANCE_STRIDE,
        }
    }

    /// Wrap raw lanes produced elsewhere with the stride they were written with.
    pub fn from_raw(float32: Vec<f32>, bytes_per_element: usize) -> Self {
        Self {
            float32,
            bytes_per_element,
        }
    }

    pub fn push(&mut self, instance: InstanceRaw) {
        self.float32.extend_from_slice(&instance.data);
    }

    pub fn bytes_per_element(&self) -> usize {
        self.bytes_per_element
    }

    pub fn len(&self) -> usize {
        if self.bytes_per_element == 0 {
            return 0;
        }
        self.float32.len() * std::mem::size_of::<f32>() / self.bytes_per_element
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elements(&self) -> anyhow::Result<&[InstanceRaw]> {
        self.check_stride()?;
        bytemuck::try_cast_slice(&self.float32)
            .map_err(|e| anyhow!("instance data is not a whole number of elements: {e:?}"))
    }

    pub fn elements_mut(&mut self) -> anyhow::Result<&mut [InstanceRaw]> {
        self.check_stride()?;
        bytemuck::try_cast_slice_mut(&mut self.float32)
            .map_err(|e| anyhow!("instance data is not a whole number of elements: {e:?}"))
    }

    /// Byte view for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.float32)
    }

    fn check_stride(&self) -> anyhow::Result<()> {
        ensure!(
            self.bytes_per_element == INSTANCE_STRIDE,
            "instance stride is {} bytes, expected {}",
            self.bytes_per_element,
            INSTANCE_STRIDE
        );
        Ok(())
    }
}

/// Instances of one model inside a bucket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelInstances {
    pub instanced_data: InstancedDataArray,
    /// Static elevation baseline per instance, in meters.
    pub evaluated_elevation: Vec<f32>,
}

impl ModelInstances {
    pub fn push(&mut self, instance: InstanceRaw, baseline_elevation: f32) {
        self.instanced_data.push(instance);
        self.evaluated_elevation.push(baseline_elevation);
    }
}

/// Instanced models of one tile.
#[derive(Clone, Debug)]
pub struct InstanceBucket {
    pub tile_id: UnwrappedTileId,
    pub projection: ProjectionKind,
    pub instances_per_model: BTreeMap<String, ModelInstances>,
    /// Exaggeration the elevation lanes were computed for.
    pub valid_for_exaggeration: Option<f64>,
    /// DEM tile the elevation lanes were sampled from.
    pub valid_for_dem_tile: Option<DemTileKey>,
    pub terrain_elevation_min: f64,
    pub terrain_elevation_max: f64,
    /// Instance data changed and needs to be uploaded again.
    pub dirty: bool,
}

impl InstanceBucket {
    pub fn new(tile_id: UnwrappedTileId, projection: ProjectionKind) -> Self {
        Self {
            tile_id,
            projection,
            instances_per_model: BTreeMap::new(),
            valid_for_exaggeration: None,
            valid_for_dem_tile: None,
            terrain_elevation_min: 0.0,
            terrain_elevation_max: 0.0,
            dirty: true,
        }
    }

    /// Forget cached elevation so the next update resamples.
    pub fn invalidate_elevation(&mut self) {
        self.valid_for_exaggeration = None;
        self.valid_for_dem_tile = None;
    }
}
