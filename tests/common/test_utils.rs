#![allow(dead_code)]

use std::{cell::Cell, rc::Rc};

use cgmath::{Matrix4, Vector2, Vector3};
use model_shadows::{
    camera::FreeCamera,
    context::{
        AttachmentKind, BufferHandle, ColorMode, DepthMode, DrawCall, FramebufferHandle, GraphicsContext,
        ProgramHandle, Segment, StencilMode, TextureHandle,
    },
    data_structures::model::{AlphaMode, Material, Mesh},
    math::TILE_SIZE,
    pipelines::{ProgramKind, ShaderDefines, program::Program, uniform::Uniforms},
    style::{AmbientLight, DirectionalLight, ModelLayer, Style, StyleLayer},
    terrain::{DemSampler, DemTileKey, Terrain},
    transform::{EdgeInsets, LngLat, MapTransform, ProjectionKind, UnwrappedTileId},
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}

/// A draw as seen by the graphics backend.
#[derive(Clone, Debug)]
pub struct RecordedDraw {
    pub kind: ProgramKind,
    pub defines: ShaderDefines,
    pub layer_id: String,
    pub vertex_buffer: BufferHandle,
    pub depth_mode: DepthMode,
    pub stencil_mode: StencilMode,
    pub color_mode: ColorMode,
    pub uniforms: Uniforms,
    /// Uniforms bound to the program at draw time.
    pub bound: Uniforms,
}

/// Graphics backend that records every call.
#[derive(Debug, Default)]
pub struct RecordingGraphics {
    pub depth_textures: bool,
    pub fail_texture_creation: bool,
    pub framebuffer_binds: usize,
    pub framebuffers_created: usize,
    pub textures_created: usize,
    pub destroyed_textures: Vec<TextureHandle>,
    pub destroyed_framebuffers: Vec<FramebufferHandle>,
    pub bound_textures: Vec<(u32, TextureHandle)>,
    pub compiled: Vec<(ProgramKind, ShaderDefines)>,
    pub clears: Vec<(Option<wgpu::Color>, Option<f32>, Option<u32>)>,
    pub draws: Vec<RecordedDraw>,
    next_handle: u64,
}

impl RecordingGraphics {
    pub fn new() -> Self {
        Self {
            depth_textures: true,
            ..Default::default()
        }
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl GraphicsContext for RecordingGraphics {
    fn supports_depth_textures(&self) -> bool {
        self.depth_textures
    }

    fn create_framebuffer(
        &mut self,
        _width: u32,
        _height: u32,
        _use_color: bool,
        _kind: AttachmentKind,
    ) -> anyhow::Result<FramebufferHandle> {
        self.framebuffers_created += 1;
        Ok(FramebufferHandle(self.next()))
    }

    fn create_texture(&mut self, _desc: &wgpu::TextureDescriptor<'_>) -> anyhow::Result<TextureHandle> {
        if self.fail_texture_creation {
            anyhow::bail!("out of texture memory");
        }
        self.textures_created += 1;
        Ok(TextureHandle(self.next()))
    }

    fn attach_depth(&mut self, _framebuffer: FramebufferHandle, _texture: TextureHandle) {}

    fn attach_color(&mut self, _framebuffer: FramebufferHandle, _texture: TextureHandle) {}

    fn bind_framebuffer(&mut self, _framebuffer: Option<FramebufferHandle>) {
        self.framebuffer_binds += 1;
    }

    fn set_viewport(&mut self, _x: u32, _y: u32, _width: u32, _height: u32) {}

    fn clear(&mut self, color: Option<wgpu::Color>, depth: Option<f32>, stencil: Option<u32>) {
        self.clears.push((color, depth, stencil));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle, _sampler: &wgpu::SamplerDescriptor<'_>) {
        self.bound_textures.push((slot, texture));
    }

    fn compile_program(&mut self, kind: ProgramKind, defines: ShaderDefines) -> anyhow::Result<ProgramHandle> {
        self.compiled.push((kind, defines));
        Ok(ProgramHandle(self.next()))
    }

    fn draw(&mut self, program: &Program, call: &DrawCall<'_>) {
        self.draws.push(RecordedDraw {
            kind: program.kind,
            defines: program.defines,
            layer_id: call.layer_id.to_owned(),
            vertex_buffer: call.vertex_buffer,
            depth_mode: call.depth_mode,
            stencil_mode: call.stencil_mode.clone(),
            color_mode: call.color_mode,
            uniforms: call.uniforms.clone(),
            bound: program.bound.clone(),
        });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.destroyed_textures.push(texture);
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.destroyed_framebuffers.push(framebuffer);
    }
}

/// Perspective map camera looking at `center`.
#[derive(Clone, Debug)]
pub struct TestTransform {
    pub camera: FreeCamera,
    pub center: LngLat,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    pub fov: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub edge_insets: EdgeInsets,
    pub projection: ProjectionKind,
    pub orthographic: bool,
}

impl TestTransform {
    pub fn new(center: LngLat, zoom: f64, pitch_deg: f64, bearing_deg: f64) -> Self {
        let mut transform = Self {
            camera: FreeCamera::default(),
            center,
            zoom,
            width: 800.0,
            height: 600.0,
            fov: 0.6435011087932844,
            pitch: pitch_deg.to_radians(),
            bearing: bearing_deg.to_radians(),
            edge_insets: EdgeInsets::default(),
            projection: ProjectionKind::Mercator,
            orthographic: false,
        };
        transform.update_camera();
        transform
    }

    pub fn with_padding(mut self, insets: EdgeInsets) -> Self {
        self.edge_insets = insets;
        self
    }

    pub fn set_center(&mut self, center: LngLat) {
        self.center = center;
        self.update_camera();
    }

    /// Move the camera by a mercator offset without touching anything else.
    pub fn translate_camera(&mut self, dx: f64, dy: f64) {
        self.camera.position.x += dx;
        self.camera.position.y += dy;
    }

    fn update_camera(&mut self) {
        self.camera.set_pitch_bearing(self.pitch, self.bearing);
        let distance = self.camera_to_center_distance() / self.world_size();
        self.camera.position = self.center.to_mercator() - self.camera.forward() * distance;
    }

    fn near_far(&self) -> (f64, f64) {
        (self.height / 50.0, self.camera_to_center_distance() * 20.0)
    }
}

impl MapTransform for TestTransform {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fov(&self) -> f64 {
        self.fov
    }

    fn center_lat(&self) -> f64 {
        self.center.lat
    }

    fn center_offset(&self) -> Vector2<f64> {
        let p = self.edge_insets;
        Vector2::new((p.left - p.right) / 2.0, (p.top - p.bottom) / 2.0)
    }

    fn edge_insets(&self) -> EdgeInsets {
        self.edge_insets
    }

    fn camera_to_center_distance(&self) -> f64 {
        0.5 / (self.fov / 2.0).tan() * self.height
    }

    fn projection(&self) -> ProjectionKind {
        self.projection
    }

    fn is_orthographic(&self) -> bool {
        self.orthographic
    }

    fn camera_position(&self) -> Vector3<f64> {
        self.camera.position
    }

    fn camera_to_world_mercator(&self) -> Matrix4<f64> {
        self.camera.camera_to_world(1.0, 1.0)
    }

    fn world_to_camera(&self, world_size: f64, z_unit: f64) -> Matrix4<f64> {
        self.camera.world_to_camera(world_size, z_unit)
    }

    fn projection_matrix(&self) -> Matrix4<f64> {
        let (near, far) = self.near_far();
        let ws = self.world_size();
        let ppm = self.pixels_per_meter(self.center.lat, ws);
        self.camera_to_clip_perspective(self.fov, self.aspect(), near, far) * self.world_to_camera(ws, ppm)
    }
}

/// Elevation sampler returning a constant and counting lookups.
pub struct CountingSampler {
    pub elevation: f64,
    pub samples: Rc<Cell<usize>>,
}

impl DemSampler for CountingSampler {
    fn get_elevation_at(&self, _x: i32, _y: i32, _clamp: bool) -> f64 {
        self.samples.set(self.samples.get() + 1);
        self.elevation
    }
}

pub struct MockTerrain {
    pub exaggeration: f64,
    pub dem: Option<DemTileKey>,
    pub elevation: f64,
    pub bounds: Option<(f64, f64)>,
    pub samples: Rc<Cell<usize>>,
    /// When false the DEM tile is found but cannot be sampled.
    pub sampler_available: bool,
}

impl MockTerrain {
    pub fn new(exaggeration: f64, elevation: f64) -> Self {
        Self {
            exaggeration,
            dem: Some(DemTileKey {
                tile_id: UnwrappedTileId::new(0, 12, 2048, 1361),
                timestamp: 1,
            }),
            elevation,
            bounds: Some((0.0, elevation)),
            samples: Rc::new(Cell::new(0)),
            sampler_available: true,
        }
    }
}

impl Terrain for MockTerrain {
    fn exaggeration(&self) -> f64 {
        self.exaggeration
    }

    fn find_dem_tile_for(&self, _tile: &UnwrappedTileId) -> Option<DemTileKey> {
        self.dem
    }

    fn create_sampler(&self, _dem: &DemTileKey, _tile: &UnwrappedTileId) -> Option<Box<dyn DemSampler + '_>> {
        if !self.sampler_available {
            return None;
        }
        Some(Box::new(CountingSampler {
            elevation: self.elevation,
            samples: self.samples.clone(),
        }))
    }

    fn visible_elevation_bounds(&self) -> Option<(f64, f64)> {
        self.bounds
    }
}

#[derive(Clone, Debug, Default)]
pub struct TestStyle {
    pub layers: Vec<ModelLayer>,
    pub directional: Option<DirectionalLight>,
    pub ambient: Option<AmbientLight>,
}

impl TestStyle {
    /// One model layer and a shadow casting sun.
    pub fn with_shadows(cast_shadows: bool) -> Self {
        Self {
            layers: vec![ModelLayer::new("models", "model-source")],
            directional: Some(DirectionalLight {
                cast_shadows,
                ..Default::default()
            }),
            ambient: Some(AmbientLight::default()),
        }
    }
}

impl Style for TestStyle {
    fn layers(&self) -> Vec<&dyn StyleLayer> {
        self.layers.iter().map(|layer| layer as &dyn StyleLayer).collect()
    }

    fn directional_light(&self) -> Option<&DirectionalLight> {
        self.directional.as_ref()
    }

    fn ambient_light(&self) -> Option<&AmbientLight> {
        self.ambient.as_ref()
    }
}

/// Mesh with buffers numbered by `id`.
pub fn test_mesh(id: u64, alpha_mode: AlphaMode, centroid: Vector3<f64>) -> Mesh {
    Mesh {
        name: format!("mesh-{id}"),
        vertex_buffer: BufferHandle(id),
        index_buffer: BufferHandle(1000 + id),
        segments: vec![Segment {
            vertex_offset: 0,
            primitive_offset: 0,
            vertex_length: 3,
            primitive_length: 1,
        }],
        color_buffer: None,
        normal_buffer: None,
        tex_coord_buffer: None,
        pbr_buffer: None,
        centroid,
        material: Material {
            alpha_mode,
            ..Default::default()
        },
    }
}
