//! Shadow cascade manager.
//!
//! Owns the cascades, recomputes them once per frame and hands their matrices
//! and depth textures to the programs that receive shadows.

use std::collections::HashMap;

use anyhow::Context as _;
use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{
    context::{
        AttachmentKind, ColorMode, Context, CullFaceMode, DepthMode, DrawCall, Frame, GraphicsContext,
        Segment, StencilMode, BufferHandle,
    },
    data_structures::texture::{shadow_debug_color_descriptor, shadow_map_descriptor, shadow_sampler},
    math::{Aabb, Frustum, Intersection},
    pipelines::{
        ProgramKind, ShaderDefines, TextureSlots,
        ground_shadow::ground_shadow_factor,
        program::Program,
        uniform::{Uniform, UniformValue, Uniforms},
    },
    shadows::{
        cascade::{MAX_CASCADES, ShadowCascade, ShadowParameters},
        light_matrix::{create_light_matrix, shadow_direction_from_properties},
    },
    style::StyleLayer,
    transform::{MapTransform, UnwrappedTileId},
};

/// Draws the geometry of one layer into the cascade currently being rendered.
pub trait LayerRenderer {
    fn render_layer(
        &mut self,
        frame: &mut Frame<'_>,
        shadows: &ShadowRenderer,
        layer: &dyn StyleLayer,
        coords: &[UnwrappedTileId],
    ) -> anyhow::Result<()>;
}

/// Tile-sized ground quad in tile-local coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundQuad {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub segments: Vec<Segment>,
}

#[derive(Debug)]
pub struct ShadowRenderer {
    pub params: ShadowParameters,
    cascades: Vec<ShadowCascade>,
    enabled: bool,
    shadow_layer_count: usize,
    current_cascade: usize,
    shadow_direction: Vector3<f64>,
    /// Uniforms shared by every shadow receiving program.
    uniforms: Uniforms,
}

impl Default for ShadowRenderer {
    fn default() -> Self {
        Self::new(ShadowParameters::default())
    }
}

impl ShadowRenderer {
    pub fn new(params: ShadowParameters) -> Self {
        Self {
            params,
            cascades: Vec::new(),
            enabled: false,
            shadow_layer_count: 0,
            current_cascade: 0,
            shadow_direction: Vector3::new(0.0, 0.0, 1.0),
            uniforms: Uniforms::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Visible layers that render into shadow maps.
    pub fn shadow_layer_count(&self) -> usize {
        self.shadow_layer_count
    }

    pub fn cascades(&self) -> &[ShadowCascade] {
        &self.cascades
    }

    pub fn current_cascade(&self) -> usize {
        self.current_cascade
    }

    pub fn shadow_direction(&self) -> Vector3<f64> {
        self.shadow_direction
    }

    /// Recompute cascades for this frame.
    ///
    /// Cascade resources are allocated the first time shadows are enabled and
    /// reused afterwards.
    pub fn update_shadow_parameters(&mut self, frame: &mut Frame<'_>) -> anyhow::Result<()> {
        let transform = frame.transform;
        let style = frame.style;
        let zoom = transform.zoom();

        self.shadow_layer_count = style
            .layers()
            .iter()
            .filter(|layer| layer.has_shadow_pass() && !layer.is_hidden(zoom))
            .count();

        let light = style
            .directional_light()
            .filter(|light| light.cast_shadows && light.shadow_intensity > 0.0);
        self.enabled = frame.gfx.supports_depth_textures() && light.is_some() && self.shadow_layer_count > 0;

        let Some(light) = light.filter(|_| self.enabled) else {
            return Ok(());
        };

        if self.cascades.is_empty() {
            if let Err(err) = self.allocate_cascades(frame.gfx) {
                self.enabled = false;
                return Err(err);
            }
        }

        self.shadow_direction = shadow_direction_from_properties(
            light.direction[0],
            light.direction[1],
            self.params.max_polar_angle,
        );

        let vertical_range = frame
            .terrain
            .and_then(|terrain| {
                terrain
                    .visible_elevation_bounds()
                    .map(|(min, max)| (max - min).max(0.0) * terrain.exaggeration())
            })
            .unwrap_or(0.0);

        let ranges = self
            .params
            .cascade_ranges(transform.camera_to_center_distance(), transform.height());
        let ws = transform.world_size();
        let resolution = self.params.resolution();
        for (cascade, (near, far)) in self.cascades.iter_mut().zip(ranges) {
            cascade.matrix = create_light_matrix(
                transform,
                self.shadow_direction,
                near,
                far,
                resolution,
                vertical_range,
            );
            if let Some(inv) = cascade.matrix.invert() {
                cascade.frustum = Frustum::from_inv_projection_matrix(&inv, ws, 0.0, true);
            }
            cascade.near = near;
            cascade.far = far;
        }

        let fade_end = self.cascades.last().map_or(0.0, |cascade| cascade.far);
        let dir = self.shadow_direction;
        self.uniforms = Uniforms::new()
            .with(
                Uniform::FadeRange,
                UniformValue::Vec2([(self.params.fade_start * fade_end) as f32, fade_end as f32]),
            )
            .with(Uniform::ShadowIntensity, UniformValue::Float(light.shadow_intensity as f32))
            .with(
                Uniform::ShadowDirection,
                UniformValue::Vec3([dir.x as f32, dir.y as f32, dir.z as f32]),
            )
            .with(Uniform::ShadowTexelSize, UniformValue::Float(1.0 / resolution as f32));
        for cascade in 0..MAX_CASCADES {
            self.uniforms.set(
                Uniform::shadow_map(cascade),
                UniformValue::Int(TextureSlots::shadow_map(cascade) as i32),
            );
        }

        log::trace!("shadow cascades updated, vertical range {vertical_range}");
        Ok(())
    }

    fn allocate_cascades(&mut self, gfx: &mut dyn GraphicsContext) -> anyhow::Result<()> {
        let count = self.params.cascade_count.min(MAX_CASCADES);
        let mut created = Vec::with_capacity(count);
        for i in 0..count {
            match self.create_cascade(gfx) {
                Ok(cascade) => created.push(cascade),
                Err(err) => {
                    created.into_iter().for_each(|cascade| release_cascade(gfx, cascade));
                    return Err(err).with_context(|| format!("failed to allocate shadow cascade {i}"));
                }
            }
        }
        log::debug!(
            "allocated {count} shadow cascades at {}px",
            self.params.resolution()
        );
        self.cascades = created;
        Ok(())
    }

    fn create_cascade(&self, gfx: &mut dyn GraphicsContext) -> anyhow::Result<ShadowCascade> {
        let resolution = self.params.resolution();
        let framebuffer =
            gfx.create_framebuffer(resolution, resolution, self.params.debug, AttachmentKind::Texture)?;
        let texture = match gfx.create_texture(&shadow_map_descriptor(resolution)) {
            Ok(texture) => texture,
            Err(err) => {
                gfx.destroy_framebuffer(framebuffer);
                return Err(err);
            }
        };
        gfx.attach_depth(framebuffer, texture);

        let mut color_texture = None;
        if self.params.debug {
            match gfx.create_texture(&shadow_debug_color_descriptor(resolution)) {
                Ok(color) => {
                    gfx.attach_color(framebuffer, color);
                    color_texture = Some(color);
                }
                Err(err) => {
                    gfx.destroy_texture(texture);
                    gfx.destroy_framebuffer(framebuffer);
                    return Err(err);
                }
            }
        }
        Ok(ShadowCascade::new(framebuffer, texture, color_texture))
    }

    /// Render every shadow casting layer into every cascade.
    pub fn draw_shadow_pass(
        &mut self,
        frame: &mut Frame<'_>,
        coords_by_source: &HashMap<String, Vec<UnwrappedTileId>>,
        renderer: &mut dyn LayerRenderer,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let result = self.render_cascades(frame, coords_by_source, renderer);
        self.current_cascade = 0;
        result
    }

    fn render_cascades(
        &mut self,
        frame: &mut Frame<'_>,
        coords_by_source: &HashMap<String, Vec<UnwrappedTileId>>,
        renderer: &mut dyn LayerRenderer,
    ) -> anyhow::Result<()> {
        let style = frame.style;
        let zoom = frame.transform.zoom();
        let layers = style.layers();
        let resolution = self.params.resolution();
        let clear_color = self.params.debug.then_some(wgpu::Color::WHITE);

        for i in 0..self.cascades.len() {
            self.current_cascade = i;
            frame.gfx.bind_framebuffer(Some(self.cascades[i].framebuffer));
            frame.gfx.set_viewport(0, 0, resolution, resolution);
            frame.gfx.clear(clear_color, Some(1.0), None);

            for layer in &layers {
                if !layer.has_shadow_pass() || layer.is_hidden(zoom) {
                    continue;
                }
                let coords = coords_by_source
                    .get(layer.source_id())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                if coords.is_empty() && !layer.is_model_layer() {
                    continue;
                }
                renderer
                    .render_layer(frame, self, *layer, coords)
                    .with_context(|| format!("shadow pass of layer {}", layer.id()))?;
            }
        }
        Ok(())
    }

    /// Darken shadowed ground by the ambient to directional light ratio.
    pub fn draw_ground_shadows(
        &self,
        ctx: &mut Context,
        frame: &mut Frame<'_>,
        tiles: &[UnwrappedTileId],
        quad: &GroundQuad,
    ) -> anyhow::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let style = frame.style;
        let (Some(directional), Some(ambient)) = (style.directional_light(), style.ambient_light()) else {
            return Ok(());
        };
        let factor = ground_shadow_factor(directional, ambient);
        let transform = frame.transform;
        let depth_mode = ctx.depth_mode_for_3d(false);

        let program = ctx.programs.get_or_create(
            frame.gfx,
            ProgramKind::GroundShadow,
            ShaderDefines::RENDER_SHADOWS | ShaderDefines::DEPTH_TEXTURE,
        )?;

        for tile in tiles {
            self.setup_shadows(frame.gfx, transform, program, tile);
            let uniforms = Uniforms::new()
                .with(Uniform::Matrix, UniformValue::mat4(&transform.calculate_proj_matrix(tile)))
                .with(
                    Uniform::GroundShadowFactor,
                    UniformValue::Vec3([factor[0] as f32, factor[1] as f32, factor[2] as f32]),
                );
            frame.gfx.draw(
                program,
                &DrawCall {
                    primitive: wgpu::PrimitiveTopology::TriangleList,
                    depth_mode,
                    stencil_mode: StencilMode::disabled(),
                    color_mode: ColorMode::MULTIPLY,
                    cull_face_mode: CullFaceMode::DISABLED,
                    uniforms,
                    layer_id: "ground-shadow",
                    vertex_buffer: quad.vertex_buffer,
                    index_buffer: quad.index_buffer,
                    segments: &quad.segments,
                    zoom: transform.zoom(),
                    dynamic_buffers: Vec::new(),
                },
            );
        }
        Ok(())
    }

    /// Bind shadow state for geometry in `tile`'s coordinates.
    pub fn setup_shadows(
        &self,
        gfx: &mut dyn GraphicsContext,
        transform: &dyn MapTransform,
        program: &mut Program,
        tile: &UnwrappedTileId,
    ) {
        let world = transform.calculate_pos_matrix(tile, transform.world_size());
        self.setup_shadows_from_matrix(gfx, program, &world);
    }

    /// Bind shadow state for geometry transformed to world space by `world_matrix`.
    ///
    /// Depends only on the arguments and the cascades of the current frame, so
    /// it can be repeated for any number of draws.
    pub fn setup_shadows_from_matrix(
        &self,
        gfx: &mut dyn GraphicsContext,
        program: &mut Program,
        world_matrix: &Matrix4<f64>,
    ) {
        if !self.enabled {
            return;
        }
        let sampler = shadow_sampler();
        for (i, cascade) in self.cascades.iter().enumerate() {
            program.set_uniform(
                Uniform::light_matrix(i),
                UniformValue::mat4(&(cascade.matrix * world_matrix)),
            );
            gfx.bind_texture(TextureSlots::shadow_map(i), cascade.texture, &sampler);
        }
        program.set_uniform(Uniform::ShadowBias, UniformValue::Vec3(self.params.shadow_bias));
        for (name, value) in self.uniforms.iter() {
            program.set_uniform(*name, *value);
        }
    }

    /// Light matrix of the current cascade applied to a tile.
    pub fn calculate_shadow_pass_matrix_from_tile(
        &self,
        transform: &dyn MapTransform,
        tile: &UnwrappedTileId,
    ) -> Option<Matrix4<f64>> {
        let world = transform.calculate_pos_matrix(tile, transform.world_size());
        self.calculate_shadow_pass_matrix_from_matrix(&world)
    }

    pub fn calculate_shadow_pass_matrix_from_matrix(&self, world_matrix: &Matrix4<f64>) -> Option<Matrix4<f64>> {
        self.cascades
            .get(self.current_cascade)
            .map(|cascade| cascade.matrix * world_matrix)
    }

    pub fn get_shadow_pass_color_mode(&self) -> ColorMode {
        if self.params.debug {
            ColorMode::UNBLENDED
        } else {
            ColorMode::DISABLED
        }
    }

    pub fn get_shadow_pass_depth_mode(&self) -> DepthMode {
        DepthMode::new(wgpu::CompareFunction::LessEqual, true, [0.0, 1.0])
    }

    pub fn get_current_cascade_frustum(&self) -> Option<&Frustum> {
        self.cascades.get(self.current_cascade).map(|cascade| &cascade.frustum)
    }

    /// One past the farthest cascade the box intersects, 0 when it misses all.
    pub fn get_max_cascade_for_tile(&self, bounds: &Aabb) -> usize {
        self.cascades
            .iter()
            .rposition(|cascade| bounds.intersects_frustum(&cascade.frustum) != Intersection::Outside)
            .map_or(0, |i| i + 1)
    }

    /// Release every cascade. Calling it again does nothing.
    pub fn destroy(&mut self, gfx: &mut dyn GraphicsContext) {
        for cascade in self.cascades.drain(..) {
            release_cascade(gfx, cascade);
        }
        self.enabled = false;
        self.current_cascade = 0;
    }
}

fn release_cascade(gfx: &mut dyn GraphicsContext, cascade: ShadowCascade) {
    gfx.destroy_texture(cascade.texture);
    if let Some(color) = cascade.color_texture {
        gfx.destroy_texture(color);
    }
    gfx.destroy_framebuffer(cascade.framebuffer);
}
