//! Draw dispatcher for model layers.
//!
//! Standalone models are traversed and sorted every frame, then drawn mesh by
//! mesh. Instanced models are drawn per tile bucket with one draw per instance,
//! the packed instance supplying the per-draw transform.

use std::collections::HashMap;

use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::{
    context::{
        ColorMode, Context, CullFaceMode, DepthMode, DrawCall, Frame, GraphicsContext, RenderPass,
        StencilMode,
    },
    data_structures::{
        instance::{InstanceBucket, InstanceRaw},
        model::{Material, Mesh},
        scene_graph::Model,
        texture::Texture,
    },
    elevation::update_bucket_elevation,
    pipelines::{
        ProgramKind, ShaderDefines, TextureSlots,
        model::{ModelUniformInput, mesh_defines, model_depth_uniform_values, model_uniform_values},
        uniform::{Uniform, UniformValue, Uniforms},
    },
    render::{SortedMeshRecord, prepare_models},
    shadows::renderer::{LayerRenderer, ShadowRenderer},
    style::{DirectionalLight, ModelLayer, StyleLayer},
    transform::{MapTransform, ProjectionKind, UnwrappedTileId},
};

/// Geometry a model source provides for its layers.
#[derive(Debug, Default)]
pub struct ModelSource {
    /// Standalone models placed by position.
    pub models: Vec<Model>,
    /// Instanced models per tile.
    pub buckets: HashMap<UnwrappedTileId, InstanceBucket>,
    /// Models referenced by instance buckets, by id.
    pub library: HashMap<String, Model>,
}

fn bind_material_texture(
    gfx: &mut dyn GraphicsContext,
    uniforms: &mut Uniforms,
    sampler: Uniform,
    slot: u32,
    texture: Option<&Texture>,
) {
    if let Some(texture) = texture {
        gfx.bind_texture(slot, texture.handle, &texture.sampler());
        uniforms.set(sampler, UniformValue::Int(slot as i32));
    }
}

/// Bind the material textures of `mesh`, point their samplers at the bound
/// units and return the defines the mesh needs.
pub fn setup_mesh_draw(gfx: &mut dyn GraphicsContext, mesh: &Mesh, uniforms: &mut Uniforms) -> ShaderDefines {
    let material: &Material = &mesh.material;
    if material.defined {
        let pbr = &material.pbr;
        bind_material_texture(
            gfx,
            uniforms,
            Uniform::BaseColorTexture,
            TextureSlots::BASE_COLOR,
            pbr.base_color_texture.as_ref(),
        );
        bind_material_texture(
            gfx,
            uniforms,
            Uniform::MetallicRoughnessTexture,
            TextureSlots::METALLIC_ROUGHNESS,
            pbr.metallic_roughness_texture.as_ref(),
        );
        bind_material_texture(
            gfx,
            uniforms,
            Uniform::NormalTexture,
            TextureSlots::NORMAL,
            material.normal_texture.as_ref(),
        );
        bind_material_texture(
            gfx,
            uniforms,
            Uniform::OcclusionTexture,
            TextureSlots::OCCLUSION,
            material.occlusion_texture.as_ref(),
        );
        bind_material_texture(
            gfx,
            uniforms,
            Uniform::EmissionTexture,
            TextureSlots::EMISSION,
            material.emissive_texture.as_ref(),
        );
    }
    mesh_defines(mesh)
}

fn cull_face_mode(material: &Material) -> CullFaceMode {
    if material.double_sided {
        CullFaceMode::DISABLED
    } else {
        CullFaceMode::BACK_CCW
    }
}

/// Per-layer state shared by every mesh draw of a frame.
struct MeshDrawParams<'a> {
    layer: &'a ModelLayer,
    light: Option<&'a DirectionalLight>,
    /// Camera position in world pixels.
    camera_position: Vector3<f64>,
    /// World space to lighting space: camera at the origin, z in pixels.
    world_to_lighting: Matrix4<f64>,
    /// Present when the meshes receive shadows.
    shadows: Option<&'a ShadowRenderer>,
}

impl<'a> MeshDrawParams<'a> {
    fn new(
        transform: &dyn MapTransform,
        layer: &'a ModelLayer,
        light: Option<&'a DirectionalLight>,
        shadows: Option<&'a ShadowRenderer>,
    ) -> Self {
        let ws = transform.world_size();
        let camera_position = transform.camera_position() * ws;
        let pixels_per_meter = transform.pixels_per_meter(transform.center_lat(), ws);
        let z_unit = if transform.projection().z_axis_in_meters() {
            pixels_per_meter
        } else {
            1.0
        };
        let z_scale = Matrix4::from_nonuniform_scale(1.0, 1.0, z_unit);
        Self {
            layer,
            light,
            camera_position,
            world_to_lighting: Matrix4::from_translation(-camera_position) * z_scale,
            shadows,
        }
    }
}

/// Issue the draw for one sorted mesh outside the shadow pass.
fn draw_mesh(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    record: &SortedMeshRecord<'_>,
    params: &MeshDrawParams<'_>,
    stencil_mode: StencilMode,
    color_mode: ColorMode,
) -> anyhow::Result<()> {
    let opacity = params.layer.paint.opacity;
    debug_assert!(opacity > 0.0, "drawing a mesh of a fully transparent layer");
    let transform = frame.transform;
    let mesh = record.mesh;
    let depth_mode = ctx.depth_mode_for_3d(true);

    let lighting_matrix = params.world_to_lighting * record.node_model_matrix;
    let mut uniforms = model_uniform_values(&ModelUniformInput {
        matrix: record.world_view_projection,
        lighting_matrix,
        node_matrix: Matrix4::identity(),
        camera_position: params.camera_position,
        opacity,
        material: &mesh.material,
        paint: &params.layer.paint,
        light: params.light,
    });

    let mut defines = setup_mesh_draw(frame.gfx, mesh, &mut uniforms);
    if params.shadows.is_some() {
        defines |= ShaderDefines::RENDER_SHADOWS | ShaderDefines::DEPTH_TEXTURE;
    }
    let program = ctx.programs.get_or_create(frame.gfx, ProgramKind::Model, defines)?;
    if let Some(shadows) = params.shadows {
        shadows.setup_shadows_from_matrix(frame.gfx, program, &record.node_model_matrix);
    }

    frame.gfx.draw(
        program,
        &DrawCall {
            primitive: wgpu::PrimitiveTopology::TriangleList,
            depth_mode,
            stencil_mode,
            color_mode,
            cull_face_mode: cull_face_mode(&mesh.material),
            uniforms,
            layer_id: &params.layer.id,
            vertex_buffer: mesh.vertex_buffer,
            index_buffer: mesh.index_buffer,
            segments: &mesh.segments,
            zoom: transform.zoom(),
            dynamic_buffers: mesh.dynamic_buffers(),
        },
    );
    Ok(())
}

/// Draw one mesh into the current shadow cascade.
fn draw_shadow_caster(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    shadows: &ShadowRenderer,
    layer: &ModelLayer,
    mesh: &Mesh,
    world_matrix: &Matrix4<f64>,
) -> anyhow::Result<()> {
    let Some(shadow_matrix) = shadows.calculate_shadow_pass_matrix_from_matrix(world_matrix) else {
        return Ok(());
    };
    let uniforms = model_depth_uniform_values(&shadow_matrix, &Matrix4::identity());
    let program = ctx
        .programs
        .get_or_create(frame.gfx, ProgramKind::ModelDepth, ShaderDefines::DEPTH_TEXTURE)?;
    frame.gfx.draw(
        program,
        &DrawCall {
            primitive: wgpu::PrimitiveTopology::TriangleList,
            depth_mode: shadows.get_shadow_pass_depth_mode(),
            stencil_mode: StencilMode::disabled(),
            color_mode: shadows.get_shadow_pass_color_mode(),
            cull_face_mode: CullFaceMode::BACK_CCW,
            uniforms,
            layer_id: &layer.id,
            vertex_buffer: mesh.vertex_buffer,
            index_buffer: mesh.index_buffer,
            segments: &mesh.segments,
            zoom: frame.transform.zoom(),
            dynamic_buffers: Vec::new(),
        },
    );
    Ok(())
}

/// Draw the standalone models of a layer.
///
/// Opaque meshes go first. With layer opacity below 1 they are drawn twice:
/// once without color to lay down depth, then with color through the 3D
/// stencil so overlapping meshes blend only once. Transparent meshes follow,
/// farthest first.
pub fn draw_models(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    shadows: &ShadowRenderer,
    layer: &ModelLayer,
    models: &mut [Model],
) -> anyhow::Result<()> {
    if matches!(ctx.render_pass, RenderPass::Opaque | RenderPass::LightBeam) {
        return Ok(());
    }
    let paint = &layer.paint;
    if paint.opacity <= 0.0 {
        return Ok(());
    }
    let is_shadow_pass = ctx.render_pass == RenderPass::Shadow;
    if is_shadow_pass && !paint.cast_shadows {
        return Ok(());
    }
    if models.is_empty() {
        return Ok(());
    }

    let transform = frame.transform;
    for model in models.iter_mut() {
        model.compute_model_matrix(transform, paint.rotation, paint.scale, paint.translation);
    }
    let models: &[Model] = models;
    let sorted = prepare_models(models, &transform.projection_matrix(), transform.is_orthographic());

    if is_shadow_pass {
        for record in sorted.opaque.iter().chain(&sorted.transparent) {
            draw_shadow_caster(ctx, frame, shadows, layer, record.mesh, &record.node_model_matrix)?;
        }
        return Ok(());
    }

    let style = frame.style;
    let receiving = (shadows.enabled() && paint.receive_shadows).then_some(shadows);
    let params = MeshDrawParams::new(transform, layer, style.directional_light(), receiving);

    if paint.opacity >= 1.0 {
        for record in &sorted.opaque {
            let color_mode = ctx.color_mode_for_render_pass();
            draw_mesh(ctx, frame, record, &params, StencilMode::disabled(), color_mode)?;
        }
    } else {
        for record in &sorted.opaque {
            draw_mesh(ctx, frame, record, &params, StencilMode::disabled(), ColorMode::DISABLED)?;
        }
        for record in &sorted.opaque {
            let stencil_mode = ctx.stencil_mode_for_3d(frame.gfx);
            let color_mode = ctx.color_mode_for_render_pass();
            draw_mesh(ctx, frame, record, &params, stencil_mode, color_mode)?;
        }
    }

    for record in &sorted.transparent {
        let color_mode = ctx.color_mode_for_render_pass();
        draw_mesh(ctx, frame, record, &params, StencilMode::disabled(), color_mode)?;
    }
    Ok(())
}

/// Draw instanced models of the buckets at `coords`.
pub fn draw_instanced_models(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    shadows: &ShadowRenderer,
    layer: &ModelLayer,
    coords: &[UnwrappedTileId],
    buckets: &mut HashMap<UnwrappedTileId, InstanceBucket>,
    library: &HashMap<String, Model>,
) -> anyhow::Result<()> {
    let transform = frame.transform;
    let projection = transform.projection();
    if projection != ProjectionKind::Mercator {
        ctx.warnings.warn(
            "instanced-models-projection",
            &format!("Drawing 3D models for {projection:?} projection is not yet implemented"),
        );
        return Ok(());
    }
    if matches!(ctx.render_pass, RenderPass::Opaque | RenderPass::LightBeam) {
        return Ok(());
    }
    let paint = &layer.paint;
    if paint.opacity <= 0.0 {
        return Ok(());
    }
    let is_shadow_pass = ctx.render_pass == RenderPass::Shadow;
    if is_shadow_pass && !paint.cast_shadows {
        return Ok(());
    }

    let style = frame.style;
    let receiving = (!is_shadow_pass && shadows.enabled() && paint.receive_shadows).then_some(shadows);
    let params = MeshDrawParams::new(transform, layer, style.directional_light(), receiving);
    let (depth_mode, color_mode) = if is_shadow_pass {
        (shadows.get_shadow_pass_depth_mode(), shadows.get_shadow_pass_color_mode())
    } else {
        (ctx.depth_mode_for_3d(true), ctx.color_mode_for_render_pass())
    };

    for coord in coords {
        let Some(bucket) = buckets.get_mut(coord) else {
            continue;
        };
        if bucket.projection != projection {
            continue;
        }
        update_bucket_elevation(bucket, frame.terrain)?;

        let matrix = if is_shadow_pass {
            match shadows.calculate_shadow_pass_matrix_from_tile(transform, coord) {
                Some(matrix) => matrix,
                None => continue,
            }
        } else {
            transform.calculate_proj_matrix(coord)
        };
        let tile = TileDraw {
            coord,
            matrix,
            depth_mode,
            color_mode,
        };

        for (model_id, instances) in &bucket.instances_per_model {
            let Some(model) = library.get(model_id) else {
                log::trace!("instanced model {model_id} is not loaded");
                continue;
            };
            let elements = instances.instanced_data.elements()?;
            if elements.is_empty() {
                continue;
            }
            for (_, node) in model.walk() {
                for mesh in &node.meshes {
                    draw_instanced_mesh(ctx, frame, &params, &tile, mesh, &node.matrix, elements)?;
                }
            }
        }
    }
    Ok(())
}

/// Per-tile state of an instanced draw.
struct TileDraw<'a> {
    coord: &'a UnwrappedTileId,
    /// Tile to clip space, or tile to light clip space in the shadow pass.
    matrix: Matrix4<f64>,
    depth_mode: DepthMode,
    color_mode: ColorMode,
}

fn draw_instanced_mesh(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    params: &MeshDrawParams<'_>,
    tile: &TileDraw<'_>,
    mesh: &Mesh,
    node_matrix: &Matrix4<f64>,
    elements: &[InstanceRaw],
) -> anyhow::Result<()> {
    let transform = frame.transform;
    let mut defines = ShaderDefines::MODEL_POSITION_ON_GPU | ShaderDefines::INSTANCED_ARRAYS;

    let (kind, uniforms, dynamic_buffers) = if ctx.render_pass == RenderPass::Shadow {
        defines |= ShaderDefines::DEPTH_TEXTURE;
        (
            ProgramKind::ModelDepth,
            model_depth_uniform_values(&tile.matrix, node_matrix),
            Vec::new(),
        )
    } else {
        let mut uniforms = model_uniform_values(&ModelUniformInput {
            matrix: tile.matrix,
            lighting_matrix: *node_matrix,
            node_matrix: *node_matrix,
            camera_position: params.camera_position,
            opacity: params.layer.paint.opacity,
            material: &mesh.material,
            paint: &params.layer.paint,
            light: params.light,
        });
        defines |= setup_mesh_draw(frame.gfx, mesh, &mut uniforms);
        if params.shadows.is_some() {
            defines |= ShaderDefines::RENDER_SHADOWS | ShaderDefines::DEPTH_TEXTURE;
        }
        (ProgramKind::Model, uniforms, mesh.dynamic_buffers())
    };

    let program = ctx.programs.get_or_create(frame.gfx, kind, defines)?;
    if let Some(shadows) = params.shadows {
        shadows.setup_shadows(frame.gfx, transform, program, tile.coord);
    }

    for instance in elements {
        let mut per_instance = uniforms.clone();
        per_instance.set(Uniform::Instance, UniformValue::Floats16(instance.data));
        frame.gfx.draw(
            program,
            &DrawCall {
                primitive: wgpu::PrimitiveTopology::TriangleList,
                depth_mode: tile.depth_mode,
                stencil_mode: StencilMode::disabled(),
                color_mode: tile.color_mode,
                cull_face_mode: cull_face_mode(&mesh.material),
                uniforms: per_instance,
                layer_id: &params.layer.id,
                vertex_buffer: mesh.vertex_buffer,
                index_buffer: mesh.index_buffer,
                segments: &mesh.segments,
                zoom: transform.zoom(),
                dynamic_buffers: dynamic_buffers.clone(),
            },
        );
    }
    Ok(())
}

/// Draw a model layer: standalone models, then instanced models.
pub fn draw_model_layer(
    ctx: &mut Context,
    frame: &mut Frame<'_>,
    shadows: &ShadowRenderer,
    layer: &ModelLayer,
    source: &mut ModelSource,
    coords: &[UnwrappedTileId],
) -> anyhow::Result<()> {
    draw_models(ctx, frame, shadows, layer, &mut source.models)?;
    if !source.buckets.is_empty() {
        draw_instanced_models(
            ctx,
            frame,
            shadows,
            layer,
            coords,
            &mut source.buckets,
            &source.library,
        )?;
    }
    Ok(())
}

/// Renders model layers into shadow cascades.
pub struct ModelLayerRenderer<'s> {
    pub ctx: &'s mut Context,
    pub layers: &'s [ModelLayer],
    pub sources: &'s mut HashMap<String, ModelSource>,
}

impl LayerRenderer for ModelLayerRenderer<'_> {
    fn render_layer(
        &mut self,
        frame: &mut Frame<'_>,
        shadows: &ShadowRenderer,
        layer: &dyn StyleLayer,
        coords: &[UnwrappedTileId],
    ) -> anyhow::Result<()> {
        let Some(model_layer) = self.layers.iter().find(|l| l.id == layer.id()) else {
            return Ok(());
        };
        let Some(source) = self.sources.get_mut(layer.source_id()) else {
            return Ok(());
        };

        let previous = self.ctx.render_pass;
        self.ctx.render_pass = RenderPass::Shadow;
        let result = draw_model_layer(self.ctx, frame, shadows, model_layer, source, coords);
        self.ctx.render_pass = previous;
        result
    }
}
