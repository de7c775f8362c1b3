//! Graphics collaborator and the owned render context.
//!
//! [`GraphicsContext`] is implemented by the embedding renderer on top of its
//! GPU backend. Render state is described with `wgpu` types so a wgpu backend
//! can map it onto pipeline descriptors directly. [`Context`] is the state this
//! crate owns across frames: program cache, current render pass, stencil ids
//! and warnings already emitted.

use std::collections::HashSet;

use crate::{
    pipelines::{ProgramKind, ShaderDefines, program::Program, program::ProgramCache, uniform::Uniforms},
    style::Style,
    terrain::Terrain,
    transform::MapTransform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u64);

/// Depth attachment flavor of a framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Renderbuffer,
    Texture,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthMode {
    pub func: wgpu::CompareFunction,
    pub write: bool,
    pub range: [f32; 2],
}

impl DepthMode {
    pub const DISABLED: DepthMode = DepthMode {
        func: wgpu::CompareFunction::Always,
        write: false,
        range: [0.0, 1.0],
    };

    pub fn new(func: wgpu::CompareFunction, write: bool, range: [f32; 2]) -> Self {
        Self { func, write, range }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StencilMode {
    pub state: wgpu::StencilState,
    pub reference: u32,
}

impl StencilMode {
    pub fn disabled() -> Self {
        Self {
            state: wgpu::StencilState::default(),
            reference: 0,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.state == wgpu::StencilState::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorMode {
    pub blend: Option<wgpu::BlendState>,
    pub write_mask: wgpu::ColorWrites,
}

impl ColorMode {
    pub const DISABLED: ColorMode = ColorMode {
        blend: None,
        write_mask: wgpu::ColorWrites::empty(),
    };

    pub const UNBLENDED: ColorMode = ColorMode {
        blend: None,
        write_mask: wgpu::ColorWrites::ALL,
    };

    pub const ALPHA_BLENDED: ColorMode = ColorMode {
        blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        write_mask: wgpu::ColorWrites::ALL,
    };

    /// Destination color multiplied by the source color.
    pub const MULTIPLY: ColorMode = ColorMode {
        blend: Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::Zero,
                operation: wgpu::BlendOperation::Add,
            },
        }),
        write_mask: wgpu::ColorWrites::ALL,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CullFaceMode {
    pub face: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
}

impl CullFaceMode {
    pub const DISABLED: CullFaceMode = CullFaceMode {
        face: None,
        front_face: wgpu::FrontFace::Ccw,
    };

    pub const BACK_CCW: CullFaceMode = CullFaceMode {
        face: Some(wgpu::Face::Back),
        front_face: wgpu::FrontFace::Ccw,
    };
}

/// A contiguous range of an index buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pub vertex_offset: u32,
    pub primitive_offset: u32,
    pub vertex_length: u32,
    pub primitive_length: u32,
}

/// Everything the graphics collaborator needs to issue one draw.
#[derive(Clone, Debug)]
pub struct DrawCall<'a> {
    pub primitive: wgpu::PrimitiveTopology,
    pub depth_mode: DepthMode,
    pub stencil_mode: StencilMode,
    pub color_mode: ColorMode,
    pub cull_face_mode: CullFaceMode,
    /// Per-draw uniforms, applied on top of the program's bound uniforms.
    pub uniforms: Uniforms,
    pub layer_id: &'a str,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub segments: &'a [Segment],
    pub zoom: f64,
    pub dynamic_buffers: Vec<BufferHandle>,
}

/// GPU backend operations used by this crate.
pub trait GraphicsContext {
    /// Depth textures can be rendered to and sampled.
    fn supports_depth_textures(&self) -> bool;

    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
        use_color: bool,
        kind: AttachmentKind,
    ) -> anyhow::Result<FramebufferHandle>;

    fn create_texture(&mut self, desc: &wgpu::TextureDescriptor<'_>) -> anyhow::Result<TextureHandle>;

    fn attach_depth(&mut self, framebuffer: FramebufferHandle, texture: TextureHandle);

    fn attach_color(&mut self, framebuffer: FramebufferHandle, texture: TextureHandle);

    /// Bind `framebuffer`, or the default target with `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    fn set_viewport(&mut self, x: u32, y: u32, width: u32, height: u32);

    fn clear(&mut self, color: Option<wgpu::Color>, depth: Option<f32>, stencil: Option<u32>);

    fn bind_texture(&mut self, slot: u32, texture: TextureHandle, sampler: &wgpu::SamplerDescriptor<'_>);

    fn compile_program(&mut self, kind: ProgramKind, defines: ShaderDefines) -> anyhow::Result<ProgramHandle>;

    fn draw(&mut self, program: &Program, call: &DrawCall<'_>);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);
}

/// The pass currently being rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Opaque,
    #[default]
    Translucent,
    Shadow,
    LightBeam,
}

/// Remembers which warnings were already logged.
#[derive(Debug, Default)]
pub struct WarnOnce {
    emitted: HashSet<String>,
}

impl WarnOnce {
    /// Log `message` unless a warning with the same key was logged before.
    /// Returns whether it was logged.
    pub fn warn(&mut self, key: &str, message: &str) -> bool {
        if self.emitted.contains(key) {
            return false;
        }
        log::warn!("{message}");
        self.emitted.insert(key.to_owned());
        true
    }

    pub fn was_emitted(&self, key: &str) -> bool {
        self.emitted.contains(key)
    }
}

/// Render state owned across frames.
#[derive(Debug)]
pub struct Context {
    pub programs: ProgramCache,
    pub render_pass: RenderPass,
    /// Depth range reserved for 3D geometry.
    pub depth_range_3d: [f32; 2],
    pub warnings: WarnOnce,
    next_stencil_id: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            programs: ProgramCache::default(),
            render_pass: RenderPass::default(),
            depth_range_3d: [0.0, 1.0],
            warnings: WarnOnce::default(),
            next_stencil_id: 1,
        }
    }

    /// Reset per-frame state. The stencil buffer is expected to be cleared to 0.
    pub fn begin_frame(&mut self) {
        self.next_stencil_id = 1;
    }

    /// Stencil mode that lets each 3D draw touch a pixel at most once.
    ///
    /// Every call takes a fresh reference id; after 255 ids the stencil buffer
    /// is cleared and numbering starts over.
    pub fn stencil_mode_for_3d(&mut self, gfx: &mut dyn GraphicsContext) -> StencilMode {
        if self.next_stencil_id > 255 {
            gfx.clear(None, None, Some(0));
            self.next_stencil_id = 1;
        }
        let reference = self.next_stencil_id;
        self.next_stencil_id += 1;

        let face = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::NotEqual,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Replace,
        };
        StencilMode {
            state: wgpu::StencilState {
                front: face,
                back: face,
                read_mask: 0xFF,
                write_mask: 0xFF,
            },
            reference,
        }
    }

    pub fn color_mode_for_render_pass(&self) -> ColorMode {
        match self.render_pass {
            RenderPass::Translucent | RenderPass::LightBeam => ColorMode::ALPHA_BLENDED,
            RenderPass::Opaque => ColorMode::UNBLENDED,
            RenderPass::Shadow => ColorMode::DISABLED,
        }
    }

    /// Depth test for 3D geometry within [`Context::depth_range_3d`].
    pub fn depth_mode_for_3d(&self, write: bool) -> DepthMode {
        DepthMode::new(wgpu::CompareFunction::LessEqual, write, self.depth_range_3d)
    }
}

/// Collaborators borrowed for the duration of one frame.
pub struct Frame<'a> {
    pub gfx: &'a mut dyn GraphicsContext,
    pub transform: &'a dyn MapTransform,
    pub style: &'a dyn Style,
    pub terrain: Option<&'a dyn Terrain>,
}
