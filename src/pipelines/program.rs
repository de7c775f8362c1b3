use std::collections::{HashMap, hash_map::Entry};

use anyhow::Context as _;

use crate::{
    context::{GraphicsContext, ProgramHandle},
    pipelines::{
        ProgramKind, ShaderDefines,
        uniform::{Uniform, UniformValue, Uniforms},
    },
};

/// A compiled program variant and the uniforms bound to it.
///
/// Bound uniforms persist between draws. Setting the same name again replaces
/// the previous value, so repeated setup for different draws never leaks state.
#[derive(Clone, Debug)]
pub struct Program {
    pub kind: ProgramKind,
    pub defines: ShaderDefines,
    pub handle: ProgramHandle,
    pub bound: Uniforms,
}

impl Program {
    pub fn set_uniform(&mut self, name: Uniform, value: UniformValue) {
        self.bound.set(name, value);
    }
}

/// Programs compiled so far, keyed by kind and define set.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<(ProgramKind, ShaderDefines), Program>,
}

impl ProgramCache {
    pub fn get_or_create(
        &mut self,
        gfx: &mut dyn GraphicsContext,
        kind: ProgramKind,
        defines: ShaderDefines,
    ) -> anyhow::Result<&mut Program> {
        match self.programs.entry((kind, defines)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                log::debug!("compiling {kind:?} program with {defines:?}");
                let handle = gfx
                    .compile_program(kind, defines)
                    .with_context(|| format!("failed to compile {kind:?} program"))?;
                Ok(entry.insert(Program {
                    kind,
                    defines,
                    handle,
                    bound: Uniforms::new(),
                }))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
