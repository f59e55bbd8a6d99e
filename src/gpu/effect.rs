//! A compiled program plus its parameter table and bound values.
//!
//! Parameter names are resolved into typed [`Param`] handles once, when a
//! pass loads its programs. Per frame the pass only writes values through the
//! handles; a handle that failed to resolve is `None` and writes through it
//! are skipped, so a program variant that lacks a parameter simply ignores it.

use std::fmt;
use std::marker::PhantomData;

use glam::{Vec2, Vec4};

use super::backend::{
    DrawCall, GraphicsScope, ParamInfo, ParamKind, ParamValue, ProgramId,
    ProgramSource, TextureId,
};
use super::shader_loader::ShaderLoader;
use crate::error::BlurError;

/// Rust types that can be bound to a program parameter.
pub trait ParamType {
    /// Whether a parameter declared as `kind` can hold this type.
    fn accepts(kind: ParamKind) -> bool;
    /// Convert into the backend value representation.
    fn into_value(self) -> ParamValue;
}

impl ParamType for f32 {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Float
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Float(self)
    }
}

impl ParamType for i32 {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Int
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Int(self)
    }
}

impl ParamType for bool {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Bool
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Bool(self)
    }
}

impl ParamType for Vec2 {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Vec2
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Vec2(self)
    }
}

impl ParamType for Vec4 {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Vec4
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Vec4(self)
    }
}

impl ParamType for TextureId {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::Texture
    }
    fn into_value(self) -> ParamValue {
        ParamValue::Texture(self)
    }
}

impl<const N: usize> ParamType for [f32; N] {
    fn accepts(kind: ParamKind) -> bool {
        kind == ParamKind::FloatArray(N)
    }
    fn into_value(self) -> ParamValue {
        ParamValue::FloatArray(self.to_vec())
    }
}

/// Resolved, typed handle to one parameter of an [`Effect`].
pub struct Param<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Param<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Param<T> {}

impl<T> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Param").field(&self.index).finish()
    }
}

/// A compiled program with persistent parameter values.
#[derive(Debug)]
pub struct Effect {
    name: String,
    program: ProgramId,
    table: Vec<ParamInfo>,
    values: Vec<Option<ParamValue>>,
}

impl Effect {
    /// Load `name` through `loader` and compile it.
    ///
    /// A missing file or a compile failure is logged and yields `None`; the
    /// caller treats that as "this program draws nothing".
    pub fn load(
        gfx: &mut GraphicsScope<'_>,
        loader: &ShaderLoader,
        name: &str,
    ) -> Option<Self> {
        let result =
            loader.load(name).and_then(|source| Self::compile(gfx, &source));
        match result {
            Ok(effect) => Some(effect),
            Err(e) => {
                log::warn!("unable to load program '{name}': {e}");
                None
            }
        }
    }

    /// Compile already-expanded source.
    ///
    /// # Errors
    ///
    /// Propagates the backend's compile error.
    pub fn compile(
        gfx: &mut GraphicsScope<'_>,
        source: &ProgramSource,
    ) -> Result<Self, BlurError> {
        let program = gfx.compile_program(source)?;
        let table = gfx
            .program_params(program)
            .map(<[ParamInfo]>::to_vec)
            .ok_or(BlurError::UnknownProgram(program))?;
        log::debug!(
            "compiled program '{}' ({} parameters)",
            source.name,
            table.len()
        );
        Ok(Self {
            name: source.name.clone(),
            program,
            values: vec![None; table.len()],
            table,
        })
    }

    /// Program name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a parameter by name. Linear scan; call at load time only.
    ///
    /// Returns `None` when the program has no such parameter or declares it
    /// with an incompatible type.
    #[must_use]
    pub fn param<T: ParamType>(&self, name: &str) -> Option<Param<T>> {
        let index = self.table.iter().position(|p| p.name == name)?;
        if !T::accepts(self.table[index].kind) {
            log::warn!(
                "program '{}': parameter '{name}' is declared as {:?}",
                self.name,
                self.table[index].kind
            );
            return None;
        }
        Some(Param {
            index,
            _marker: PhantomData,
        })
    }

    /// Bind `value` through `param`; a `None` handle is a no-op.
    pub fn set<T: ParamType>(&mut self, param: Option<Param<T>>, value: T) {
        let Some(param) = param else {
            return;
        };
        if let Some(slot) = self.values.get_mut(param.index) {
            *slot = Some(value.into_value());
        }
    }

    /// Return `param` to its zero value; textures fall back to the dummy.
    pub fn unset<T: ParamType>(&mut self, param: Option<Param<T>>) {
        if let Some(slot) = param.and_then(|p| self.values.get_mut(p.index)) {
            *slot = None;
        }
    }

    /// Draw the program over `target` with the currently bound values.
    ///
    /// # Errors
    ///
    /// Propagates backend draw errors.
    pub fn draw(
        &self,
        gfx: &mut GraphicsScope<'_>,
        target: TextureId,
    ) -> Result<(), BlurError> {
        gfx.draw(&DrawCall {
            program: self.program,
            target,
            values: &self.values,
        })
    }

    /// Release the program.
    pub fn destroy(self, gfx: &mut GraphicsScope<'_>) {
        gfx.destroy_program(self.program);
    }
}
