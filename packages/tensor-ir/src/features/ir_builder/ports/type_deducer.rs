//! Type deduction port
//!
//! The tensor type system is an external collaborator. The builder only asks
//! it what a freshly emitted value looks like.

use crate::features::ir_builder::errors::BuilderResult;
use crate::shared::models::{Expr, Shape, Type};

/// Deduced type and shape of a value; `None` means unknown until runtime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructInfo {
    pub ty: Option<Type>,
    pub shape: Option<Shape>,
}

impl StructInfo {
    pub fn new(ty: Option<Type>, shape: Option<Shape>) -> Self {
        Self { ty, shape }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

pub trait TypeDeducer: Send + Sync {
    /// Deduce the type and shape of `expr`.
    ///
    /// Fails when the expression is statically ill-formed (e.g. operands
    /// whose concrete shapes cannot broadcast).
    fn deduce(&self, expr: &Expr) -> BuilderResult<StructInfo>;
}
