//! Replace function parameters with embedded constants

use crate::features::transform::domain::{ModuleTransform, Pass, PassContext, PassInfo};
use crate::features::transform::errors::{BoxError, PassError};
use crate::shared::models::{Constant, Expr, IRModule, PrimExpr, Var};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct BindParams {
    function: String,
    params: FxHashMap<String, Constant>,
}

impl BindParams {
    pub fn new(function: impl Into<String>, params: FxHashMap<String, Constant>) -> Self {
        Self {
            function: function.into(),
            params,
        }
    }

    fn check(&self, param: &Var, value: &Constant) -> Result<(), PassError> {
        let fail = |reason: String| PassError::ParamBinding {
            function: self.function.clone(),
            param: param.name.clone(),
            reason,
        };
        if let Some(ty) = &param.ty {
            if let Some(dtype) = ty.dtype() {
                if dtype != value.dtype {
                    return Err(fail(format!("expected {}, got {}", dtype, value.dtype)));
                }
            }
            if let Some(ndim) = ty.ndim() {
                if ndim != value.shape.len() {
                    return Err(fail(format!(
                        "expected rank {}, got rank {}",
                        ndim,
                        value.shape.len()
                    )));
                }
            }
        }
        if let Some(shape) = &param.shape {
            let concrete_mismatch = shape.len() != value.shape.len()
                || shape.iter().zip(&value.shape).any(|(dim, actual)| match dim {
                    PrimExpr::Int(expected) => expected != actual,
                    PrimExpr::Sym(_) => false,
                });
            if concrete_mismatch {
                return Err(fail(format!("shape {:?} does not fit", value.shape)));
            }
        }
        Ok(())
    }
}

impl ModuleTransform for BindParams {
    fn transform_module(&self, module: IRModule, _ctx: &PassContext) -> Result<IRModule, BoxError> {
        let mut func = module
            .get(&self.function)
            .cloned()
            .ok_or_else(|| PassError::UnknownFunction(self.function.clone()))?;

        let mut bound: FxHashMap<String, Constant> = FxHashMap::default();
        for param in &func.params {
            if let Some(value) = self.params.get(&param.name) {
                self.check(param, value)?;
                bound.insert(param.name.clone(), value.clone());
            }
        }
        if bound.is_empty() {
            tracing::debug!(function = %self.function, "no parameter matched");
            return Ok(module);
        }

        func.params.retain(|p| !bound.contains_key(&p.name));
        func.body = func.body.try_map_free_vars(&mut |var: Var| {
            Ok::<Expr, PassError>(match bound.get(&var.name) {
                Some(constant) => Expr::Constant(constant.clone()),
                None => Expr::Var(var),
            })
        })?;
        tracing::debug!(function = %self.function, bound = bound.len(), "bound parameters");

        let mut module = module;
        module.update(&self.function, func);
        Ok(module)
    }
}

/// Module pass embedding `params` into `function`.
///
/// Names that match no parameter are ignored.
pub fn bind_params(function: impl Into<String>, params: FxHashMap<String, Constant>) -> Pass {
    Pass::module(PassInfo::new("BindParams", 0), BindParams::new(function, params))
}
