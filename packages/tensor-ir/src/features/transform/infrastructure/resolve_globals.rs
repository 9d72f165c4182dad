//! Rebind global references by name

use crate::features::transform::domain::{ModuleTransform, Pass, PassContext, PassInfo};
use crate::features::transform::errors::{BoxError, PassError};
use crate::shared::models::{IRModule, ModelError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveGlobals;

impl ModuleTransform for ResolveGlobals {
    fn transform_module(&self, module: IRModule, _ctx: &PassContext) -> Result<IRModule, BoxError> {
        let mut module = module;
        module.resolve_globals().map_err(|err| match err {
            ModelError::UnresolvedGlobal {
                name,
                referenced_from,
            } => PassError::UnresolvedGlobal {
                name,
                referenced_from,
            },
            other => PassError::Model(other),
        })?;
        Ok(module)
    }
}

/// Module pass rewriting every `GlobalVar` reference to the module's own
/// `GlobalVar` of the same name
pub fn resolve_globals() -> Pass {
    Pass::module(PassInfo::new("ResolveGlobals", 0), ResolveGlobals)
}
