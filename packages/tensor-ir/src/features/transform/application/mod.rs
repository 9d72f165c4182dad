//! Pass adapters: lift a unit transformation to a whole module

pub mod block_adapter;
pub mod function_adapter;

pub use block_adapter::apply_dataflow_block_pass;
pub use function_adapter::apply_function_pass;

use crate::features::transform::domain::{
    ModuleTransform, Pass, PassContext, PassInfo, PassKind, PassOutput, UnitId, UnitSnapshot,
    UnitValue,
};
use crate::features::transform::errors::{PassError, PassResult};
use crate::shared::models::IRModule;

impl Pass {
    /// Apply this pass to `module`, failing atomically
    pub fn apply(&self, module: IRModule, ctx: &PassContext) -> PassResult<PassOutput> {
        match self.kind() {
            PassKind::Function(t) => apply_function_pass(self.info(), t.as_ref(), module, ctx),
            PassKind::DataflowBlock(t) => {
                apply_dataflow_block_pass(self.info(), t.as_ref(), module, ctx)
            }
            PassKind::Module(t) => apply_module_pass(self.info(), t.as_ref(), module, ctx),
        }
    }
}

pub fn apply_module_pass(
    info: &PassInfo,
    transform: &dyn ModuleTransform,
    module: IRModule,
    ctx: &PassContext,
) -> PassResult<PassOutput> {
    let keep = info.traceable || ctx.trace_all;
    let before = keep.then(|| module.clone());
    let after = transform
        .transform_module(module, ctx)
        .map_err(|err| match err.downcast::<PassError>() {
            Ok(pass_err) => *pass_err,
            Err(source) => PassError::execution(&info.name, UnitId::module(), source),
        })?;
    let snapshots = match before {
        Some(before) => vec![UnitSnapshot {
            unit: UnitId::module(),
            before: UnitValue::Module(before),
            after: UnitValue::Module(after.clone()),
        }],
        None => Vec::new(),
    };
    Ok(PassOutput {
        module: after,
        snapshots,
    })
}

/// Evaluate `f` over `items`, concurrently when asked and compiled in.
///
/// Results come back in input order either way.
pub(crate) fn evaluate<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if parallel && items.len() > 1 {
            use rayon::prelude::*;
            return items.par_iter().map(&f).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel;

    items.iter().map(&f).collect()
}
