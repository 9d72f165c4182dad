//! Apply a function pass to every function of a module

use super::evaluate;
use crate::features::transform::domain::{
    FunctionTransform, PassContext, PassInfo, PassOutput, UnitId, UnitSnapshot, UnitValue,
};
use crate::features::transform::errors::{PassError, PassResult};
use crate::shared::models::{Function, IRModule};

/// Visit each function once, in declaration order.
///
/// Results are written back only after every unit succeeded; the first
/// failure in declaration order is reported.
pub fn apply_function_pass(
    info: &PassInfo,
    transform: &dyn FunctionTransform,
    module: IRModule,
    ctx: &PassContext,
) -> PassResult<PassOutput> {
    let units: Vec<(String, Function)> = module
        .iter()
        .map(|(gv, func)| (gv.name.clone(), func.clone()))
        .collect();

    let results = evaluate(&units, ctx.parallel, |(name, func)| {
        tracing::trace!(pass = %info.name, function = %name, "visit function");
        transform.transform_function(func.clone(), &module, ctx)
    });

    let keep = info.traceable || ctx.trace_all;
    let mut rewritten = Vec::with_capacity(units.len());
    let mut snapshots = Vec::new();
    for ((name, before), result) in units.into_iter().zip(results) {
        let after = result
            .map_err(|source| PassError::execution(&info.name, UnitId::function(&name), source))?;
        if keep {
            snapshots.push(UnitSnapshot {
                unit: UnitId::function(&name),
                before: UnitValue::Function(before),
                after: UnitValue::Function(after.clone()),
            });
        }
        rewritten.push((name, after));
    }

    let mut module = module;
    for (name, func) in rewritten {
        module.update(&name, func);
    }
    Ok(PassOutput { module, snapshots })
}
