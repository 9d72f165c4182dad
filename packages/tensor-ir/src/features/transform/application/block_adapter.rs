//! Apply a dataflow block pass to every dataflow block of every function

use super::evaluate;
use crate::features::transform::domain::{
    DataflowBlockTransform, PassContext, PassInfo, PassOutput, UnitId, UnitSnapshot, UnitValue,
};
use crate::features::transform::errors::{BoxError, PassError, PassResult};
use crate::shared::models::{BindingBlock, IRModule};

struct BlockUnit {
    function: String,
    index: usize,
    block: BindingBlock,
}

/// Visit blocks function by function in declaration order, and within a
/// function depth-first in textual order. Each result replaces its block in
/// place; nothing is written back unless every block succeeded.
pub fn apply_dataflow_block_pass(
    info: &PassInfo,
    transform: &dyn DataflowBlockTransform,
    module: IRModule,
    ctx: &PassContext,
) -> PassResult<PassOutput> {
    let mut units = Vec::new();
    for (gv, func) in module.iter() {
        for (index, block) in func.dataflow_blocks().into_iter().enumerate() {
            units.push(BlockUnit {
                function: gv.name.clone(),
                index,
                block: block.clone(),
            });
        }
    }

    let visit = |unit: &BlockUnit| -> Result<BindingBlock, BoxError> {
        tracing::trace!(
            pass = %info.name,
            function = %unit.function,
            block = unit.index,
            "visit dataflow block"
        );
        let block = transform.transform_dataflow_block(unit.block.clone(), &module, ctx)?;
        if !block.is_dataflow {
            return Err(BoxError::from("transformation returned a non-dataflow block"));
        }
        Ok(block)
    };
    let results = evaluate(&units, ctx.parallel, visit);

    let keep = info.traceable || ctx.trace_all;
    let mut rewritten: Vec<(String, Vec<BindingBlock>)> = Vec::new();
    let mut snapshots = Vec::new();
    for (unit, result) in units.into_iter().zip(results) {
        let unit_id = UnitId::block(&unit.function, unit.index);
        let after = result
            .map_err(|source| PassError::execution(&info.name, unit_id.clone(), source))?;
        if keep {
            snapshots.push(UnitSnapshot {
                unit: unit_id,
                before: UnitValue::DataflowBlock(unit.block),
                after: UnitValue::DataflowBlock(after.clone()),
            });
        }
        match rewritten.last_mut() {
            Some((name, blocks)) if *name == unit.function => blocks.push(after),
            _ => rewritten.push((unit.function, vec![after])),
        }
    }

    let mut module = module;
    for (name, blocks) in rewritten {
        let mut func = match module.get(&name) {
            Some(func) => func.clone(),
            None => continue,
        };
        let mut replacements = blocks.into_iter();
        func.try_for_each_dataflow_block_mut(&mut |slot: &mut BindingBlock| {
            if let Some(block) = replacements.next() {
                *slot = block;
            }
            Ok::<(), PassError>(())
        })?;
        module.update(&name, func);
    }
    Ok(PassOutput { module, snapshots })
}
