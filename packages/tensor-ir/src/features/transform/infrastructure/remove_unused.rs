//! Drop functions unreachable from the entry points

use crate::features::transform::domain::{ModuleTransform, Pass, PassContext, PassInfo};
use crate::features::transform::errors::BoxError;
use crate::shared::models::IRModule;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

pub const DEFAULT_ENTRY: &str = "main";

#[derive(Debug, Clone)]
pub struct RemoveUnusedFunctions {
    entries: Vec<String>,
}

impl RemoveUnusedFunctions {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }
}

impl Default for RemoveUnusedFunctions {
    fn default() -> Self {
        Self::new(vec![DEFAULT_ENTRY.to_string()])
    }
}

impl ModuleTransform for RemoveUnusedFunctions {
    fn transform_module(&self, module: IRModule, _ctx: &PassContext) -> Result<IRModule, BoxError> {
        let mut reachable: FxHashSet<String> = FxHashSet::default();
        let mut queue: VecDeque<String> = VecDeque::new();
        for entry in &self.entries {
            if module.contains(entry) {
                if reachable.insert(entry.clone()) {
                    queue.push_back(entry.clone());
                }
            } else {
                tracing::warn!(entry = %entry, "entry function not in module");
            }
        }

        while let Some(name) = queue.pop_front() {
            let callees = match module.get(&name) {
                Some(func) => func.referenced_globals(),
                None => continue,
            };
            for callee in callees {
                if module.contains(&callee) && reachable.insert(callee.clone()) {
                    queue.push_back(callee);
                }
            }
        }

        let mut module = module;
        for name in module.names() {
            if !reachable.contains(&name) {
                tracing::debug!(function = %name, "removing unreachable function");
                module.remove(&name);
            }
        }
        Ok(module)
    }
}

/// Module pass keeping only functions reachable from `entries`, or from
/// `main` when `entries` is `None`
pub fn remove_unused_functions(entries: Option<Vec<String>>) -> Pass {
    let transform = entries
        .map(RemoveUnusedFunctions::new)
        .unwrap_or_default();
    Pass::module(PassInfo::new("RemoveUnusedFunctions", 0), transform)
}
