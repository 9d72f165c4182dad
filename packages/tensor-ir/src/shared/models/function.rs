//! Functions and modules

use super::error::{ModelError, ModelResult};
use super::expr::{AttrValue, Attrs, BindingBlock, GlobalVar, SeqExpr, Var};
use super::types::Type;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Attribute carrying the externally visible symbol of a module function
pub const GLOBAL_SYMBOL_ATTR: &str = "global_symbol";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub params: Vec<Var>,
    pub body: SeqExpr,
    pub ret_type: Option<Type>,
    pub attrs: Attrs,
}

impl Function {
    pub fn new(params: Vec<Var>, body: SeqExpr) -> Self {
        Self {
            params,
            body,
            ret_type: None,
            attrs: Attrs::new(),
        }
    }

    /// Symbol recorded when the function was defined in a module
    pub fn global_symbol(&self) -> Option<&str> {
        match self.attrs.get(GLOBAL_SYMBOL_ATTR) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Dataflow blocks of the body in depth-first textual order
    pub fn dataflow_blocks(&self) -> Vec<&BindingBlock> {
        let mut out = Vec::new();
        collect_dataflow(&self.body, &mut out);
        out
    }

    /// Visit every dataflow block mutably, depth-first in textual order
    pub fn try_for_each_dataflow_block_mut<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut BindingBlock) -> Result<(), E>,
    {
        self.body.try_for_each_block_mut(&mut |block: &mut BindingBlock| {
            if block.is_dataflow {
                f(block)
            } else {
                Ok(())
            }
        })
    }

    /// Names of globals referenced anywhere in the body
    pub fn referenced_globals(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.body.visit_globals(&mut |gv: &GlobalVar| {
            if !names.contains(&gv.name) {
                names.push(gv.name.clone());
            }
        });
        names
    }
}

fn collect_dataflow<'a>(seq: &'a SeqExpr, out: &mut Vec<&'a BindingBlock>) {
    use super::expr::Expr;

    fn walk_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a BindingBlock>) {
        match expr {
            Expr::Seq(seq) => collect_dataflow(seq, out),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                walk_expr(cond, out);
                walk_expr(then_branch, out);
                walk_expr(else_branch, out);
            }
            Expr::Call(call) => call.args.iter().for_each(|a| walk_expr(a, out)),
            Expr::Tuple(items) => items.iter().for_each(|a| walk_expr(a, out)),
            _ => {}
        }
    }

    for block in &seq.blocks {
        if block.is_dataflow {
            out.push(block);
        }
        for binding in &block.bindings {
            walk_expr(binding.value(), out);
        }
    }
    walk_expr(&seq.body, out);
}

/// Sealed module: functions in declaration order with a name index
#[derive(Debug, Clone, Default, Serialize)]
pub struct IRModule {
    entries: Vec<(GlobalVar, Function)>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl PartialEq for IRModule {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl IRModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(GlobalVar, Function)>) -> Self {
        let mut module = Self::new();
        for (gv, func) in entries {
            module.insert(gv, func);
        }
        module
    }

    /// Add a function, replacing an existing entry of the same name in place
    pub fn insert(&mut self, gv: GlobalVar, func: Function) {
        match self.index.get(&gv.name) {
            Some(&slot) => self.entries[slot] = (gv, func),
            None => {
                self.index.insert(gv.name.clone(), self.entries.len());
                self.entries.push((gv, func));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    pub fn global_var(&self, name: &str) -> Option<&GlobalVar> {
        self.index.get(name).map(|&slot| &self.entries[slot].0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Replace the body of an existing function; returns false if absent
    pub fn update(&mut self, name: &str, func: Function) -> bool {
        match self.index.get(name) {
            Some(&slot) => {
                self.entries[slot].1 = func;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<(GlobalVar, Function)> {
        let slot = self.index.remove(name)?;
        let removed = self.entries.remove(slot);
        for idx in self.index.values_mut() {
            if *idx > slot {
                *idx -= 1;
            }
        }
        Some(removed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GlobalVar, &Function)> {
        self.entries.iter().map(|(gv, f)| (gv, f))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(gv, _)| gv.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebind every global reference to this module's `GlobalVar` by name.
    ///
    /// Names are collected first, then each function body is rewritten. Any
    /// reference to a name the module does not define is an error and leaves
    /// the module untouched.
    pub fn resolve_globals(&mut self) -> ModelResult<()> {
        let canonical: FxHashMap<String, GlobalVar> = self
            .entries
            .iter()
            .map(|(gv, _)| (gv.name.clone(), gv.clone()))
            .collect();

        let mut rewritten = self.entries.clone();
        for (owner, func) in &mut rewritten {
            let owner_name = owner.name.clone();
            func.body.try_rewrite_globals(&mut |gv: &mut GlobalVar| {
                match canonical.get(&gv.name) {
                    Some(target) => {
                        *gv = target.clone();
                        Ok(())
                    }
                    None => Err(ModelError::UnresolvedGlobal {
                        name: gv.name.clone(),
                        referenced_from: owner_name.clone(),
                    }),
                }
            })?;
        }
        self.entries = rewritten;
        Ok(())
    }
}
