//! Construction frames
//!
//! A frame accumulates state for one IR fragment while it sits on the frame
//! stack and turns into an immutable node when it is finalized. The parent of
//! a frame is the slot directly below it on the stack.

use crate::features::ir_builder::errors::{BuilderError, BuilderResult};
use crate::shared::models::{
    Attrs, Binding, BindingBlock, Expr, Function, GlobalVar, IRModule, PrimExpr, SeqExpr, Type,
    Var, GLOBAL_SYMBOL_ATTR,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// Variant tag of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Module,
    Function,
    Block { is_dataflow: bool },
    If,
    Then,
    Else,
}

impl FrameKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Module => "Module",
            Self::Function => "Function",
            Self::Block { is_dataflow: true } => "DataflowBlock",
            Self::Block { is_dataflow: false } => "Block",
            Self::If => "If",
            Self::Then => "Then",
            Self::Else => "Else",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vars visible in one scope, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: Vec<Var>,
    index: FxHashMap<String, usize>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<&Var> {
        self.index.get(name).map(|&i| &self.vars[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Insert or replace the canonical copy of a var
    pub fn insert(&mut self, var: Var) {
        match self.index.get(&var.name) {
            Some(&i) => self.vars[i] = var,
            None => {
                self.index.insert(var.name.clone(), self.vars.len());
                self.vars.push(var);
            }
        }
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }
}

/// Module under construction: globals may be declared before they are defined
#[derive(Debug, Default)]
pub struct ModuleFrame {
    globals: Vec<(GlobalVar, Option<Function>)>,
    index: FxHashMap<String, usize>,
}

impl ModuleFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_var(&self, name: &str) -> Option<&GlobalVar> {
        self.index.get(name).map(|&i| &self.globals[i].0)
    }

    /// Declare a global; declaring the same name twice is an error
    pub fn declare(&mut self, name: &str) -> BuilderResult<GlobalVar> {
        if self.index.contains_key(name) {
            return Err(BuilderError::DuplicateGlobal {
                name: name.to_string(),
                what: "declared",
            });
        }
        let gv = GlobalVar::declare(name);
        self.index.insert(name.to_string(), self.globals.len());
        self.globals.push((gv.clone(), None));
        Ok(gv)
    }

    /// Define a global, declaring it first when needed
    pub fn define(&mut self, name: &str, func: Function) -> BuilderResult<GlobalVar> {
        if !self.index.contains_key(name) {
            self.declare(name)?;
        }
        let slot = self.index[name];
        let entry = &mut self.globals[slot];
        if entry.1.is_some() {
            return Err(BuilderError::DuplicateGlobal {
                name: name.to_string(),
                what: "defined",
            });
        }
        let mut func = func;
        func.attrs
            .insert(GLOBAL_SYMBOL_ATTR.to_string(), name.to_string().into());
        entry.1 = Some(func);
        Ok(entry.0.clone())
    }

    /// Seal the module: every declaration must be defined and every global
    /// reference must resolve by name.
    pub fn finalize(self) -> BuilderResult<IRModule> {
        let mut entries = Vec::with_capacity(self.globals.len());
        for (gv, func) in self.globals {
            match func {
                Some(func) => entries.push((gv, func)),
                None => {
                    return Err(BuilderError::UnresolvedGlobal {
                        name: gv.name,
                        context: "declared but never defined".to_string(),
                    })
                }
            }
        }
        let mut module = IRModule::from_entries(entries);
        module.resolve_globals()?;
        Ok(module)
    }
}

/// Function under construction
#[derive(Debug)]
pub struct FunctionFrame {
    pub name: String,
    pub params: Vec<Var>,
    pub attrs: Attrs,
    pub ret_type: Option<Type>,
    pub blocks: Vec<BindingBlock>,
    pub output: Option<Expr>,
    pub scope: Scope,
    /// Every name ever declared in this function
    declared: FxHashSet<String>,
    /// Shape symbols bound by match_shape
    pub symbols: FxHashMap<String, PrimExpr>,
    next_dataflow: usize,
    next_global: usize,
}

impl FunctionFrame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            attrs: Attrs::new(),
            ret_type: None,
            blocks: Vec::new(),
            output: None,
            scope: Scope::default(),
            declared: FxHashSet::default(),
            symbols: FxHashMap::default(),
            next_dataflow: 0,
            next_global: 0,
        }
    }

    /// Reserve a caller-chosen name
    pub fn reserve(&mut self, name: &str) -> BuilderResult<()> {
        if !self.declared.insert(name.to_string()) {
            return Err(BuilderError::DuplicateVar {
                name: name.to_string(),
                function: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Reserve the next free `lv{n}` / `gv{n}` name
    pub fn fresh_name(&mut self, is_dataflow: bool) -> String {
        loop {
            let name = if is_dataflow {
                self.next_dataflow += 1;
                format!("lv{}", self.next_dataflow - 1)
            } else {
                self.next_global += 1;
                format!("gv{}", self.next_global - 1)
            };
            if self.declared.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Replace the copy of `var` stored in scope, params or finished blocks
    pub fn update_var(&mut self, var: &Var) {
        if self.scope.contains(&var.name) {
            self.scope.insert(var.clone());
        }
        for param in &mut self.params {
            if param.name == var.name {
                *param = var.clone();
            }
        }
        for block in &mut self.blocks {
            replace_bound_var(&mut block.bindings, var);
            for out in &mut block.output_vars {
                if out.name == var.name {
                    *out = var.clone();
                }
            }
        }
    }

    pub fn finalize(self) -> BuilderResult<Function> {
        let output = self.output.ok_or_else(|| BuilderError::MissingReturn {
            function: self.name.clone(),
        })?;
        let mut func = Function::new(self.params, SeqExpr::new(self.blocks, output));
        func.ret_type = self.ret_type;
        func.attrs = self.attrs;
        Ok(func)
    }
}

/// Binding block under construction
#[derive(Debug)]
pub struct BlockFrame {
    pub is_dataflow: bool,
    pub bindings: Vec<Binding>,
    pub output_vars: Vec<Var>,
    pub scope: Scope,
}

impl BlockFrame {
    pub fn new(is_dataflow: bool) -> Self {
        Self {
            is_dataflow,
            bindings: Vec::new(),
            output_vars: Vec::new(),
            scope: Scope::default(),
        }
    }

    pub fn push(&mut self, binding: Binding) {
        if let Some(var) = binding.var() {
            self.scope.insert(var.clone());
        }
        self.bindings.push(binding);
    }

    pub fn update_var(&mut self, var: &Var) {
        if self.scope.contains(&var.name) {
            self.scope.insert(var.clone());
        }
        replace_bound_var(&mut self.bindings, var);
        for out in &mut self.output_vars {
            if out.name == var.name {
                *out = var.clone();
            }
        }
    }

    /// Finish the block.
    ///
    /// Returns the block and the vars it exposes to the enclosing scope.
    /// Dataflow vars listed as outputs are rewritten as non-dataflow vars.
    pub fn finalize(self) -> BuilderResult<(BindingBlock, Vec<Var>)> {
        if self.bindings.is_empty() {
            return Err(BuilderError::EmptyBlock);
        }
        if !self.is_dataflow {
            let exposed = self.bindings.iter().filter_map(Binding::var).cloned().collect();
            return Ok((BindingBlock::plain(self.bindings), exposed));
        }

        for out in &self.output_vars {
            if !self.scope.contains(&out.name) {
                return Err(BuilderError::UndefinedOutput {
                    var: out.name.clone(),
                });
            }
        }
        let output_names: FxHashSet<&str> =
            self.output_vars.iter().map(|v| v.name.as_str()).collect();

        let mut bindings = self.bindings.clone();
        for binding in &mut bindings {
            if let Some(var) = binding.var_mut() {
                if output_names.contains(var.name.as_str()) {
                    var.is_dataflow = false;
                }
            }
            // uses of a promoted var carry the same flag as its definition
            let value = binding.value().clone();
            *binding.value_mut() = value.try_map_free_vars(&mut |var: Var| {
                let promoted = var.is_dataflow && output_names.contains(var.name.as_str());
                Ok::<Expr, BuilderError>(Expr::Var(if promoted { var.dataflow(false) } else { var }))
            })?;
        }
        let outputs: Vec<Var> = self
            .output_vars
            .iter()
            .map(|v| v.clone().dataflow(false))
            .collect();
        let exposed = bindings
            .iter()
            .filter_map(Binding::var)
            .filter(|v| !v.is_dataflow)
            .cloned()
            .collect();
        Ok((BindingBlock::dataflow(bindings, outputs), exposed))
    }
}

/// Conditional under construction
#[derive(Debug)]
pub struct IfFrame {
    pub cond: Expr,
    pub then_expr: Option<SeqExpr>,
    pub else_expr: Option<SeqExpr>,
}

impl IfFrame {
    pub fn new(cond: Expr) -> Self {
        Self {
            cond,
            then_expr: None,
            else_expr: None,
        }
    }

    pub fn finalize(self) -> BuilderResult<Expr> {
        let then_expr = self
            .then_expr
            .ok_or_else(|| BuilderError::incomplete_branch("then branch was never closed"))?;
        let else_expr = self
            .else_expr
            .ok_or_else(|| BuilderError::incomplete_branch("else branch was never closed"))?;
        Ok(Expr::If {
            cond: Box::new(self.cond),
            then_branch: Box::new(Expr::Seq(then_expr)),
            else_branch: Box::new(Expr::Seq(else_expr)),
        })
    }
}

/// Then/Else branch under construction
#[derive(Debug, Default)]
pub struct BranchFrame {
    pub blocks: Vec<BindingBlock>,
    pub output: Option<Expr>,
    pub scope: Scope,
}

impl BranchFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_var(&mut self, var: &Var) {
        if self.scope.contains(&var.name) {
            self.scope.insert(var.clone());
        }
        for block in &mut self.blocks {
            replace_bound_var(&mut block.bindings, var);
        }
    }

    /// The branch value is the explicit output, or the last var it bound
    pub fn finalize(self, branch: &str) -> BuilderResult<SeqExpr> {
        let output = match self.output {
            Some(expr) => expr,
            None => self
                .blocks
                .iter()
                .rev()
                .flat_map(|b| b.bindings.iter().rev())
                .find_map(Binding::var)
                .cloned()
                .map(Expr::Var)
                .ok_or_else(|| {
                    BuilderError::incomplete_branch(format!("{} branch produced no value", branch))
                })?,
        };
        Ok(SeqExpr::new(self.blocks, output))
    }
}

fn replace_bound_var(bindings: &mut [Binding], var: &Var) {
    for binding in bindings {
        if let Some(bound) = binding.var_mut() {
            if bound.name == var.name {
                *bound = var.clone();
            }
        }
    }
}

/// One entry of the frame stack
#[derive(Debug)]
pub enum Frame {
    Module(ModuleFrame),
    Function(FunctionFrame),
    Block(BlockFrame),
    If(IfFrame),
    Then(BranchFrame),
    Else(BranchFrame),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Module(_) => FrameKind::Module,
            Frame::Function(_) => FrameKind::Function,
            Frame::Block(b) => FrameKind::Block {
                is_dataflow: b.is_dataflow,
            },
            Frame::If(_) => FrameKind::If,
            Frame::Then(_) => FrameKind::Then,
            Frame::Else(_) => FrameKind::Else,
        }
    }

    /// Vars declared in this frame's scope, if it has one
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            Frame::Function(f) => Some(&f.scope),
            Frame::Block(b) => Some(&b.scope),
            Frame::Then(b) | Frame::Else(b) => Some(&b.scope),
            Frame::Module(_) | Frame::If(_) => None,
        }
    }
}
