//! IRBuilder - frame-stack construction entry points
//!
//! Every `open_*` pushes a frame, every `close_*` pops and finalizes it and
//! hands the result to the frame now on top. A frame whose finalize fails is
//! discarded, so the stack is left as it was before that frame was opened.

use crate::features::ir_builder::domain::{
    BlockFrame, BranchFrame, Frame, FrameId, FrameKind, FrameStack, FunctionFrame, IfFrame,
    ModuleFrame,
};
use crate::features::ir_builder::errors::{BuilderError, BuilderResult};
use crate::features::ir_builder::infrastructure::{match_shape, OperatorTable};
use crate::features::ir_builder::ports::{StructInfo, TypeDeducer};
use crate::shared::models::{
    AttrValue, Binding, Expr, Function, GlobalVar, IRModule, PrimExpr, SeqExpr, Shape, Type,
    Var, GLOBAL_SYMBOL_ATTR,
};
use std::sync::Arc;
use tracing::debug;

/// Result of a completed top-level build session
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutput {
    Module(IRModule),
    Function { name: String, function: Function },
}

/// What a generic `exit()` produced
#[derive(Debug, Clone, PartialEq)]
pub enum Closed {
    Module(IRModule),
    Function(Function),
    Block,
    If(Var),
    Then,
    Else,
}

/// One build session. Not shareable across threads while building.
pub struct IRBuilder {
    stack: FrameStack,
    deducer: Arc<dyn TypeDeducer>,
    result: Option<BuildOutput>,
}

impl Default for IRBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IRBuilder {
    pub fn new() -> Self {
        Self::with_deducer(Arc::new(OperatorTable::new()))
    }

    pub fn with_deducer(deducer: Arc<dyn TypeDeducer>) -> Self {
        Self {
            stack: FrameStack::new(),
            deducer,
            result: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Kind of the frame on top of the stack
    pub fn current(&self) -> BuilderResult<FrameKind> {
        self.stack.current().map(Frame::kind)
    }

    pub(crate) fn current_id(&self) -> Option<FrameId> {
        self.stack.current_id()
    }

    pub(crate) fn discard_from(&mut self, id: FrameId) -> usize {
        let dropped = self.stack.discard_from(id);
        if dropped > 0 {
            debug!(dropped, "discarded unfinished frames");
        }
        dropped
    }

    /// Consume the builder and return the last finished top-level node
    pub fn finish(self) -> BuilderResult<BuildOutput> {
        if !self.stack.is_empty() {
            return Err(BuilderError::frame_stack(
                "finish",
                format!("{} frame(s) still open", self.stack.depth()),
            ));
        }
        self.result
            .ok_or_else(|| BuilderError::frame_stack("finish", "nothing was built"))
    }

    // ==================== Module ====================

    pub fn open_module(&mut self) -> BuilderResult<()> {
        self.stack.enter(Frame::Module(ModuleFrame::new()))?;
        Ok(())
    }

    /// Seal the module, resolving every global reference by name
    pub fn close_module(&mut self) -> BuilderResult<IRModule> {
        self.expect_top(FrameKind::Module, "close_module")?;
        let module = match self.stack.exit()? {
            Frame::Module(frame) => frame.finalize()?,
            other => return Err(unexpected_frame("close_module", &other)),
        };
        debug!(functions = module.len(), "sealed module");
        self.result = Some(BuildOutput::Module(module.clone()));
        Ok(module)
    }

    /// Declare a global function so it can be referenced before definition
    pub fn declare_function(&mut self, name: &str) -> BuilderResult<GlobalVar> {
        self.module_frame_mut("declare_function")?.declare(name)
    }

    /// Add an already-built function to the enclosing module
    pub fn define_function(&mut self, name: &str, func: Function) -> BuilderResult<GlobalVar> {
        self.module_frame_mut("define_function")?.define(name, func)
    }

    // ==================== Function ====================

    pub fn open_function(&mut self, name: &str) -> BuilderResult<()> {
        self.stack.enter(Frame::Function(FunctionFrame::new(name)))?;
        Ok(())
    }

    /// Add a parameter. A shape without a type implies a tensor of that rank.
    pub fn arg(
        &mut self,
        name: &str,
        ty: Option<Type>,
        shape: Option<Shape>,
    ) -> BuilderResult<Var> {
        let func = self.top_function_mut("arg")?;
        func.reserve(name)?;
        let ty = ty.or_else(|| {
            shape.as_ref().map(|s| Type::Tensor {
                ndim: Some(s.len()),
                dtype: None,
            })
        });
        let var = Var {
            name: name.to_string(),
            ty,
            shape,
            is_dataflow: false,
        };
        func.params.push(var.clone());
        func.scope.insert(var.clone());
        Ok(var)
    }

    pub fn func_attr(&mut self, key: &str, value: impl Into<AttrValue>) -> BuilderResult<()> {
        self.top_function_mut("func_attr")?
            .attrs
            .insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn func_ret_type(&mut self, ty: Type) -> BuilderResult<()> {
        let func = self.top_function_mut("func_ret_type")?;
        if func.ret_type.is_some() {
            return Err(BuilderError::frame_stack(
                "func_ret_type",
                "return type already set",
            ));
        }
        func.ret_type = Some(ty);
        Ok(())
    }

    /// Set the value of the enclosing function or branch.
    ///
    /// Legal with a Function, Then or Else frame on top, or with a plain
    /// block directly above one of them.
    pub fn set_return(&mut self, expr: impl Into<Expr>) -> BuilderResult<()> {
        let expr = self.resolve(expr.into())?;
        let depth = self.stack.depth();
        let pos = match self.stack.current_kind() {
            Some(FrameKind::Function | FrameKind::Then | FrameKind::Else) => depth - 1,
            Some(FrameKind::Block { is_dataflow: false }) if depth >= 2 => depth - 2,
            Some(kind) => {
                return Err(BuilderError::frame_stack(
                    "set_return",
                    format!("cannot set a return value inside a {} frame", kind),
                ))
            }
            None => return Err(BuilderError::frame_stack("set_return", "no active frame")),
        };
        let slot = match self.stack.get_mut(pos) {
            Some(Frame::Function(f)) => &mut f.output,
            Some(Frame::Then(b) | Frame::Else(b)) => &mut b.output,
            _ => {
                return Err(BuilderError::frame_stack(
                    "set_return",
                    "no function or branch frame to return from",
                ))
            }
        };
        if slot.is_some() {
            return Err(BuilderError::frame_stack(
                "set_return",
                "return value already set",
            ));
        }
        *slot = Some(expr);
        Ok(())
    }

    /// Finish the function. Inside a module it is also defined there under
    /// its name.
    pub fn close_function(&mut self) -> BuilderResult<Function> {
        self.close_trailing_block()?;
        self.expect_top(FrameKind::Function, "close_function")?;
        let frame = match self.stack.exit()? {
            Frame::Function(frame) => frame,
            other => return Err(unexpected_frame("close_function", &other)),
        };
        let name = frame.name.clone();
        let mut func = frame.finalize()?;
        debug!(function = %name, params = func.params.len(), blocks = func.body.blocks.len(), "finalized function");

        match self.stack.current_mut() {
            Ok(Frame::Module(module)) => {
                func.attrs
                    .insert(GLOBAL_SYMBOL_ATTR.to_string(), name.clone().into());
                module.define(&name, func.clone())?;
            }
            Ok(other) => return Err(unexpected_frame("close_function", other)),
            Err(_) => {
                self.result = Some(BuildOutput::Function {
                    name,
                    function: func.clone(),
                });
            }
        }
        Ok(func)
    }

    // ==================== Blocks ====================

    /// Open a binding block. An open plain block on top is closed first:
    /// blocks are consecutive, never nested.
    pub fn open_block(&mut self, is_dataflow: bool) -> BuilderResult<()> {
        self.close_trailing_block()?;
        self.stack.enter(Frame::Block(BlockFrame::new(is_dataflow)))?;
        Ok(())
    }

    pub fn close_block(&mut self) -> BuilderResult<()> {
        let block = match self.stack.current_kind() {
            Some(FrameKind::Block { .. }) => match self.stack.exit()? {
                Frame::Block(block) => block,
                other => return Err(unexpected_frame("close_block", &other)),
            },
            _ => return Err(self.wrong_top("close_block", "Block")),
        };
        let (block, exposed) = block.finalize()?;
        debug!(
            dataflow = block.is_dataflow,
            bindings = block.len(),
            outputs = block.output_vars.len(),
            "finalized block"
        );
        match self.stack.current_mut()? {
            Frame::Function(f) => {
                for var in exposed {
                    f.scope.insert(var);
                }
                f.blocks.push(block);
            }
            Frame::Then(b) | Frame::Else(b) => {
                for var in exposed {
                    b.scope.insert(var);
                }
                b.blocks.push(block);
            }
            other => return Err(unexpected_frame("close_block", other)),
        }
        Ok(())
    }

    fn close_trailing_block(&mut self) -> BuilderResult<()> {
        if self.stack.current_kind() == Some(FrameKind::Block { is_dataflow: false }) {
            self.close_block()?;
        }
        Ok(())
    }

    // ==================== Conditionals ====================

    pub fn open_if(&mut self, cond: impl Into<Expr>) -> BuilderResult<()> {
        let cond = self.resolve(cond.into())?;
        self.stack.enter(Frame::If(IfFrame::new(cond)))?;
        Ok(())
    }

    pub fn open_then(&mut self) -> BuilderResult<()> {
        match self.stack.current()? {
            Frame::If(frame) if frame.then_expr.is_some() => {
                return Err(BuilderError::frame_stack("open_then", "duplicate then branch"))
            }
            Frame::If(_) => {}
            _ => return Err(self.wrong_top("open_then", "If")),
        }
        self.stack.enter(Frame::Then(BranchFrame::new()))?;
        Ok(())
    }

    pub fn close_then(&mut self) -> BuilderResult<()> {
        let seq = self.close_branch(FrameKind::Then, "close_then", "then")?;
        if let Frame::If(frame) = self.stack.current_mut()? {
            frame.then_expr = Some(seq);
        }
        Ok(())
    }

    pub fn open_else(&mut self) -> BuilderResult<()> {
        match self.stack.current()? {
            Frame::If(frame) if frame.then_expr.is_none() => {
                return Err(BuilderError::frame_stack(
                    "open_else",
                    "else branch must follow a closed then branch",
                ))
            }
            Frame::If(frame) if frame.else_expr.is_some() => {
                return Err(BuilderError::frame_stack("open_else", "duplicate else branch"))
            }
            Frame::If(_) => {}
            _ => return Err(self.wrong_top("open_else", "If")),
        }
        self.stack.enter(Frame::Else(BranchFrame::new()))?;
        Ok(())
    }

    pub fn close_else(&mut self) -> BuilderResult<()> {
        let seq = self.close_branch(FrameKind::Else, "close_else", "else")?;
        if let Frame::If(frame) = self.stack.current_mut()? {
            frame.else_expr = Some(seq);
        }
        Ok(())
    }

    fn close_branch(
        &mut self,
        kind: FrameKind,
        op: &'static str,
        label: &str,
    ) -> BuilderResult<SeqExpr> {
        self.close_trailing_block()?;
        self.expect_top(kind, op)?;
        match self.stack.exit()? {
            Frame::Then(branch) | Frame::Else(branch) => branch.finalize(label),
            other => Err(unexpected_frame(op, &other)),
        }
    }

    /// Finish the conditional and bind its value to a fresh var in the
    /// enclosing block
    pub fn close_if(&mut self) -> BuilderResult<Var> {
        self.expect_top(FrameKind::If, "close_if")?;
        let expr = match self.stack.exit()? {
            Frame::If(frame) => frame.finalize()?,
            other => return Err(unexpected_frame("close_if", &other)),
        };
        let info = self.deducer.deduce(&expr)?;
        let name = self.function_frame_mut("close_if")?.fresh_name(false);
        let var = make_var(name, info, false);
        self.top_block_mut("close_if")?.push(Binding::Var {
            var: var.clone(),
            value: expr,
        });
        Ok(var)
    }

    // ==================== Generic exit ====================

    /// Close whatever frame is on top
    pub fn exit(&mut self) -> BuilderResult<Closed> {
        match self.stack.current_kind() {
            None => Err(BuilderError::frame_stack("exit", "no active frame")),
            Some(FrameKind::Module) => self.close_module().map(Closed::Module),
            Some(FrameKind::Function) => self.close_function().map(Closed::Function),
            Some(FrameKind::Block { .. }) => self.close_block().map(|_| Closed::Block),
            Some(FrameKind::If) => self.close_if().map(Closed::If),
            Some(FrameKind::Then) => self.close_then().map(|_| Closed::Then),
            Some(FrameKind::Else) => self.close_else().map(|_| Closed::Else),
        }
    }

    /// Close the frame identified by `id`.
    ///
    /// It must be on top, or directly below a trailing plain block that its
    /// own close routine ends first.
    pub(crate) fn exit_frame(&mut self, id: FrameId) -> BuilderResult<Closed> {
        let pos = self
            .stack
            .position(id)
            .ok_or_else(|| BuilderError::frame_stack("exit", "frame is no longer active"))?;
        let depth = self.stack.depth();
        let kind = self.stack.get(pos).map(Frame::kind);
        let trailing_block = depth == pos + 2
            && self.stack.current_kind() == Some(FrameKind::Block { is_dataflow: false })
            && matches!(
                kind,
                Some(FrameKind::Function | FrameKind::Then | FrameKind::Else)
            );
        if depth != pos + 1 && !trailing_block {
            return Err(BuilderError::frame_stack(
                "exit",
                "frames opened after this one are still active",
            ));
        }
        if trailing_block {
            self.close_block()?;
        }
        self.exit()
    }

    // ==================== Bindings ====================

    /// Bind `value` to a fresh var in the current block
    pub fn emit(&mut self, value: impl Into<Expr>, is_dataflow_var: bool) -> BuilderResult<Var> {
        self.emit_inner(None, value.into(), is_dataflow_var)
    }

    /// Bind `value` to a caller-chosen name
    pub fn emit_named(
        &mut self,
        name: &str,
        value: impl Into<Expr>,
        is_dataflow_var: bool,
    ) -> BuilderResult<Var> {
        self.emit_inner(Some(name), value.into(), is_dataflow_var)
    }

    fn emit_inner(
        &mut self,
        name: Option<&str>,
        value: Expr,
        is_dataflow_var: bool,
    ) -> BuilderResult<Var> {
        self.check_emit_target("emit", is_dataflow_var)?;
        let value = self.resolve(value)?;
        let info = self.deducer.deduce(&value)?;
        let name = self.claim_name("emit", name, is_dataflow_var)?;
        let var = make_var(name, info, is_dataflow_var);
        tracing::trace!(binding = %var.name, "emit");
        self.top_block_mut("emit")?.push(Binding::Var {
            var: var.clone(),
            value,
        });
        Ok(var)
    }

    /// Match the shape of `value` against `pattern`; with `emit_var` the
    /// matched value is also bound to a fresh var carrying the pattern.
    pub fn emit_match_shape(
        &mut self,
        value: impl Into<Expr>,
        pattern: Shape,
        emit_var: bool,
        is_dataflow_var: bool,
    ) -> BuilderResult<Option<Var>> {
        self.check_emit_target("emit_match_shape", emit_var && is_dataflow_var)?;
        let value = self.resolve(value.into())?;
        let info = self.deducer.deduce(&value)?;
        let is_shape_value = matches!(value, Expr::Shape(_)) || info.ty == Some(Type::Shape);
        let value_shape = match &value {
            Expr::Shape(dims) => Some(dims.clone()),
            _ if is_shape_value => None,
            _ => info.shape.clone(),
        };

        let func = self.function_frame_mut("emit_match_shape")?;
        match_shape(value_shape.as_ref(), &pattern, &mut func.symbols)?;

        let var = if emit_var {
            let name = self.claim_name("emit_match_shape", None, is_dataflow_var)?;
            let var = if is_shape_value {
                Var::new(name).with_type(Type::Shape)
            } else {
                let dtype = info.ty.as_ref().and_then(Type::dtype);
                Var::new(name)
                    .with_type(Type::Tensor {
                        ndim: Some(pattern.len()),
                        dtype,
                    })
                    .with_shape(pattern.clone())
            };
            Some(var.dataflow(is_dataflow_var))
        } else {
            None
        };
        self.top_block_mut("emit_match_shape")?
            .push(Binding::MatchShape {
                var: var.clone(),
                value,
                pattern,
            });
        Ok(var)
    }

    /// Declare outputs of the current dataflow block. Returns the vars as given.
    pub fn output(&mut self, vars: &[Var]) -> BuilderResult<Vec<Var>> {
        let block = match self.stack.current_mut() {
            Ok(Frame::Block(block)) if block.is_dataflow => block,
            _ => return Err(BuilderError::NotInDataflowBlock { op: "output" }),
        };
        for var in vars {
            if !block.scope.contains(&var.name) {
                return Err(BuilderError::UndefinedOutput {
                    var: var.name.clone(),
                });
            }
        }
        for var in vars {
            if !block.output_vars.iter().any(|v| v.name == var.name) {
                block.output_vars.push(var.clone());
            }
        }
        Ok(vars.to_vec())
    }

    /// Attach or refine the type and shape of a visible var.
    ///
    /// The refined var replaces its binding site and scope entry; later
    /// expressions resolve to it.
    pub fn annotate_type_shape(
        &mut self,
        var: &Var,
        ty: Option<Type>,
        shape: Option<Shape>,
    ) -> BuilderResult<Var> {
        let existing = self
            .lookup(&var.name)
            .cloned()
            .ok_or_else(|| BuilderError::UndefinedVar {
                name: var.name.clone(),
            })?;

        let ty = match (&existing.ty, ty) {
            (Some(old), Some(new)) => Some(
                old.unify(&new)
                    .ok_or_else(|| BuilderError::type_conflict(&existing.name, old, &new))?,
            ),
            (old, new) => new.or_else(|| old.clone()),
        };
        let shape = match (&existing.shape, shape) {
            (Some(old), Some(new)) => {
                if !shapes_compatible(old, &new) {
                    return Err(BuilderError::shape_mismatch(render(old), render(&new)));
                }
                Some(new)
            }
            (old, new) => new.or_else(|| old.clone()),
        };
        if let (Some(ndim), Some(dims)) = (ty.as_ref().and_then(Type::ndim), &shape) {
            if ndim != dims.len() {
                return Err(BuilderError::shape_mismatch(
                    format!("rank {}", ndim),
                    render(dims),
                ));
            }
        }

        let updated = Var {
            ty,
            shape,
            ..existing
        };
        let bottom = self.function_position("annotate_type_shape")?;
        for pos in bottom..self.stack.depth() {
            match self.stack.get_mut(pos) {
                Some(Frame::Function(f)) => f.update_var(&updated),
                Some(Frame::Block(b)) => b.update_var(&updated),
                Some(Frame::Then(b) | Frame::Else(b)) => b.update_var(&updated),
                _ => {}
            }
        }
        Ok(updated)
    }

    // ==================== Helpers ====================

    /// Nearest visible var named `name`, searching from the top frame down to
    /// the enclosing function
    fn lookup(&self, name: &str) -> Option<&Var> {
        for frame in self.stack.iter_from_top() {
            if let Some(var) = frame.scope().and_then(|s| s.get(name)) {
                return Some(var);
            }
            if frame.kind() == FrameKind::Function {
                break;
            }
        }
        None
    }

    /// Replace every free var of `expr` by its canonical visible copy
    fn resolve(&self, expr: Expr) -> BuilderResult<Expr> {
        expr.try_map_free_vars(&mut |var: Var| match self.lookup(&var.name) {
            Some(canonical) => Ok(Expr::Var(canonical.clone())),
            None => Err(BuilderError::UndefinedVar { name: var.name }),
        })
    }

    fn check_emit_target(&self, op: &'static str, is_dataflow_var: bool) -> BuilderResult<()> {
        match self.stack.current()? {
            Frame::Block(block) => {
                if is_dataflow_var && !block.is_dataflow {
                    return Err(BuilderError::NotInDataflowBlock { op });
                }
                Ok(())
            }
            _ => Err(self.wrong_top(op, "Block")),
        }
    }

    fn claim_name(
        &mut self,
        op: &'static str,
        name: Option<&str>,
        is_dataflow_var: bool,
    ) -> BuilderResult<String> {
        let func = self.function_frame_mut(op)?;
        match name {
            Some(name) => {
                func.reserve(name)?;
                Ok(name.to_string())
            }
            None => Ok(func.fresh_name(is_dataflow_var)),
        }
    }

    fn expect_top(&self, kind: FrameKind, op: &'static str) -> BuilderResult<()> {
        if self.stack.current_kind() == Some(kind) {
            Ok(())
        } else {
            Err(self.wrong_top(op, kind.name()))
        }
    }

    fn wrong_top(&self, op: &'static str, expected: &str) -> BuilderError {
        let found = self
            .stack
            .current_kind()
            .map(|k| k.name())
            .unwrap_or("empty stack");
        BuilderError::frame_stack(op, format!("expected a {} frame on top, found {}", expected, found))
    }

    fn top_block_mut(&mut self, op: &'static str) -> BuilderResult<&mut BlockFrame> {
        match self.stack.current_mut()? {
            Frame::Block(block) => Ok(block),
            other => Err(unexpected_frame(op, other)),
        }
    }

    fn top_function_mut(&mut self, op: &'static str) -> BuilderResult<&mut FunctionFrame> {
        if self.stack.current_kind() != Some(FrameKind::Function) {
            return Err(self.wrong_top(op, "Function"));
        }
        self.function_frame_mut(op)
    }

    fn function_position(&self, op: &'static str) -> BuilderResult<usize> {
        self.stack
            .find(FrameKind::Function)
            .ok_or_else(|| BuilderError::frame_stack(op, "no enclosing Function frame"))
    }

    fn function_frame_mut(&mut self, op: &'static str) -> BuilderResult<&mut FunctionFrame> {
        let pos = self.function_position(op)?;
        match self.stack.get_mut(pos) {
            Some(Frame::Function(f)) => Ok(f),
            _ => Err(BuilderError::frame_stack(op, "no enclosing Function frame")),
        }
    }

    fn module_frame_mut(&mut self, op: &'static str) -> BuilderResult<&mut ModuleFrame> {
        let pos = self
            .stack
            .find(FrameKind::Module)
            .ok_or_else(|| BuilderError::frame_stack(op, "no enclosing Module frame"))?;
        match self.stack.get_mut(pos) {
            Some(Frame::Module(m)) => Ok(m),
            _ => Err(BuilderError::frame_stack(op, "no enclosing Module frame")),
        }
    }
}

fn make_var(name: String, info: StructInfo, is_dataflow: bool) -> Var {
    Var {
        name,
        ty: info.ty,
        shape: info.shape,
        is_dataflow,
    }
}

fn unexpected_frame(op: &'static str, frame: &Frame) -> BuilderError {
    BuilderError::frame_stack(op, format!("unexpected {} frame", frame.kind()))
}

fn shapes_compatible(a: &[PrimExpr], b: &[PrimExpr]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (PrimExpr::Int(x), PrimExpr::Int(y)) => x == y,
            _ => true,
        })
}

fn render(dims: &[PrimExpr]) -> String {
    crate::features::ir_builder::infrastructure::operator_table::render_dims(dims)
}
