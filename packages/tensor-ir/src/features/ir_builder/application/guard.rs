//! Scoped frame acquisition
//!
//! `FrameGuard` closes its frame exactly once: explicitly through `close()`,
//! or by discarding it (and everything opened after it) when dropped.
//! The `with_*` helpers run a closure inside a frame and finalize on `Ok`,
//! discarding the frame on `Err`.

use super::builder::{Closed, IRBuilder};
use crate::features::ir_builder::domain::FrameId;
use crate::features::ir_builder::errors::{BuilderError, BuilderResult};
use crate::shared::models::{Expr, Function, IRModule, Var};
use std::ops::{Deref, DerefMut};

pub struct FrameGuard<'b> {
    builder: &'b mut IRBuilder,
    id: FrameId,
    closed: bool,
}

impl<'b> FrameGuard<'b> {
    fn new(builder: &'b mut IRBuilder) -> BuilderResult<Self> {
        let id = builder
            .current_id()
            .ok_or_else(|| BuilderError::frame_stack("scope", "no frame was opened"))?;
        Ok(Self {
            builder,
            id,
            closed: false,
        })
    }

    /// Finalize the guarded frame
    pub fn close(mut self) -> BuilderResult<Closed> {
        self.closed = true;
        let result = self.builder.exit_frame(self.id);
        if result.is_err() {
            // a failed finalize already popped the frame; drop whatever is left
            self.builder.discard_from(self.id);
        }
        result
    }
}

impl Deref for FrameGuard<'_> {
    type Target = IRBuilder;

    fn deref(&self) -> &IRBuilder {
        self.builder
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut IRBuilder {
        self.builder
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.builder.discard_from(self.id);
        }
    }
}

impl IRBuilder {
    pub fn module_scope(&mut self) -> BuilderResult<FrameGuard<'_>> {
        self.open_module()?;
        FrameGuard::new(self)
    }

    pub fn function_scope(&mut self, name: &str) -> BuilderResult<FrameGuard<'_>> {
        self.open_function(name)?;
        FrameGuard::new(self)
    }

    pub fn block_scope(&mut self, is_dataflow: bool) -> BuilderResult<FrameGuard<'_>> {
        self.open_block(is_dataflow)?;
        FrameGuard::new(self)
    }

    pub fn if_scope(&mut self, cond: impl Into<Expr>) -> BuilderResult<FrameGuard<'_>> {
        self.open_if(cond)?;
        FrameGuard::new(self)
    }

    pub fn then_scope(&mut self) -> BuilderResult<FrameGuard<'_>> {
        self.open_then()?;
        FrameGuard::new(self)
    }

    pub fn else_scope(&mut self) -> BuilderResult<FrameGuard<'_>> {
        self.open_else()?;
        FrameGuard::new(self)
    }

    pub fn with_module<F>(&mut self, body: F) -> BuilderResult<IRModule>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_module()?;
        match self.run_scoped(body)? {
            Closed::Module(module) => Ok(module),
            other => Err(mismatched("with_module", &other)),
        }
    }

    pub fn with_function<F>(&mut self, name: &str, body: F) -> BuilderResult<Function>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_function(name)?;
        match self.run_scoped(body)? {
            Closed::Function(func) => Ok(func),
            other => Err(mismatched("with_function", &other)),
        }
    }

    pub fn with_block<F>(&mut self, is_dataflow: bool, body: F) -> BuilderResult<()>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_block(is_dataflow)?;
        self.run_scoped(body).map(|_| ())
    }

    /// Build a full conditional; returns the var bound to its value
    pub fn with_if<F>(&mut self, cond: impl Into<Expr>, body: F) -> BuilderResult<Var>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_if(cond)?;
        match self.run_scoped(body)? {
            Closed::If(var) => Ok(var),
            other => Err(mismatched("with_if", &other)),
        }
    }

    pub fn with_then<F>(&mut self, body: F) -> BuilderResult<()>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_then()?;
        self.run_scoped(body).map(|_| ())
    }

    pub fn with_else<F>(&mut self, body: F) -> BuilderResult<()>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        self.open_else()?;
        self.run_scoped(body).map(|_| ())
    }

    /// Run `body` inside the frame just opened
    fn run_scoped<F>(&mut self, body: F) -> BuilderResult<Closed>
    where
        F: FnOnce(&mut IRBuilder) -> BuilderResult<()>,
    {
        let mut guard = FrameGuard::new(self)?;
        body(&mut *guard)?;
        guard.close()
    }
}

fn mismatched(op: &'static str, closed: &Closed) -> BuilderError {
    BuilderError::frame_stack(op, format!("closed an unexpected frame: {:?}", closed))
}
