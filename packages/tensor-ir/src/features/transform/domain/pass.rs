//! Pass - metadata plus one transformation over a fixed unit granularity
//!
//! A pass is built either from a plain callable or from a stateful instance
//! and one of its methods. Both produce the same `Pass` value.

use super::pass_info::{PassContext, PassInfo};
use crate::features::transform::errors::BoxError;
use crate::shared::models::{BindingBlock, Function, IRModule};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_CLOSURE_PASS: AtomicUsize = AtomicUsize::new(0);

/// Whole-function transformation
pub trait FunctionTransform: Send + Sync {
    fn transform_function(
        &self,
        func: Function,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<Function, BoxError>;
}

/// Transformation of a single dataflow block
pub trait DataflowBlockTransform: Send + Sync {
    fn transform_dataflow_block(
        &self,
        block: BindingBlock,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<BindingBlock, BoxError>;
}

/// Transformation of the module as a whole.
///
/// Returning a boxed `PassError` surfaces it unchanged; any other error is
/// reported as an execution failure of the module unit.
pub trait ModuleTransform: Send + Sync {
    fn transform_module(&self, module: IRModule, ctx: &PassContext) -> Result<IRModule, BoxError>;
}

type FunctionMethod<T> = fn(&T, Function, &IRModule, &PassContext) -> Result<Function, BoxError>;
type BlockMethod<T> =
    fn(&T, BindingBlock, &IRModule, &PassContext) -> Result<BindingBlock, BoxError>;

struct CallableFunction<F>(F);

impl<F> FunctionTransform for CallableFunction<F>
where
    F: Fn(Function, &IRModule, &PassContext) -> Result<Function, BoxError> + Send + Sync,
{
    fn transform_function(
        &self,
        func: Function,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<Function, BoxError> {
        (self.0)(func, module, ctx)
    }
}

struct StatefulFunction<T> {
    instance: T,
    method: FunctionMethod<T>,
}

impl<T: Send + Sync> FunctionTransform for StatefulFunction<T> {
    fn transform_function(
        &self,
        func: Function,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<Function, BoxError> {
        (self.method)(&self.instance, func, module, ctx)
    }
}

struct CallableBlock<F>(F);

impl<F> DataflowBlockTransform for CallableBlock<F>
where
    F: Fn(BindingBlock, &IRModule, &PassContext) -> Result<BindingBlock, BoxError> + Send + Sync,
{
    fn transform_dataflow_block(
        &self,
        block: BindingBlock,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<BindingBlock, BoxError> {
        (self.0)(block, module, ctx)
    }
}

struct StatefulBlock<T> {
    instance: T,
    method: BlockMethod<T>,
}

impl<T: Send + Sync> DataflowBlockTransform for StatefulBlock<T> {
    fn transform_dataflow_block(
        &self,
        block: BindingBlock,
        module: &IRModule,
        ctx: &PassContext,
    ) -> Result<BindingBlock, BoxError> {
        (self.method)(&self.instance, block, module, ctx)
    }
}

struct CallableModule<F>(F);

impl<F> ModuleTransform for CallableModule<F>
where
    F: Fn(IRModule, &PassContext) -> Result<IRModule, BoxError> + Send + Sync,
{
    fn transform_module(&self, module: IRModule, ctx: &PassContext) -> Result<IRModule, BoxError> {
        (self.0)(module, ctx)
    }
}

/// Unit granularity and the transformation applied to it
#[derive(Clone)]
pub enum PassKind {
    Function(Arc<dyn FunctionTransform>),
    DataflowBlock(Arc<dyn DataflowBlockTransform>),
    Module(Arc<dyn ModuleTransform>),
}

impl PassKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::DataflowBlock(_) => "dataflow_block",
            Self::Module(_) => "module",
        }
    }
}

#[derive(Clone)]
pub struct Pass {
    info: PassInfo,
    kind: PassKind,
}

impl fmt::Debug for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("info", &self.info)
            .field("kind", &self.kind.name())
            .finish()
    }
}

impl Pass {
    // ==================== Function passes ====================

    pub fn function<T: FunctionTransform + 'static>(info: PassInfo, transform: T) -> Self {
        Self {
            info,
            kind: PassKind::Function(Arc::new(transform)),
        }
    }

    pub fn function_from_callable<F>(info: PassInfo, f: F) -> Self
    where
        F: Fn(Function, &IRModule, &PassContext) -> Result<Function, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::function(info, CallableFunction(f))
    }

    /// Call `method` on `instance` for every function
    pub fn function_from_stateful<T>(info: PassInfo, instance: T, method: FunctionMethod<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::function(info, StatefulFunction { instance, method })
    }

    // ==================== Dataflow block passes ====================

    pub fn dataflow_block<T: DataflowBlockTransform + 'static>(info: PassInfo, transform: T) -> Self {
        Self {
            info,
            kind: PassKind::DataflowBlock(Arc::new(transform)),
        }
    }

    pub fn dataflow_block_from_callable<F>(info: PassInfo, f: F) -> Self
    where
        F: Fn(BindingBlock, &IRModule, &PassContext) -> Result<BindingBlock, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::dataflow_block(info, CallableBlock(f))
    }

    pub fn dataflow_block_from_stateful<T>(info: PassInfo, instance: T, method: BlockMethod<T>) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::dataflow_block(info, StatefulBlock { instance, method })
    }

    // ==================== Module passes ====================

    pub fn module<T: ModuleTransform + 'static>(info: PassInfo, transform: T) -> Self {
        Self {
            info,
            kind: PassKind::Module(Arc::new(transform)),
        }
    }

    pub fn module_from_callable<F>(info: PassInfo, f: F) -> Self
    where
        F: Fn(IRModule, &PassContext) -> Result<IRModule, BoxError> + Send + Sync + 'static,
    {
        Self::module(info, CallableModule(f))
    }

    // ==================== Accessors ====================

    pub fn info(&self) -> &PassInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn opt_level(&self) -> u8 {
        self.info.opt_level
    }

    pub fn required(&self) -> &[String] {
        &self.info.required
    }

    pub fn is_traceable(&self) -> bool {
        self.info.traceable
    }

    pub fn kind(&self) -> &PassKind {
        &self.kind
    }
}

/// Builder mirroring the decorator-style registration: opt level first,
/// everything else optional.
#[derive(Debug, Clone)]
pub struct PassBuilder {
    opt_level: u8,
    name: Option<String>,
    required: Vec<String>,
    traceable: bool,
}

impl PassBuilder {
    pub fn new(opt_level: u8) -> Self {
        Self {
            opt_level,
            name: None,
            required: Vec::new(),
            traceable: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    pub fn traceable(mut self, traceable: bool) -> Self {
        self.traceable = traceable;
        self
    }

    /// Metadata, naming the pass after `T` unless a name was given
    fn info_for<T: ?Sized>(self) -> PassInfo {
        let name = self
            .name
            .unwrap_or_else(default_pass_name::<T>);
        PassInfo::new(name, self.opt_level)
            .with_required(self.required)
            .with_traceable(self.traceable)
    }

    pub fn function<F>(self, f: F) -> Pass
    where
        F: Fn(Function, &IRModule, &PassContext) -> Result<Function, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Pass::function_from_callable(self.info_for::<F>(), f)
    }

    pub fn function_transform<T: FunctionTransform + 'static>(self, transform: T) -> Pass {
        Pass::function(self.info_for::<T>(), transform)
    }

    pub fn function_from_stateful<T>(self, instance: T, method: FunctionMethod<T>) -> Pass
    where
        T: Send + Sync + 'static,
    {
        Pass::function_from_stateful(self.info_for::<T>(), instance, method)
    }

    pub fn dataflow_block<F>(self, f: F) -> Pass
    where
        F: Fn(BindingBlock, &IRModule, &PassContext) -> Result<BindingBlock, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Pass::dataflow_block_from_callable(self.info_for::<F>(), f)
    }

    pub fn dataflow_block_transform<T: DataflowBlockTransform + 'static>(self, transform: T) -> Pass {
        Pass::dataflow_block(self.info_for::<T>(), transform)
    }

    pub fn dataflow_block_from_stateful<T>(self, instance: T, method: BlockMethod<T>) -> Pass
    where
        T: Send + Sync + 'static,
    {
        Pass::dataflow_block_from_stateful(self.info_for::<T>(), instance, method)
    }

    pub fn module_transform<T: ModuleTransform + 'static>(self, transform: T) -> Pass {
        Pass::module(self.info_for::<T>(), transform)
    }
}

/// Last path segment of a type name, without generic arguments.
///
/// Closures share the `{{closure}}` segment, so they are named after the
/// enclosing item plus a process-wide sequence number.
fn default_pass_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    let mut segments = base.rsplit("::");
    let last = segments.next().unwrap_or(base);
    if last != "{{closure}}" {
        return last.to_string();
    }
    let enclosing = segments.find(|s| *s != "{{closure}}").unwrap_or("pass");
    let seq = NEXT_CLOSURE_PASS.fetch_add(1, Ordering::Relaxed);
    format!("{}#closure{}", enclosing, seq)
}
