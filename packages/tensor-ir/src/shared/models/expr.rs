//! Expression-level IR nodes
//!
//! All nodes are plain immutable data with structural equality. Builders
//! produce them, passes consume and rebuild them.

use super::error::{ModelError, ModelResult};
use super::types::{DataType, PrimExpr, Shape, Type};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GLOBAL_UID: AtomicU64 = AtomicU64::new(1);

/// Attribute value attached to functions and calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<AttrValue>),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Ordered attribute map
pub type Attrs = BTreeMap<String, AttrValue>;

/// Local variable
///
/// `name` is unique within the enclosing function at the time the var is
/// created. Expressions refer to vars by value; the builder keeps the
/// canonical copy of each var in scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    pub ty: Option<Type>,
    pub shape: Option<Shape>,
    pub is_dataflow: bool,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            shape: None,
            is_dataflow: false,
        }
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn dataflow(mut self, is_dataflow: bool) -> Self {
        self.is_dataflow = is_dataflow;
        self
    }
}

/// Module-level function handle
///
/// `uid` is assigned when a module declares the name; `0` marks a by-name
/// reference that has not been resolved against a module yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalVar {
    pub name: String,
    pub uid: u64,
}

impl GlobalVar {
    /// Unresolved reference to a global by name
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: 0,
        }
    }

    /// Fresh declaration with a process-unique id
    pub(crate) fn declare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: NEXT_GLOBAL_UID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.uid != 0
    }
}

/// Embedded constant tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub dtype: DataType,
    pub shape: Vec<i64>,
    pub values: Vec<f64>,
}

impl Constant {
    /// Create a constant, checking that the element count matches the shape
    pub fn new(dtype: DataType, shape: Vec<i64>, values: Vec<f64>) -> ModelResult<Self> {
        let mut expected: usize = 1;
        for dim in &shape {
            let extent = usize::try_from(*dim)
                .map_err(|_| ModelError::invalid_constant(&shape, "negative extent"))?;
            expected = expected
                .checked_mul(extent)
                .ok_or_else(|| ModelError::invalid_constant(&shape, "element count overflows"))?;
        }
        if expected != values.len() {
            return Err(ModelError::invalid_constant(
                &shape,
                format!("needs {} elements, got {}", expected, values.len()),
            ));
        }
        Ok(Self {
            dtype,
            shape,
            values,
        })
    }

    pub fn scalar(value: f64, dtype: DataType) -> Self {
        Self {
            dtype,
            shape: Vec::new(),
            values: vec![value],
        }
    }

    pub fn ty(&self) -> Type {
        Type::tensor(self.shape.len(), self.dtype)
    }

    pub fn shape_expr(&self) -> Shape {
        self.shape.iter().map(|d| PrimExpr::Int(*d)).collect()
    }
}

/// Call target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// Registered operator, e.g. `add`
    Op(String),
    /// Function in the same module
    Global(GlobalVar),
    /// Externally provided packed function
    Extern(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub callee: Callee,
    pub args: Vec<Expr>,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Var(Var),
    GlobalVar(GlobalVar),
    Constant(Constant),
    Call(Call),
    Tuple(Vec<Expr>),
    Shape(Shape),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Seq(SeqExpr),
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Expr::Var(v)
    }
}

impl From<&Var> for Expr {
    fn from(v: &Var) -> Self {
        Expr::Var(v.clone())
    }
}

impl From<GlobalVar> for Expr {
    fn from(gv: GlobalVar) -> Self {
        Expr::GlobalVar(gv)
    }
}

impl From<Constant> for Expr {
    fn from(c: Constant) -> Self {
        Expr::Constant(c)
    }
}

impl Expr {
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Expr::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Replace every free var occurrence with the expression `f` returns.
    ///
    /// Vars bound inside nested sequence expressions are left alone.
    pub fn try_map_free_vars<E, F>(self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(Var) -> Result<Expr, E>,
    {
        let mut bound = Vec::new();
        self.map_vars_inner(f, &mut bound)
    }

    fn map_vars_inner<E, F>(self, f: &mut F, bound: &mut Vec<String>) -> Result<Expr, E>
    where
        F: FnMut(Var) -> Result<Expr, E>,
    {
        Ok(match self {
            Expr::Var(v) => {
                if bound.iter().any(|b| b == &v.name) {
                    Expr::Var(v)
                } else {
                    f(v)?
                }
            }
            Expr::GlobalVar(_) | Expr::Constant(_) | Expr::Shape(_) => self,
            Expr::Call(call) => Expr::Call(Call {
                callee: call.callee,
                args: map_all(call.args, f, bound)?,
                attrs: call.attrs,
            }),
            Expr::Tuple(items) => Expr::Tuple(map_all(items, f, bound)?),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => Expr::If {
                cond: Box::new(cond.map_vars_inner(f, bound)?),
                then_branch: Box::new(then_branch.map_vars_inner(f, bound)?),
                else_branch: Box::new(else_branch.map_vars_inner(f, bound)?),
            },
            Expr::Seq(seq) => Expr::Seq(seq.map_vars_inner(f, bound)?),
        })
    }

    /// Visit every global referenced by this expression, in textual order
    pub fn visit_globals<F: FnMut(&GlobalVar)>(&self, f: &mut F) {
        match self {
            Expr::GlobalVar(gv) => f(gv),
            Expr::Var(_) | Expr::Constant(_) | Expr::Shape(_) => {}
            Expr::Call(call) => {
                if let Callee::Global(gv) = &call.callee {
                    f(gv);
                }
                for arg in &call.args {
                    arg.visit_globals(f);
                }
            }
            Expr::Tuple(items) => items.iter().for_each(|e| e.visit_globals(f)),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.visit_globals(f);
                then_branch.visit_globals(f);
                else_branch.visit_globals(f);
            }
            Expr::Seq(seq) => seq.visit_globals(f),
        }
    }

    /// Rewrite every global reference in place
    pub fn try_rewrite_globals<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut GlobalVar) -> Result<(), E>,
    {
        match self {
            Expr::GlobalVar(gv) => f(gv),
            Expr::Var(_) | Expr::Constant(_) | Expr::Shape(_) => Ok(()),
            Expr::Call(call) => {
                if let Callee::Global(gv) = &mut call.callee {
                    f(gv)?;
                }
                call.args
                    .iter_mut()
                    .try_for_each(|arg| arg.try_rewrite_globals(f))
            }
            Expr::Tuple(items) => items.iter_mut().try_for_each(|e| e.try_rewrite_globals(f)),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.try_rewrite_globals(f)?;
                then_branch.try_rewrite_globals(f)?;
                else_branch.try_rewrite_globals(f)
            }
            Expr::Seq(seq) => seq.try_rewrite_globals(f),
        }
    }

    /// Depth-first walk over every binding block nested in this expression
    pub fn try_for_each_block_mut<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut BindingBlock) -> Result<(), E>,
    {
        match self {
            Expr::Var(_) | Expr::GlobalVar(_) | Expr::Constant(_) | Expr::Shape(_) => Ok(()),
            Expr::Call(call) => call
                .args
                .iter_mut()
                .try_for_each(|arg| arg.try_for_each_block_mut(f)),
            Expr::Tuple(items) => items
                .iter_mut()
                .try_for_each(|e| e.try_for_each_block_mut(f)),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.try_for_each_block_mut(f)?;
                then_branch.try_for_each_block_mut(f)?;
                else_branch.try_for_each_block_mut(f)
            }
            Expr::Seq(seq) => seq.try_for_each_block_mut(f),
        }
    }
}

fn map_all<E, F>(items: Vec<Expr>, f: &mut F, bound: &mut Vec<String>) -> Result<Vec<Expr>, E>
where
    F: FnMut(Var) -> Result<Expr, E>,
{
    items
        .into_iter()
        .map(|e| e.map_vars_inner(f, bound))
        .collect()
}

/// One recorded computation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    Var {
        var: Var,
        value: Expr,
    },
    /// Runtime shape assertion, optionally binding the matched value
    MatchShape {
        var: Option<Var>,
        value: Expr,
        pattern: Shape,
    },
}

impl Binding {
    pub fn var(&self) -> Option<&Var> {
        match self {
            Binding::Var { var, .. } => Some(var),
            Binding::MatchShape { var, .. } => var.as_ref(),
        }
    }

    pub fn var_mut(&mut self) -> Option<&mut Var> {
        match self {
            Binding::Var { var, .. } => Some(var),
            Binding::MatchShape { var, .. } => var.as_mut(),
        }
    }

    pub fn value(&self) -> &Expr {
        match self {
            Binding::Var { value, .. } | Binding::MatchShape { value, .. } => value,
        }
    }

    pub fn value_mut(&mut self) -> &mut Expr {
        match self {
            Binding::Var { value, .. } | Binding::MatchShape { value, .. } => value,
        }
    }

    pub fn is_dataflow_var(&self) -> bool {
        self.var().map(|v| v.is_dataflow).unwrap_or(false)
    }
}

/// Ordered bindings; dataflow blocks expose only `output_vars` and
/// non-dataflow vars to the enclosing scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingBlock {
    pub bindings: Vec<Binding>,
    pub is_dataflow: bool,
    pub output_vars: Vec<Var>,
}

impl BindingBlock {
    pub fn plain(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            is_dataflow: false,
            output_vars: Vec::new(),
        }
    }

    pub fn dataflow(bindings: Vec<Binding>, output_vars: Vec<Var>) -> Self {
        Self {
            bindings,
            is_dataflow: true,
            output_vars,
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Vars this block defines, in binding order
    pub fn bound_vars(&self) -> impl Iterator<Item = &Var> {
        self.bindings.iter().filter_map(Binding::var)
    }
}

/// Blocks followed by a result expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqExpr {
    pub blocks: Vec<BindingBlock>,
    pub body: Box<Expr>,
}

impl SeqExpr {
    pub fn new(blocks: Vec<BindingBlock>, body: Expr) -> Self {
        Self {
            blocks,
            body: Box::new(body),
        }
    }

    pub fn try_map_free_vars<E, F>(self, f: &mut F) -> Result<SeqExpr, E>
    where
        F: FnMut(Var) -> Result<Expr, E>,
    {
        let mut bound = Vec::new();
        self.map_vars_inner(f, &mut bound)
    }

    fn map_vars_inner<E, F>(self, f: &mut F, bound: &mut Vec<String>) -> Result<SeqExpr, E>
    where
        F: FnMut(Var) -> Result<Expr, E>,
    {
        let mark = bound.len();
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            let mut bindings = Vec::with_capacity(block.bindings.len());
            for binding in block.bindings {
                let mapped = match binding {
                    Binding::Var { var, value } => Binding::Var {
                        value: value.map_vars_inner(f, bound)?,
                        var,
                    },
                    Binding::MatchShape {
                        var,
                        value,
                        pattern,
                    } => Binding::MatchShape {
                        value: value.map_vars_inner(f, bound)?,
                        var,
                        pattern,
                    },
                };
                if let Some(var) = mapped.var() {
                    bound.push(var.name.clone());
                }
                bindings.push(mapped);
            }
            blocks.push(BindingBlock { bindings, ..block });
        }
        let body = self.body.map_vars_inner(f, bound)?;
        bound.truncate(mark);
        Ok(SeqExpr::new(blocks, body))
    }

    pub fn visit_globals<F: FnMut(&GlobalVar)>(&self, f: &mut F) {
        for block in &self.blocks {
            for binding in &block.bindings {
                binding.value().visit_globals(f);
            }
        }
        self.body.visit_globals(f);
    }

    pub fn try_rewrite_globals<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut GlobalVar) -> Result<(), E>,
    {
        for block in &mut self.blocks {
            for binding in &mut block.bindings {
                binding.value_mut().try_rewrite_globals(f)?;
            }
        }
        self.body.try_rewrite_globals(f)
    }

    pub fn try_for_each_block_mut<E, F>(&mut self, f: &mut F) -> Result<(), E>
    where
        F: FnMut(&mut BindingBlock) -> Result<(), E>,
    {
        for block in &mut self.blocks {
            f(block)?;
            for binding in &mut block.bindings {
                binding.value_mut().try_for_each_block_mut(f)?;
            }
        }
        self.body.try_for_each_block_mut(f)
    }
}
