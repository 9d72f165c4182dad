//! Default type deduction backed by a static operator table

use crate::features::ir_builder::errors::{BuilderError, BuilderResult};
use crate::features::ir_builder::ports::{StructInfo, TypeDeducer};
use crate::shared::models::{Callee, Expr, PrimExpr, Shape, Type};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    /// Binary op with numpy-style broadcasting
    Elementwise,
    MatMul,
    ShapeOf,
    Unique,
}

static OPERATORS: Lazy<FxHashMap<&'static str, OpKind>> = Lazy::new(|| {
    let mut table = FxHashMap::default();
    for name in ["add", "subtract", "multiply", "divide"] {
        table.insert(name, OpKind::Elementwise);
    }
    table.insert("matmul", OpKind::MatMul);
    table.insert("shape_of", OpKind::ShapeOf);
    table.insert("unique", OpKind::Unique);
    table
});

/// Deduces types for the operators the builder knows about.
///
/// Unknown operators, global calls and extern calls deduce to an unknown
/// type rather than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorTable;

impl OperatorTable {
    pub fn new() -> Self {
        Self
    }

    pub fn is_registered(name: &str) -> bool {
        OPERATORS.contains_key(name)
    }
}

impl TypeDeducer for OperatorTable {
    fn deduce(&self, expr: &Expr) -> BuilderResult<StructInfo> {
        match expr {
            Expr::Var(v) => Ok(StructInfo::new(v.ty.clone(), v.shape.clone())),
            Expr::GlobalVar(_) => Ok(StructInfo::unknown()),
            Expr::Constant(c) => Ok(StructInfo::new(Some(c.ty()), Some(c.shape_expr()))),
            Expr::Shape(_) => Ok(StructInfo::new(Some(Type::Shape), None)),
            Expr::Tuple(items) => {
                let types = items
                    .iter()
                    .map(|item| self.deduce(item).map(|info| info.ty))
                    .collect::<BuilderResult<Option<Vec<Type>>>>()?;
                Ok(StructInfo::new(types.map(Type::Tuple), None))
            }
            Expr::If {
                then_branch,
                else_branch,
                ..
            } => {
                let then_info = self.deduce(then_branch)?;
                let else_info = self.deduce(else_branch)?;
                let ty = match (&then_info.ty, &else_info.ty) {
                    (Some(a), Some(b)) => a.unify(b),
                    _ => None,
                };
                let shape = if then_info.shape == else_info.shape {
                    then_info.shape
                } else {
                    None
                };
                Ok(StructInfo::new(ty, shape))
            }
            Expr::Seq(seq) => self.deduce(&seq.body),
            Expr::Call(call) => {
                let name = match &call.callee {
                    Callee::Op(name) => name.as_str(),
                    Callee::Global(_) | Callee::Extern(_) => return Ok(StructInfo::unknown()),
                };
                let kind = match OPERATORS.get(name) {
                    Some(kind) => *kind,
                    None => return Ok(StructInfo::unknown()),
                };
                let args = call
                    .args
                    .iter()
                    .map(|a| self.deduce(a))
                    .collect::<BuilderResult<Vec<_>>>()?;
                deduce_op(name, kind, &args)
            }
        }
    }
}

fn deduce_op(name: &str, kind: OpKind, args: &[StructInfo]) -> BuilderResult<StructInfo> {
    match kind {
        OpKind::ShapeOf => Ok(StructInfo::new(Some(Type::Shape), None)),
        OpKind::Unique => {
            let dtype = args.first().and_then(|a| a.ty.as_ref()).and_then(Type::dtype);
            Ok(StructInfo::new(
                Some(Type::Tensor {
                    ndim: Some(1),
                    dtype,
                }),
                None,
            ))
        }
        OpKind::Elementwise | OpKind::MatMul => {
            let (lhs, rhs) = match args {
                [lhs, rhs] => (lhs, rhs),
                _ => return Ok(StructInfo::unknown()),
            };
            let dtype = merge_dtype(name, lhs, rhs)?;
            let shape = match (&lhs.shape, &rhs.shape) {
                (Some(a), Some(b)) if kind == OpKind::Elementwise => broadcast(a, b)?,
                (Some(a), Some(b)) => matmul_shape(a, b)?,
                _ => None,
            };
            let ndim = match &shape {
                Some(s) => Some(s.len()),
                None if kind == OpKind::Elementwise => {
                    match (lhs.ty.as_ref().and_then(Type::ndim), rhs.ty.as_ref().and_then(Type::ndim)) {
                        (Some(a), Some(b)) => Some(a.max(b)),
                        _ => None,
                    }
                }
                None => None,
            };
            Ok(StructInfo::new(Some(Type::Tensor { ndim, dtype }), shape))
        }
    }
}

fn merge_dtype(
    name: &str,
    lhs: &StructInfo,
    rhs: &StructInfo,
) -> BuilderResult<Option<crate::shared::models::DataType>> {
    let a = lhs.ty.as_ref().and_then(Type::dtype);
    let b = rhs.ty.as_ref().and_then(Type::dtype);
    match (a, b) {
        (Some(x), Some(y)) if x != y => Err(BuilderError::type_conflict(name, x, y)),
        (Some(x), _) | (_, Some(x)) => Ok(Some(x)),
        (None, None) => Ok(None),
    }
}

/// Numpy broadcasting over possibly symbolic dims.
///
/// Unequal symbolic dims make the result unknown; unequal concrete dims
/// (neither being 1) are a static error.
fn broadcast(lhs: &Shape, rhs: &Shape) -> BuilderResult<Option<Shape>> {
    let rank = lhs.len().max(rhs.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let a = dim_from_right(lhs, rank, i);
        let b = dim_from_right(rhs, rank, i);
        let dim = match (a, b) {
            (None, Some(d)) | (Some(d), None) => d.clone(),
            (Some(x), Some(y)) if x == y => x.clone(),
            (Some(PrimExpr::Int(1)), Some(d)) | (Some(d), Some(PrimExpr::Int(1))) => d.clone(),
            (Some(PrimExpr::Int(_)), Some(PrimExpr::Int(_))) => {
                return Err(BuilderError::shape_mismatch(
                    render_dims(lhs),
                    render_dims(rhs),
                ))
            }
            _ => return Ok(None),
        };
        out.push(dim);
    }
    Ok(Some(out))
}

fn dim_from_right(shape: &Shape, rank: usize, i: usize) -> Option<&PrimExpr> {
    let offset = rank - shape.len();
    if i < offset {
        None
    } else {
        shape.get(i - offset)
    }
}

fn matmul_shape(lhs: &Shape, rhs: &Shape) -> BuilderResult<Option<Shape>> {
    match (lhs.as_slice(), rhs.as_slice()) {
        ([m, k1], [k2, n]) => {
            if let (PrimExpr::Int(a), PrimExpr::Int(b)) = (k1, k2) {
                if a != b {
                    return Err(BuilderError::shape_mismatch(
                        render_dims(lhs),
                        render_dims(rhs),
                    ));
                }
            }
            Ok(Some(vec![m.clone(), n.clone()]))
        }
        _ => Ok(None),
    }
}

pub(crate) fn render_dims(shape: &[PrimExpr]) -> String {
    shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
