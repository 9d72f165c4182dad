//! Operator call constructors

use super::expr::{Attrs, Call, Callee, Expr, GlobalVar};

/// Call a registered operator by name
pub fn call_op(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(Call {
        callee: Callee::Op(name.to_string()),
        args,
        attrs: Attrs::new(),
    })
}

/// Call another function of the module
pub fn call_global(gv: GlobalVar, args: Vec<Expr>) -> Expr {
    Expr::Call(Call {
        callee: Callee::Global(gv),
        args,
        attrs: Attrs::new(),
    })
}

/// Call an externally registered packed function
pub fn call_extern(symbol: &str, args: Vec<Expr>) -> Expr {
    Expr::Call(Call {
        callee: Callee::Extern(symbol.to_string()),
        args,
        attrs: Attrs::new(),
    })
}

pub fn add(lhs: Expr, rhs: Expr) -> Expr {
    call_op("add", vec![lhs, rhs])
}

pub fn subtract(lhs: Expr, rhs: Expr) -> Expr {
    call_op("subtract", vec![lhs, rhs])
}

pub fn multiply(lhs: Expr, rhs: Expr) -> Expr {
    call_op("multiply", vec![lhs, rhs])
}

pub fn divide(lhs: Expr, rhs: Expr) -> Expr {
    call_op("divide", vec![lhs, rhs])
}

pub fn matmul(lhs: Expr, rhs: Expr) -> Expr {
    call_op("matmul", vec![lhs, rhs])
}

pub fn shape_of(value: Expr) -> Expr {
    call_op("shape_of", vec![value])
}

pub fn unique(value: Expr) -> Expr {
    call_op("unique", vec![value])
}
