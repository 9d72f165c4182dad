//! Text rendering of IR nodes
//!
//! Output is meant for logs, error messages and snapshot diffs; it is not a
//! parseable format.

use super::expr::{AttrValue, Binding, BindingBlock, Callee, Expr, GlobalVar, SeqExpr, Var};
use super::function::{Function, IRModule};
use super::types::{PrimExpr, Type};
use std::fmt::{self, Display, Formatter, Write};

impl Display for PrimExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PrimExpr::Int(v) => write!(f, "{}", v),
            PrimExpr::Sym(s) => f.write_str(s),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor { ndim, dtype } => {
                f.write_str("Tensor[")?;
                match ndim {
                    Some(n) => write!(f, "ndim={}", n)?,
                    None => f.write_str("ndim=?")?,
                }
                match dtype {
                    Some(d) => write!(f, ", {}]", d),
                    None => f.write_str(", ?]"),
                }
            }
            Type::Shape => f.write_str("Shape"),
            Type::Object => f.write_str("Object"),
            Type::Tuple(items) => {
                f.write_str("Tuple[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl Display for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Display for GlobalVar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{}", v),
            Expr::GlobalVar(gv) => write!(f, "{}", gv),
            Expr::Constant(c) => write!(f, "const<{}>{:?}", c.dtype, c.shape),
            Expr::Call(call) => {
                match &call.callee {
                    Callee::Op(name) => f.write_str(name)?,
                    Callee::Global(gv) => write!(f, "{}", gv)?,
                    Callee::Extern(sym) => write!(f, "extern({:?})", sym)?,
                }
                f.write_str("(")?;
                write_joined(f, &call.args)?;
                f.write_str(")")
            }
            Expr::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                f.write_str(")")
            }
            Expr::Shape(dims) => {
                f.write_str("shape(")?;
                write_joined(f, dims)?;
                f.write_str(")")
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if {} {{ {} }} else {{ {} }}", cond, then_branch, else_branch),
            Expr::Seq(seq) => write!(f, "{}", seq),
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Var { var, value } => write!(f, "{} = {}", var, value),
            Binding::MatchShape {
                var,
                value,
                pattern,
            } => {
                if let Some(var) = var {
                    write!(f, "{} = ", var)?;
                }
                write!(f, "match_shape({}, [", value)?;
                write_joined(f, pattern)?;
                f.write_str("])")
            }
        }
    }
}

impl Display for BindingBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_dataflow { "dataflow {" } else { "block {" })?;
        for binding in &self.bindings {
            write!(f, " {};", binding)?;
        }
        if !self.output_vars.is_empty() {
            f.write_str(" output(")?;
            write_joined(f, &self.output_vars)?;
            f.write_str(");")?;
        }
        f.write_str(" }")
    }
}

impl Display for SeqExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{} ", block)?;
        }
        write!(f, "return {}", self.body)
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.global_symbol().unwrap_or(""))?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
            if let Some(ty) = &p.ty {
                write!(f, ": {}", ty)?;
            }
        }
        f.write_str(")")?;
        if let Some(ret) = &self.ret_type {
            write!(f, " -> {}", ret)?;
        }
        write!(f, " {{ {} }}", self.body)
    }
}

impl Display for IRModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (gv, func) in self.iter() {
            writeln!(f, "{} := {}", gv, func)?;
        }
        Ok(())
    }
}

fn write_joined<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    let mut buf = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push_str(", ");
        }
        write!(buf, "{}", item)?;
    }
    f.write_str(&buf)
}
