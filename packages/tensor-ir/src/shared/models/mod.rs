//! IR value types
//!
//! Immutable nodes produced by the builder and rewritten by passes.

pub mod error;
pub mod expr;
pub mod function;
pub mod op;
pub mod printer;
pub mod types;

pub use expr::{
    AttrValue, Attrs, Binding, BindingBlock, Call, Callee, Constant, Expr, GlobalVar, SeqExpr, Var,
};
pub use error::{ModelError, ModelResult};
pub use function::{Function, IRModule, GLOBAL_SYMBOL_ATTR};
pub use types::{shape, DataType, PrimExpr, Shape, Type};
