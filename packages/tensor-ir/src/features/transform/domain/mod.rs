pub mod pass;
pub mod pass_info;

pub use pass::{
    DataflowBlockTransform, FunctionTransform, ModuleTransform, Pass, PassBuilder, PassKind,
};
pub use pass_info::{PassContext, PassInfo, PassOutput, UnitId, UnitSnapshot, UnitValue};
