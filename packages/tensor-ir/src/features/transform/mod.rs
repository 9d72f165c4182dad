//! Pass framework
//!
//! - domain: pass metadata, pass values and transform traits
//! - application: adapters applying a pass to every unit of a module
//! - infrastructure: module-level collaborator passes

pub mod application;
pub mod domain;
pub mod errors;
pub mod infrastructure;

pub use domain::{
    DataflowBlockTransform, FunctionTransform, ModuleTransform, Pass, PassBuilder, PassContext,
    PassInfo, PassKind, PassOutput, UnitId, UnitSnapshot, UnitValue,
};
pub use errors::{BoxError, PassError, PassResult};
pub use infrastructure::{bind_params, remove_unused_functions, resolve_globals};
