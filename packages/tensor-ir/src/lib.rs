/*
 * tensor-ir - Tensor IR construction and pass pipeline
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : IR value types (Var, Expr, Function, IRModule)
 * - features/    : Vertical slices (ir_builder, transform)
 * - pipeline/    : Pass ordering and execution
 * - config/      : Presets, YAML configuration, validation
 */

#![allow(clippy::should_implement_trait)] // from_str naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed

/// Shared IR models
pub mod shared;

/// Feature modules (builder, pass framework)
pub mod features;

pub mod config;
pub mod errors;
pub mod pipeline;

pub use config::{ConfigError, PipelineConfig, Preset, ValidatedConfig};
pub use errors::{Result, TensorIrError};
pub use features::ir_builder::{BuildOutput, BuilderError, FrameGuard, IRBuilder, OperatorTable, TypeDeducer};
pub use features::transform::{
    bind_params, remove_unused_functions, resolve_globals, Pass, PassBuilder, PassContext,
    PassError, PassInfo, UnitId,
};
pub use pipeline::{PassDAG, PassPipelineRunner, PipelineReport};
pub use shared::models::{Expr, Function, GlobalVar, IRModule, Type, Var};
