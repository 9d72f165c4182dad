//! Pass ordering and execution

pub mod dag;
pub mod runner;

pub use dag::PassDAG;
pub use runner::{PassPipelineRunner, PassTrace, PipelineReport, SkipReason, SkippedPass};
