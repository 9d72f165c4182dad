//! Error types for tensor-ir
//!
//! Each feature keeps its own error enum; `TensorIrError` unifies them for
//! callers that drive building, configuration and passes together.

use crate::config::ConfigError;
use crate::features::ir_builder::BuilderError;
use crate::features::transform::PassError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TensorIrError {
    #[error("Builder error: {0}")]
    Builder(#[from] BuilderError),

    #[error("Pass error: {0}")]
    Pass(#[from] PassError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TensorIrError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::Builder(e) => e.category(),
            Self::Pass(e) => e.category(),
            Self::Config(e) => e.category(),
        }
    }
}

/// Result type alias for tensor-ir operations
pub type Result<T> = std::result::Result<T, TensorIrError>;
