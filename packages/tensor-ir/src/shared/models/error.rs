//! Errors raised by model-level operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Global '@{name}' referenced from '{referenced_from}' is not defined in the module")]
    UnresolvedGlobal {
        name: String,
        referenced_from: String,
    },

    #[error("Invalid constant of shape {shape:?}: {reason}")]
    InvalidConstant { shape: Vec<i64>, reason: String },
}

impl ModelError {
    pub fn invalid_constant(shape: &[i64], reason: impl Into<String>) -> Self {
        Self::InvalidConstant {
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
