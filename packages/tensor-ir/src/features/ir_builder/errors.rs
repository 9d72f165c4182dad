//! Builder error types
//!
//! Every failure is local and synchronous. Frames involved in a failed
//! operation are discarded before the error reaches the caller.

use crate::shared::models::error::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuilderError {
    /// Illegal enter/exit ordering, or no active frame
    #[error("Frame stack error in {op}: {reason}")]
    FrameStack { op: &'static str, reason: String },

    #[error("Output var '{var}' is not bound in the current dataflow block")]
    UndefinedOutput { var: String },

    #[error("{op} requires a dataflow block frame on top of the stack")]
    NotInDataflowBlock { op: &'static str },

    #[error("Shape mismatch: expected [{expected}], found [{found}]")]
    ShapeMismatch { expected: String, found: String },

    #[error("Type conflict for '{name}': {existing} is incompatible with {incoming}")]
    TypeConflict {
        name: String,
        existing: String,
        incoming: String,
    },

    #[error("Function '{function}' has no return value")]
    MissingReturn { function: String },

    #[error("If expression is incomplete: {reason}")]
    IncompleteBranch { reason: String },

    #[error("Unresolved global '@{name}' ({context})")]
    UnresolvedGlobal { name: String, context: String },

    #[error("Var '{name}' is not visible in the current scope")]
    UndefinedVar { name: String },

    #[error("Var '{name}' is already declared in function '{function}'")]
    DuplicateVar { name: String, function: String },

    #[error("Global '@{name}' is already {what}")]
    DuplicateGlobal { name: String, what: &'static str },

    #[error("A binding block must contain at least one binding")]
    EmptyBlock,

    #[error("Invalid constant: {reason}")]
    InvalidConstant { reason: String },
}

impl BuilderError {
    pub fn frame_stack(op: &'static str, reason: impl Into<String>) -> Self {
        Self::FrameStack {
            op,
            reason: reason.into(),
        }
    }

    pub fn shape_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn type_conflict(
        name: impl Into<String>,
        existing: impl ToString,
        incoming: impl ToString,
    ) -> Self {
        Self::TypeConflict {
            name: name.into(),
            existing: existing.to_string(),
            incoming: incoming.to_string(),
        }
    }

    pub fn incomplete_branch(reason: impl Into<String>) -> Self {
        Self::IncompleteBranch {
            reason: reason.into(),
        }
    }

    /// Get error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::FrameStack { .. } => "frame_stack",
            Self::UndefinedOutput { .. } | Self::NotInDataflowBlock { .. } => "dataflow",
            Self::ShapeMismatch { .. } | Self::TypeConflict { .. } | Self::InvalidConstant { .. } => {
                "validation"
            }
            Self::MissingReturn { .. } | Self::IncompleteBranch { .. } | Self::EmptyBlock => {
                "incomplete"
            }
            Self::UnresolvedGlobal { .. } | Self::DuplicateGlobal { .. } => "global",
            Self::UndefinedVar { .. } | Self::DuplicateVar { .. } => "scope",
        }
    }
}

impl From<ModelError> for BuilderError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnresolvedGlobal { name, referenced_from } => Self::UnresolvedGlobal {
                name,
                context: format!("referenced from '{}'", referenced_from),
            },
            other @ ModelError::InvalidConstant { .. } => Self::InvalidConstant {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for builder operations
pub type BuilderResult<T> = Result<T, BuilderError>;
