//! Typed pass errors
//!
//! Ordering errors are raised before any pass runs; execution errors carry
//! the failing unit and the callable's own error as `#[source]`.

use super::domain::UnitId;
use crate::shared::models::ModelError;
use thiserror::Error;

/// Error type returned by user transformation callables
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum PassError {
    /// A `required` name is not in the pass set
    #[error("Pass '{pass}' requires '{missing}', which is not in the pass set")]
    Dependency { pass: String, missing: String },

    #[error("Pass dependency cycle among: {}", members.join(", "))]
    Cycle { members: Vec<String> },

    #[error("Pass '{0}' is registered more than once")]
    DuplicatePass(String),

    /// The pass callable failed on one unit; the whole apply is abandoned
    #[error("Pass '{pass}' failed on {unit}: {source}")]
    Execution {
        pass: String,
        unit: UnitId,
        #[source]
        source: BoxError,
    },

    #[error("Unresolved global '@{name}' referenced from '{referenced_from}'")]
    UnresolvedGlobal {
        name: String,
        referenced_from: String,
    },

    #[error("Function '{0}' not found in module")]
    UnknownFunction(String),

    #[error("Cannot bind parameter '{param}' of '{function}': {reason}")]
    ParamBinding {
        function: String,
        param: String,
        reason: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl PassError {
    pub fn dependency(pass: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::Dependency {
            pass: pass.into(),
            missing: missing.into(),
        }
    }

    pub fn execution(pass: impl Into<String>, unit: UnitId, source: impl Into<BoxError>) -> Self {
        Self::Execution {
            pass: pass.into(),
            unit,
            source: source.into(),
        }
    }

    /// Failing unit, for execution errors
    pub fn unit(&self) -> Option<&UnitId> {
        match self {
            Self::Execution { unit, .. } => Some(unit),
            _ => None,
        }
    }

    /// Get error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Dependency { .. } | Self::Cycle { .. } | Self::DuplicatePass(_) => "ordering",
            Self::Execution { .. } => "execution",
            Self::UnresolvedGlobal { .. } => "global",
            Self::UnknownFunction(_) | Self::ParamBinding { .. } => "collaborator",
            Self::Model(_) => "model",
        }
    }
}

/// Result type alias for pass operations
pub type PassResult<T> = Result<T, PassError>;
