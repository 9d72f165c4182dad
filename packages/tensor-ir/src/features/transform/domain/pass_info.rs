//! Pass metadata, run context and unit snapshots

use crate::shared::models::{BindingBlock, Function, IRModule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable pass metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassInfo {
    pub name: String,
    pub opt_level: u8,
    /// Names of passes that must run before this one
    pub required: Vec<String>,
    pub traceable: bool,
}

impl PassInfo {
    pub fn new(name: impl Into<String>, opt_level: u8) -> Self {
        Self {
            name: name.into(),
            opt_level,
            required: Vec::new(),
            traceable: false,
        }
    }

    pub fn with_required<I, S>(mut self, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = required.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_traceable(mut self, traceable: bool) -> Self {
        self.traceable = traceable;
        self
    }
}

/// Read-only settings handed to every transformation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassContext {
    pub opt_level: u8,
    /// Keep unit snapshots for every pass, traceable or not
    pub trace_all: bool,
    /// Evaluate independent units concurrently (needs the `parallel` feature)
    pub parallel: bool,
    settings: BTreeMap<String, String>,
}

impl PassContext {
    pub fn new(opt_level: u8) -> Self {
        Self {
            opt_level,
            ..Self::default()
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_trace_all(mut self, trace_all: bool) -> Self {
        self.trace_all = trace_all;
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }
}

/// Identity of one unit a pass visited
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    /// Owning function name; empty for module-level passes
    pub function: String,
    /// Index among the function's dataflow blocks, depth-first
    pub block_index: Option<usize>,
}

impl UnitId {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            function: name.into(),
            block_index: None,
        }
    }

    pub fn block(function: impl Into<String>, index: usize) -> Self {
        Self {
            function: function.into(),
            block_index: Some(index),
        }
    }

    pub fn module() -> Self {
        Self::function("")
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.function.as_str(), self.block_index) {
            ("", _) => write!(f, "module"),
            (name, None) => write!(f, "function '@{}'", name),
            (name, Some(idx)) => write!(f, "dataflow block #{} of '@{}'", idx, name),
        }
    }
}

/// Value of a unit at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UnitValue {
    Function(Function),
    DataflowBlock(BindingBlock),
    Module(IRModule),
}

/// Before/after pair recorded by traceable passes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSnapshot {
    pub unit: UnitId,
    pub before: UnitValue,
    pub after: UnitValue,
}

impl UnitSnapshot {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Result of applying one pass
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub module: IRModule,
    /// Empty unless the pass (or the context) asked for tracing
    pub snapshots: Vec<UnitSnapshot>,
}
