//! YAML schema types
//!
//! Loading and export live in pipeline_config.rs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigExportV1 {
    /// Schema version (always 1 for v1)
    pub version: Option<u32>,

    /// Base preset
    pub preset: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigOverrides>,
}

/// Fields replacing the preset defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_level: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_passes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_passes: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_all: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}
