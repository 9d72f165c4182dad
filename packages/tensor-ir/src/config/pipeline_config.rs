//! Pipeline configuration
//!
//! Start from a preset, override what differs, then `build()`:
//!
//! ```rust,ignore
//! let config = PipelineConfig::preset(Preset::O1)
//!     .disable("FuseOps")
//!     .require("LegalizeOps")
//!     .setting("target", "llvm")
//!     .build()?;
//! ```

use super::error::{ConfigError, ConfigResult};
use super::io::{ConfigExportV1, ConfigOverrides};
use super::preset::Preset;
use super::validation::Validatable;
use crate::features::transform::PassContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub(crate) preset: Preset,

    /// Opt-level ceiling; passes above it are skipped
    pub opt_level: u8,

    pub disabled_passes: Vec<String>,

    /// Passes that run regardless of the ceiling
    pub required_passes: Vec<String>,

    /// Keep unit snapshots for every pass, traceable or not
    pub trace_all: bool,

    pub parallel: bool,

    /// Free-form settings exposed through `PassContext`
    pub context: BTreeMap<String, String>,
}

impl PipelineConfig {
    /// Create from preset
    pub fn preset(preset: Preset) -> Self {
        Self {
            preset,
            opt_level: preset.opt_level(),
            disabled_passes: Vec::new(),
            required_passes: Vec::new(),
            trace_all: false,
            parallel: preset.parallel(),
            context: BTreeMap::new(),
        }
    }

    pub fn opt_level(mut self, level: u8) -> Self {
        self.opt_level = level;
        self
    }

    pub fn disable(mut self, pass: impl Into<String>) -> Self {
        let pass = pass.into();
        if !self.disabled_passes.contains(&pass) {
            self.disabled_passes.push(pass);
        }
        self
    }

    pub fn require(mut self, pass: impl Into<String>) -> Self {
        let pass = pass.into();
        if !self.required_passes.contains(&pass) {
            self.required_passes.push(pass);
        }
        self
    }

    pub fn trace_all(mut self, enabled: bool) -> Self {
        self.trace_all = enabled;
        self
    }

    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Validate and freeze
    pub fn build(self) -> ConfigResult<ValidatedConfig> {
        self.validate()?;
        Ok(ValidatedConfig(self))
    }

    pub fn get_preset(&self) -> Preset {
        self.preset
    }

    pub fn is_disabled(&self, pass: &str) -> bool {
        self.disabled_passes.iter().any(|p| p == pass)
    }

    pub fn is_required(&self, pass: &str) -> bool {
        self.required_passes.iter().any(|p| p == pass)
    }

    /// Context handed to passes for a run at `ceiling`
    pub fn pass_context(&self, ceiling: u8) -> PassContext {
        self.context.iter().fold(
            PassContext::new(ceiling)
                .with_trace_all(self.trace_all)
                .with_parallel(self.parallel),
            |ctx, (key, value)| ctx.with_setting(key.clone(), value.clone()),
        )
    }

    /// Load from a YAML file (schema v1)
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<ValidatedConfig> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<ValidatedConfig> {
        let export: ConfigExportV1 = serde_yaml::from_str(content)?;

        // Version check
        let version = export.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let preset = Preset::from_str(&export.preset)
            .map_err(|_| ConfigError::UnknownPreset(export.preset.clone()))?;

        let mut config = Self::preset(preset);
        if let Some(overrides) = export.overrides {
            config.apply_overrides(overrides);
        }

        tracing::debug!(preset = %preset, opt_level = config.opt_level, "loaded pipeline config");
        config.build()
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(level) = overrides.opt_level {
            self.opt_level = level;
        }
        if let Some(disabled) = overrides.disabled_passes {
            self.disabled_passes = disabled;
        }
        if let Some(required) = overrides.required_passes {
            self.required_passes = required;
        }
        if let Some(trace_all) = overrides.trace_all {
            self.trace_all = trace_all;
        }
        if let Some(parallel) = overrides.parallel {
            self.parallel = parallel;
        }
        if let Some(context) = overrides.context {
            self.context = context;
        }
    }

    /// Export to YAML, writing only the fields that differ from the preset
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let base = Self::preset(self.preset);
        let overrides = ConfigOverrides {
            opt_level: (self.opt_level != base.opt_level).then_some(self.opt_level),
            disabled_passes: (!self.disabled_passes.is_empty())
                .then(|| self.disabled_passes.clone()),
            required_passes: (!self.required_passes.is_empty())
                .then(|| self.required_passes.clone()),
            trace_all: (self.trace_all != base.trace_all).then_some(self.trace_all),
            parallel: (self.parallel != base.parallel).then_some(self.parallel),
            context: (!self.context.is_empty()).then(|| self.context.clone()),
        };
        let has_overrides = overrides.opt_level.is_some()
            || overrides.disabled_passes.is_some()
            || overrides.required_passes.is_some()
            || overrides.trace_all.is_some()
            || overrides.parallel.is_some()
            || overrides.context.is_some();

        let export = ConfigExportV1 {
            version: Some(1),
            preset: self.preset.to_string(),
            overrides: has_overrides.then_some(overrides),
        };
        Ok(serde_yaml::to_string(&export)?)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

/// Configuration that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig(PipelineConfig);

impl ValidatedConfig {
    pub fn into_inner(self) -> PipelineConfig {
        self.0
    }

    pub fn as_inner(&self) -> &PipelineConfig {
        &self.0
    }
}

impl Default for ValidatedConfig {
    fn default() -> Self {
        Self(PipelineConfig::default())
    }
}

impl std::ops::Deref for ValidatedConfig {
    type Target = PipelineConfig;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_preset_defaults() {
        let config = PipelineConfig::preset(Preset::O1).build().unwrap();
        assert_eq!(config.opt_level, 1);
        assert!(!config.parallel);
        assert!(config.disabled_passes.is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::preset(Preset::O2)
            .opt_level(3)
            .disable("FuseOps")
            .disable("FuseOps")
            .require("LegalizeOps")
            .setting("target", "llvm")
            .build()
            .unwrap();
        assert_eq!(config.disabled_passes, vec!["FuseOps"]);
        assert!(config.is_required("LegalizeOps"));

        let ctx = config.pass_context(config.opt_level);
        assert_eq!(ctx.opt_level, 3);
        assert!(ctx.parallel);
        assert_eq!(ctx.setting("target"), Some("llvm"));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"version: 1\npreset: o1\noverrides:\n  disabled_passes: [FoldConstant]\n  context:\n    target: cuda\n",
        )
        .unwrap();

        let config = PipelineConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.get_preset(), Preset::O1);
        assert!(config.is_disabled("FoldConstant"));
        assert_eq!(config.context.get("target").map(String::as_str), Some("cuda"));
    }

    #[test]
    fn test_yaml_version_checks() {
        let err = PipelineConfig::from_yaml_str("preset: o2\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVersion));

        let err = PipelineConfig::from_yaml_str("version: 2\npreset: o2\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_yaml_rejects_unknown_fields_and_presets() {
        let err = PipelineConfig::from_yaml_str("version: 1\npreset: o2\nextra: true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));

        let err = PipelineConfig::from_yaml_str("version: 1\npreset: fast\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(ref p) if p == "fast"));
    }

    #[test]
    fn test_yaml_export_reloads() {
        let config = PipelineConfig::preset(Preset::O3)
            .trace_all(true)
            .require("ResolveGlobals")
            .build()
            .unwrap();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("preset: o3"));
        assert!(!yaml.contains("opt_level"));

        let reloaded = PipelineConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_yaml("/nonexistent/pipeline.yaml").unwrap_err();
        assert_eq!(err.category(), "io");
    }
}
