//! Configuration validation

use super::error::{ConfigError, ConfigResult};
use super::pipeline_config::PipelineConfig;

/// Highest accepted opt-level ceiling
pub const MAX_OPT_LEVEL: u8 = 4;

/// Trait for validatable configuration objects
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;
}

impl Validatable for PipelineConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.opt_level > MAX_OPT_LEVEL {
            return Err(ConfigError::range_with_hint(
                "opt_level",
                self.opt_level,
                0,
                MAX_OPT_LEVEL,
                "Use preset o3 or opt_level 4 for the most aggressive pipeline",
            ));
        }

        if let Some(pass) = self
            .disabled_passes
            .iter()
            .find(|pass| self.is_required(pass))
        {
            return Err(ConfigError::Conflict {
                issue: format!("pass '{}' is both disabled and required", pass),
                fix: format!("remove '{}' from disabled_passes or required_passes", pass),
            });
        }

        Ok(())
    }
}
