//! Pass pipeline configuration
//!
//! - `Preset`: o0..o3 defaults
//! - `PipelineConfig`: builder, YAML v1 load/export
//! - `Validatable`: checks run by `build()`

pub mod error;
pub mod io;
pub mod pipeline_config;
pub mod preset;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use io::{ConfigExportV1, ConfigOverrides};
pub use pipeline_config::{PipelineConfig, ValidatedConfig};
pub use preset::Preset;
pub use validation::{Validatable, MAX_OPT_LEVEL};
