//! Preset configurations
//!
//! Presets provide complete pipeline defaults per optimization level.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// No optimization: only passes registered at level 0
    O0,
    O1,
    /// Default level, independent units evaluated in parallel
    O2,
    O3,
}

impl Preset {
    /// Opt-level ceiling this preset runs with
    pub fn opt_level(&self) -> u8 {
        match self {
            Self::O0 => 0,
            Self::O1 => 1,
            Self::O2 => 2,
            Self::O3 => 3,
        }
    }

    pub fn parallel(&self) -> bool {
        matches!(self, Self::O2 | Self::O3)
    }

    /// Parse preset from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "o0" => Ok(Self::O0),
            "o1" => Ok(Self::O1),
            "o2" => Ok(Self::O2),
            "o3" => Ok(Self::O3),
            _ => Err(format!(
                "Unknown preset '{}'. Valid presets: o0, o1, o2, o3",
                s
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::O0 => "o0",
            Self::O1 => "o1",
            Self::O2 => "o2",
            Self::O3 => "o3",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::O2
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
