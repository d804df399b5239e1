use crate::constants::{DEFAULT_METADATA_PATTERN, MOTION_CORRECTED_MARKER};
use crate::error::{PrepError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "neuroprep.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub conversion: ConversionConfig,
    pub motion: MotionConfig,
    pub onsets: OnsetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub file_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "neuroprep.log".to_string(),
            file_output: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub motion_corrected_marker: String,
    pub metadata_pattern: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            motion_corrected_marker: MOTION_CORRECTED_MARKER.to_string(),
            metadata_pattern: DEFAULT_METADATA_PATTERN.to_string(),
        }
    }
}

/// Framewise displacement thresholds in millimetres
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub small_threshold_mm: f64,
    pub large_threshold_mm: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            small_threshold_mm: 0.5,
            large_threshold_mm: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OnsetsConfig {
    pub output_root: PathBuf,
}

impl Default for OnsetsConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("onsets"),
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist; without one,
    /// `neuroprep.toml` in the working directory is used when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PrepError::Configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.motion.small_threshold_mm > self.motion.large_threshold_mm {
            return Err(PrepError::Configuration(format!(
                "motion.small_threshold_mm ({}) exceeds motion.large_threshold_mm ({})",
                self.motion.small_threshold_mm, self.motion.large_threshold_mm
            )));
        }
        if self.conversion.motion_corrected_marker.is_empty() {
            return Err(PrepError::Configuration(
                "conversion.motion_corrected_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
