//! Configuration loading and validation

use anyhow::{Context, Result};
use reading_log_core::{EngineConfig, FilterSpec, FixedPitchLayout};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    pub engine: EngineConfig,
    /// Geometry for stimuli given as text
    #[serde(default)]
    pub layout: FixedPitchLayout,
    #[serde(default)]
    pub stimuli: Vec<StimulusConfig>,
    /// Filters replayed over every dataset, in order
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Event files (JSON arrays of records), one dataset each
    #[serde(default)]
    pub events: Vec<PathBuf>,
    /// Boundary table files (JSON)
    #[serde(default)]
    pub boundaries: Vec<PathBuf>,
}

/// A stimulus sentence laid out in the fixed-pitch font
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StimulusConfig {
    pub condition: u32,
    pub item: u32,
    /// `[region name, region text]` pairs, left to right
    pub regions: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_bins_file")]
    pub bins_file: String,
    /// Write every annotated dataset as pretty JSON
    #[serde(default = "default_true")]
    pub write_datasets: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_bins_file() -> String {
    "bins.txt".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            bins_file: default_bins_file(),
            write_datasets: true,
        }
    }
}

/// Problems found while validating a loaded configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no event files given (use [input] events or --events)")]
    NoEvents,

    #[error("no boundaries given (use [input] boundaries, [[stimuli]] or --boundaries)")]
    NoBoundaries,

    #[error("input file not found: {0:?}")]
    MissingFile(PathBuf),

    #[error("filter {index}: {reason}")]
    Filter { index: usize, reason: String },

    #[error("stimulus for condition {condition} item {item} has no regions")]
    EmptyStimulus { condition: u32, item: u32 },

    #[error("bins file name must not be empty")]
    EmptyBinsFile,
}

impl AppConfig {
    /// Add input files and override the output directory from the command line
    pub fn merge_args(&mut self, events: &[PathBuf], boundaries: &[PathBuf], output_dir: Option<&Path>) {
        self.input.events.extend(events.iter().cloned());
        self.input.boundaries.extend(boundaries.iter().cloned());
        if let Some(dir) = output_dir {
            self.output.output_dir = dir.to_path_buf();
        }
    }

    /// Check everything that can be checked before any file is decoded
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.input.events.is_empty() {
            return Err(ConfigError::NoEvents);
        }
        if self.input.boundaries.is_empty() && self.stimuli.is_empty() {
            return Err(ConfigError::NoBoundaries);
        }
        for path in self.input.events.iter().chain(&self.input.boundaries) {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.clone()));
            }
        }
        for (position, filter) in self.filters.iter().enumerate() {
            filter.validate().map_err(|e| ConfigError::Filter {
                index: position + 1,
                reason: e.to_string(),
            })?;
        }
        for stimulus in &self.stimuli {
            if stimulus.regions.is_empty() {
                return Err(ConfigError::EmptyStimulus {
                    condition: stimulus.condition,
                    item: stimulus.item,
                });
            }
        }
        if self.output.bins_file.trim().is_empty() {
            return Err(ConfigError::EmptyBinsFile);
        }
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .engine
        .validate()
        .with_context(|| format!("Invalid engine configuration in {:?}", path))?;

    Ok(config)
}
