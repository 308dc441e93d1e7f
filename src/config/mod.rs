use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::features::{DEFAULT_N_MFCC, MAX_N_MFCC};

pub const DEFAULT_PATH_COLUMN: &str = "segment_path";
pub const DEFAULT_SEGMENT_DURATION: u32 = 30;

/// Settings for single-file and batch feature extraction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    #[serde(alias = "nMfcc", alias = "mfcc")]
    pub n_mfcc: usize,
    pub augment: bool,
    #[serde(alias = "pathColumn")]
    pub path_column: String,
    /// Fixed seed for noise injection; `None` draws from OS entropy
    #[serde(alias = "seed")]
    pub noise_seed: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            n_mfcc: DEFAULT_N_MFCC,
            augment: false,
            path_column: DEFAULT_PATH_COLUMN.to_string(),
            noise_seed: None,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_N_MFCC).contains(&self.n_mfcc),
            "n_mfcc must be between 1 and {}",
            MAX_N_MFCC
        );
        ensure!(
            !self.path_column.trim().is_empty(),
            "path_column must not be empty"
        );
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        parse_validated(raw, Self::validate)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&read_config(path)?)
    }
}

/// Settings for cutting source recordings into fixed-duration segments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    #[serde(alias = "inputDir")]
    pub input_dir: PathBuf,
    #[serde(alias = "outputDir")]
    pub output_dir: PathBuf,
    /// Segment length in whole seconds
    #[serde(alias = "segmentDuration", alias = "duration")]
    pub segment_duration: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("segments"),
            segment_duration: DEFAULT_SEGMENT_DURATION,
        }
    }
}

impl SegmentConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_segment_duration(mut self, seconds: u32) -> Self {
        self.segment_duration = seconds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.segment_duration > 0,
            "segment_duration must be positive"
        );
        ensure!(
            !self.output_dir.exists() || self.output_dir.is_dir(),
            "output path {:?} exists and is not a directory",
            self.output_dir
        );
        Ok(())
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        parse_validated(raw, Self::validate)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&read_config(path)?)
    }
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))
}

fn parse_validated<T: DeserializeOwned>(raw: &str, validate: fn(&T) -> Result<()>) -> Result<T> {
    let config: T = serde_json::from_str(raw).context("Failed to parse config JSON")?;
    validate(&config).context("Config validation failed")?;
    Ok(config)
}
