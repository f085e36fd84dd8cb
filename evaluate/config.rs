//! Run-wide evaluation settings.
//!
//! Every field has a default, so an empty TOML file (or no file at all) yields the
//! behaviour of the plain command line. Command-line flags are applied on top of the
//! file through [`EvaluationConfig::with_overrides`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_N_PERMUTATIONS: usize = 5000;
pub const DEFAULT_N_JOBS: i32 = 1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error while reading configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Index column shared by the ground truth and every prediction file.
    pub subject_id_column: String,
    /// Value of the ground-truth `split` column selecting evaluation subjects.
    pub evaluation_split: String,
    /// Group whose submissions are averaged into the grand ensemble.
    pub challenge_group: String,
    /// Prediction files whose name starts with this marker are ignored.
    pub exclusion_prefix: String,
    pub n_permutations: usize,
    /// Worker threads for permutation testing. Zero or negative uses every logical CPU.
    pub n_jobs: i32,
    pub seed: u64,
    pub survival: SurvivalConfig,
    pub plot: PlotConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            subject_id_column: "Study ID".to_string(),
            evaluation_split: "test".to_string(),
            challenge_group: "challenge".to_string(),
            exclusion_prefix: "excluded".to_string(),
            n_permutations: DEFAULT_N_PERMUTATIONS,
            n_jobs: DEFAULT_N_JOBS,
            seed: 0,
            survival: SurvivalConfig::default(),
            plot: PlotConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurvivalConfig {
    /// Last point of the survival-curve time grid. Defaults to the largest observed
    /// survival time among evaluation subjects.
    pub grid_end: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotConfig {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    /// TrueType font used for legends and axis labels.
    pub font_path: Option<String>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width_in: 13.0,
            height_in: 6.0,
            dpi: 300,
            font_path: None,
        }
    }
}

impl PlotConfig {
    /// Pixel dimensions of the rendered figure.
    pub fn pixel_size(&self) -> (u32, u32) {
        let dpi = f64::from(self.dpi);
        (
            (self.width_in * dpi).round() as u32,
            (self.height_in * dpi).round() as u32,
        )
    }
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct CliOverrides {
    pub n_permutations: Option<usize>,
    pub n_jobs: Option<i32>,
    pub seed: Option<u64>,
}

impl EvaluationConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Self {
        if let Some(n) = overrides.n_permutations {
            self.n_permutations = n;
        }
        if let Some(jobs) = overrides.n_jobs {
            self.n_jobs = jobs;
        }
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        self
    }

    /// Resolves `n_jobs` to a concrete thread count.
    pub fn worker_threads(&self) -> usize {
        if self.n_jobs <= 0 {
            num_cpus::get().max(1)
        } else {
            self.n_jobs as usize
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.subject_id_column.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "subject_id_column",
                reason: "must not be empty".to_string(),
            });
        }
        if self.challenge_group.contains('_') {
            return Err(ConfigError::InvalidValue {
                field: "challenge_group",
                reason: "group names cannot contain '_' because file names are split on it"
                    .to_string(),
            });
        }
        if let Some(end) = self.survival.grid_end {
            if !(end.is_finite() && end > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: "survival.grid_end",
                    reason: format!("expected a positive finite number, found {end}"),
                });
            }
        }
        if self.plot.dpi == 0 || self.plot.width_in <= 0.0 || self.plot.height_in <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "plot",
                reason: "figure size and dpi must be positive".to_string(),
            });
        }
        Ok(())
    }
}
