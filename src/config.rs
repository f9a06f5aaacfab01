// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::ForecastError;

pub const DEFAULT_SECTION_CAPACITY: u32 = 30;
pub const DEFAULT_MIN_RECORDS: usize = 2;
pub const MAX_EPOCHS: usize = 10_000;

/// Settings for one forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Maximum students per section.
    pub section_capacity: u32,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub mode: PredictionMode,
    /// Fewest surviving records a fit is attempted on.
    pub min_records: usize,
    pub training: TrainingConfig,
    pub aliases: ColumnAliases,
    /// Fall back to case/spacing-insensitive header matching.
    pub loose_headers: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            section_capacity: DEFAULT_SECTION_CAPACITY,
            mode: PredictionMode::Backtest,
            min_records: DEFAULT_MIN_RECORDS,
            training: TrainingConfig::default(),
            aliases: ColumnAliases::default(),
            loose_headers: true,
        }
    }
}

/// Which indices the fitted model is evaluated at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMode {
    /// One prediction per historical record, at its own index.
    #[default]
    Backtest,
    /// A single prediction at the first index past the observed data.
    NextPeriod {
        semester: String,
        course_code: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Small dense network trained with Adam.
    #[default]
    Mlp,
    /// Ordinary least squares over the index.
    Linear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub model: ModelKind,
    pub epochs: usize,
    pub learning_rate: f64,
    pub hidden_units: usize,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Mlp,
            epochs: 100,
            learning_rate: 0.01,
            hidden_units: 64,
            seed: 0x5eed_cafe,
        }
    }
}

/// Header spellings accepted for each logical field, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub semester: Vec<String>,
    pub course_code: Vec<String>,
    pub total_enrolled: Vec<String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            semester: owned(&["semester", "SEMESTER", "Semester"]),
            course_code: owned(&[
                "course code",
                "COURSE CODE",
                "Course Code",
                "course_code",
                "COURSE_CODE",
                "courseCode",
            ]),
            total_enrolled: owned(&[
                "total number of students enrolled",
                "TOTAL NUMBER OF STUDENTS ENROLLED",
                "Total Number of Students Enrolled",
                "total_enrolled",
                "totalEnrolled",
                "enrolled",
            ]),
        }
    }
}

impl ForecastConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.section_capacity == 0 {
            return Err(ForecastError::config("section capacity must be at least 1"));
        }
        if self.min_records == 0 {
            return Err(ForecastError::config("min_records must be at least 1"));
        }
        if let PredictionMode::NextPeriod {
            semester,
            course_code,
        } = &self.mode
        {
            if semester.trim().is_empty() || course_code.trim().is_empty() {
                return Err(ForecastError::config(
                    "next-period mode needs both a target semester and course code",
                ));
            }
        }
        self.training.validate()?;

        let a = &self.aliases;
        if a.semester.is_empty() || a.course_code.is_empty() || a.total_enrolled.is_empty() {
            return Err(ForecastError::config("every field needs at least one alias"));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.epochs == 0 || self.epochs > MAX_EPOCHS {
            return Err(ForecastError::config(format!(
                "epochs must be within 1..={}, got {}",
                MAX_EPOCHS, self.epochs
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ForecastError::config(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.hidden_units == 0 {
            return Err(ForecastError::config("hidden_units must be at least 1"));
        }
        Ok(())
    }
}

/// Load a [`ForecastConfig`] from a YAML file; absent keys take defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ForecastConfig> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: ForecastConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
