//! Engine configuration, read from an optional TOML file.
//!
//! ```toml
//! [inference]
//! confidence_level = 0.95
//! selection = "exact"            # or "largest_subset"
//! default_target_prevalence = 0.1
//!
//! [severity]
//! low = 0.10
//! medium = 0.20
//! high = 0.40
//! ```
//!
//! Every field is optional; an absent file or section means the defaults above
//! (with the target prevalence taken from the artifact).

use crate::interval::{ConfidenceIntervalEstimator, DEFAULT_CONFIDENCE_LEVEL, IntervalError};
use crate::prevalence::{Prevalence, PrevalenceError};
use crate::selector::SelectionPolicy;
use crate::severity::{SeverityError, SeverityThresholds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid [inference] confidence_level: {0}")]
    ConfidenceLevel(#[from] IntervalError),
    #[error("Invalid [severity] thresholds: {0}")]
    Severity(#[from] SeverityError),
    #[error("Invalid [inference] default_target_prevalence: {0}")]
    Prevalence(#[from] PrevalenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceSettings {
    pub confidence_level: f64,
    pub selection: SelectionPolicy,
    /// Overrides the artifact's `defaultTargetPrevalence` when set.
    pub default_target_prevalence: Option<f64>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            selection: SelectionPolicy::Exact,
            default_target_prevalence: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub inference: InferenceSettings,
    pub severity: SeverityThresholds,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfidenceIntervalEstimator::new(self.inference.confidence_level)?;
        self.severity.validate()?;
        if let Some(p) = self.inference.default_target_prevalence {
            Prevalence::new(p)?;
        }
        Ok(())
    }
}
