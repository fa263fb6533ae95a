//! Interval width → severity tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordered from least to most uncertain; the derived `Ord` is the severity rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityTier {
    VeryLow,
    Low,
    Medium,
    High,
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SeverityTier::VeryLow => "veryLow",
            SeverityTier::Low => "low",
            SeverityTier::Medium => "medium",
            SeverityTier::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SeverityError {
    #[error(
        "severity thresholds must be finite and strictly increasing (low {low}, medium {medium}, high {high})"
    )]
    NotIncreasing { low: f64, medium: f64, high: f64 },
}

/// Lower edges of the `low`, `medium` and `high` tiers. Each edge belongs to
/// the tier it opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeverityThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            low: 0.10,
            medium: 0.20,
            high: 0.40,
        }
    }
}

impl SeverityThresholds {
    pub fn validate(&self) -> Result<(), SeverityError> {
        let finite = [self.low, self.medium, self.high]
            .iter()
            .all(|t| t.is_finite());
        if finite && self.low < self.medium && self.medium < self.high {
            Ok(())
        } else {
            Err(SeverityError::NotIncreasing {
                low: self.low,
                medium: self.medium,
                high: self.high,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UncertaintyClassifier {
    thresholds: SeverityThresholds,
}

impl UncertaintyClassifier {
    pub fn new(thresholds: SeverityThresholds) -> Result<Self, SeverityError> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Checked from the highest edge down. A NaN width is unknowable and
    /// therefore classified as `High`.
    pub fn classify(&self, width: f64) -> SeverityTier {
        let t = &self.thresholds;
        if width.is_nan() || width >= t.high {
            SeverityTier::High
        } else if width >= t.medium {
            SeverityTier::Medium
        } else if width >= t.low {
            SeverityTier::Low
        } else {
            SeverityTier::VeryLow
        }
    }
}
