//! Delta-method confidence intervals for a model's predicted probability.
//!
//! For a design vector `d` and coefficient covariance `Σ`, the variance of the
//! linear predictor is the full bilinear form `dᵀ Σ d`. The prevalence shift is
//! an additive constant, so it moves the interval without widening it. Bounds
//! are formed on the log-odds scale and pushed through the logistic function,
//! which makes them asymmetric around the point probability.

use crate::prevalence::{PROBABILITY_FLOOR, probability};
use crate::repository::FittedModel;
use ndarray::Array1;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Two-sided standard-normal critical value at 95 %.
pub const Z_95: f64 = 1.959963984540054;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum IntervalError {
    #[error("confidence level {0} must lie strictly inside (0, 1)")]
    InvalidConfidenceLevel(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IntervalMethod {
    DeltaMethod,
    /// The model shipped without a covariance matrix; the interval is the
    /// model's precomputed representative width centred on the estimate.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub width: f64,
    /// Standard error of the linear predictor; absent for fallback intervals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_error: Option<f64>,
    pub confidence_level: f64,
    pub method: IntervalMethod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceIntervalEstimator {
    confidence_level: f64,
    critical_value: f64,
}

impl Default for ConfidenceIntervalEstimator {
    fn default() -> Self {
        Self {
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            critical_value: Z_95,
        }
    }
}

impl ConfidenceIntervalEstimator {
    pub fn new(confidence_level: f64) -> Result<Self, IntervalError> {
        if !(confidence_level.is_finite() && confidence_level > 0.0 && confidence_level < 1.0) {
            return Err(IntervalError::InvalidConfidenceLevel(confidence_level));
        }
        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|_| IntervalError::InvalidConfidenceLevel(confidence_level))?;
        let critical_value = standard_normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0);
        Ok(Self {
            confidence_level,
            critical_value,
        })
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    pub fn critical_value(&self) -> f64 {
        self.critical_value
    }

    /// `sqrt(dᵀ Σ d)`, or `None` when the model carries no covariance. `design`
    /// is the activation vector the point estimate was computed from.
    pub fn standard_error(&self, model: &FittedModel, design: &Array1<f64>) -> Option<f64> {
        let cov = model.covariance()?;
        let mut variance = design.dot(&cov.dot(design));
        if variance < 0.0 {
            if variance < -1e-12 {
                log::warn!(
                    "Model '{}' covariance yields negative variance {variance:e}; treating as zero",
                    model.name()
                );
            }
            variance = 0.0;
        }
        Some(variance.sqrt())
    }

    pub fn estimate(
        &self,
        model: &FittedModel,
        design: &Array1<f64>,
        adjusted_linear_predictor: f64,
    ) -> ConfidenceInterval {
        if let Some(se) = self.standard_error(model, design) {
            let half_width = self.critical_value * se;
            let lower = probability(adjusted_linear_predictor - half_width);
            let upper = probability(adjusted_linear_predictor + half_width);
            return ConfidenceInterval {
                lower,
                upper,
                width: upper - lower,
                standard_error: Some(se),
                confidence_level: self.confidence_level,
                method: IntervalMethod::DeltaMethod,
            };
        }

        log::warn!(
            "Model '{}' has no coefficient covariance; using its representative interval width",
            model.name()
        );
        let point = probability(adjusted_linear_predictor);
        let half_width = model.representative_interval_width().unwrap_or(0.0) / 2.0;
        let lower = (point - half_width).max(PROBABILITY_FLOOR);
        let upper = (point + half_width).min(1.0 - PROBABILITY_FLOOR);
        ConfidenceInterval {
            lower,
            upper,
            width: upper - lower,
            standard_error: None,
            confidence_level: self.confidence_level,
            method: IntervalMethod::Fallback,
        }
    }
}
