//! Log-odds helpers and the prior-shift correction.
//!
//! A model fitted where the outcome base rate was `p0` is moved to a population
//! with base rate `p1` by adding `logit(p1) - logit(p0)` to its linear predictor.
//! This is exact when only the base rate differs between the two populations.

use serde::Serialize;
use thiserror::Error;

/// Probabilities leaving the logistic transform are kept at least this far from 0 and 1.
pub const PROBABILITY_FLOOR: f64 = 1e-8;

/// Linear predictors are clamped to this magnitude before exponentiation.
const MAX_ABS_LOG_ODDS: f64 = 700.0;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PrevalenceError {
    #[error("prevalence {0} must be a finite value strictly inside (0, 1)")]
    OutOfRange(f64),
}

/// An outcome base rate, guaranteed finite and strictly inside (0, 1).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Prevalence(f64);

impl Prevalence {
    pub fn new(value: f64) -> Result<Self, PrevalenceError> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(PrevalenceError::OutOfRange(value))
        }
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn logit(self) -> f64 {
        logit(self.0)
    }
}

/// `ln(p / (1 - p))`, written to stay accurate near both ends of (0, 1).
#[inline]
pub fn logit(p: f64) -> f64 {
    p.ln() - (-p).ln_1p()
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Maps a log-odds value to a probability strictly inside (0, 1).
#[inline]
pub fn probability(log_odds: f64) -> f64 {
    let clamped = log_odds.clamp(-MAX_ABS_LOG_ODDS, MAX_ABS_LOG_ODDS);
    sigmoid(clamped).clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR)
}

/// The additive log-odds correction between two base rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrevalenceShift {
    pub training: Prevalence,
    pub target: Prevalence,
}

impl PrevalenceShift {
    pub fn new(training: Prevalence, target: Prevalence) -> Self {
        Self { training, target }
    }

    #[inline]
    pub fn offset(&self) -> f64 {
        self.target.logit() - self.training.logit()
    }

    #[inline]
    pub fn apply(&self, raw_linear_predictor: f64) -> f64 {
        raw_linear_predictor - self.training.logit() + self.target.logit()
    }

    pub fn inverse(&self) -> Self {
        Self {
            training: self.target,
            target: self.training,
        }
    }
}

/// `raw - logit(training) + logit(target)`.
pub fn adjust(raw_linear_predictor: f64, training: Prevalence, target: Prevalence) -> f64 {
    PrevalenceShift::new(training, target).apply(raw_linear_predictor)
}
