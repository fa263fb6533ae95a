//! # Model Artifact Document
//!
//! Serde mirror of the fitted-model artifact produced by the offline fitting
//! process. Nothing here is validated beyond what the JSON grammar enforces;
//! `ModelRepository::from_document` is the single place that checks the
//! document's invariants and turns it into dense, indexed structures.
//!
//! Field names follow the artifact's camelCase convention.

use crate::registry::ValueType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Key under which every model stores its intercept coefficient.
pub const INTERCEPT_TERM: &str = "(Intercept)";

/// Suffix of the single coefficient a boolean variable contributes.
pub const ACTIVATED_SUFFIX: &str = "TRUE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDocument {
    pub variables: Vec<VariableSpec>,
    pub models: BTreeMap<String, ModelSpec>,
    pub prevalence_info: PrevalenceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSpec {
    pub id: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Covariance as stored on disk: a nested term → term → value map.
pub type NestedCovariance = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub variables: Vec<String>,
    pub coefficients: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient_standard_errors: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficient_covariance: Option<NestedCovariance>,
    pub sample_size: u64,
    pub n_positive: u64,
    pub n_negative: u64,
    pub auc: f64,
    pub converged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representative_interval_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_degrees_of_freedom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_at_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity_at_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevalenceInfo {
    pub training_prevalence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_sample_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_positive_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_negative_count: Option<u64>,
    pub default_target_prevalence: f64,
}

/// Every way the artifact can fail to become a servable repository.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse model artifact JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Model artifact failed validation: {0}")]
    Malformed(#[from] MalformedArtifact),
}

/// Structural violations found while indexing a parsed artifact. These are data
/// integrity problems in the artifact itself and are never patched up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedArtifact {
    #[error("the artifact declares no variables")]
    EmptyRegistry,
    #[error("variable #{position} has an empty id")]
    EmptyVariableId { position: usize },
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),
    #[error("variable '{id}' has inverted bounds: min {min} > max {max}")]
    InvertedBounds { id: String, min: f64, max: f64 },
    #[error("model '{0}' lists no variables")]
    EmptyModel(String),
    #[error("model '{model}' references variable '{variable}', which is not in the registry")]
    UnknownVariable { model: String, variable: String },
    #[error("models '{first}' and '{second}' are fitted on the same variable set")]
    DuplicateSignature { first: String, second: String },
    #[error("model '{model}' is missing coefficient '{term}'")]
    MissingCoefficient { model: String, term: String },
    #[error("model '{model}' has coefficient '{term}', which matches none of its variables")]
    UnexpectedCoefficient { model: String, term: String },
    #[error("model '{model}' covariance keys do not match its coefficients: {detail}")]
    CovarianceKeyMismatch { model: String, detail: String },
    #[error("model '{model}' covariance is not symmetric at ('{row}', '{col}')")]
    AsymmetricCovariance {
        model: String,
        row: String,
        col: String,
    },
    #[error("model '{model}' has a non-finite value in {field}")]
    NonFiniteParameter { model: String, field: &'static str },
    #[error("model '{model}' has {field} = {value}, outside its valid range")]
    OutOfRange {
        model: String,
        field: &'static str,
        value: f64,
    },
    #[error(
        "model '{0}' has neither a coefficient covariance nor a representative interval width"
    )]
    MissingIntervalSource(String),
    #[error("{field} {value} must lie strictly inside (0, 1)")]
    InvalidPrevalence { field: &'static str, value: f64 },
}

impl ArtifactDocument {
    /// Reads and parses an artifact from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(text)?)
    }
}
