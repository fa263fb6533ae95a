//! # Model Repository
//!
//! Turns a parsed `ArtifactDocument` into an immutable, indexed collection of
//! fitted models. All of the artifact's structural invariants are checked here,
//! once, at startup:
//!
//! - each model's coefficients are exactly one intercept plus one term per
//!   variable in its variable set;
//! - covariance rows and columns carry exactly the coefficient keys and the
//!   matrix is symmetric;
//! - no two models share a variable-set signature.
//!
//! Models are stored with their terms in canonical order (intercept first, then
//! variable terms in registry order) and their covariance as a dense matrix in
//! that same order, so evaluation never touches a string key.

use crate::artifact::{
    ArtifactDocument, ArtifactError, INTERCEPT_TERM, MalformedArtifact, ModelSpec,
    NestedCovariance,
};
use crate::prevalence::Prevalence;
use crate::registry::{ValueType, VariableRegistry};
use crate::types::Signature;
use ahash::AHashMap;
use ndarray::{Array1, Array2};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Relative tolerance for `cov[a][b] == cov[b][a]`.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// What a coefficient multiplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermBinding {
    Intercept,
    /// Activated when the boolean variable at this registry index is true.
    Boolean(usize),
    /// Multiplies the numeric variable at this registry index.
    Numeric(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub name: String,
    pub binding: TermBinding,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    pub sample_size: u64,
    pub n_positive: u64,
    pub n_negative: u64,
    pub auc: f64,
    pub converged: bool,
    pub residual_degrees_of_freedom: Option<f64>,
}

/// A Youden-optimal operating point reported by the fitting process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    pub threshold: f64,
    pub sensitivity: Option<f64>,
    pub specificity: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FittedModel {
    name: String,
    signature: Signature,
    terms: Vec<Term>,
    coefficients: Array1<f64>,
    covariance: Option<Array2<f64>>,
    standard_errors: Option<Array1<f64>>,
    representative_interval_width: Option<f64>,
    pub fit: FitSummary,
    pub operating_point: Option<OperatingPoint>,
}

impl FittedModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Terms in canonical order; index `i` here is index `i` of the coefficient
    /// vector and of both covariance axes.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn covariance(&self) -> Option<&Array2<f64>> {
        self.covariance.as_ref()
    }

    pub fn standard_errors(&self) -> Option<&Array1<f64>> {
        self.standard_errors.as_ref()
    }

    pub fn representative_interval_width(&self) -> Option<f64> {
        self.representative_interval_width
    }

    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name == name)
    }

    pub fn coefficient(&self, term: &str) -> Option<f64> {
        self.term_index(term).map(|i| self.coefficients[i])
    }

    pub fn covariance_entry(&self, row: &str, col: &str) -> Option<f64> {
        let cov = self.covariance.as_ref()?;
        Some(cov[[self.term_index(row)?, self.term_index(col)?]])
    }

    /// Validates one model entry of the artifact and lays it out densely.
    pub fn from_spec(
        name: &str,
        spec: &ModelSpec,
        registry: &VariableRegistry,
    ) -> Result<Self, MalformedArtifact> {
        if spec.variables.is_empty() {
            return Err(MalformedArtifact::EmptyModel(name.to_string()));
        }

        let mut indices = Vec::with_capacity(spec.variables.len());
        for id in &spec.variables {
            let index = registry
                .index_of(id)
                .ok_or_else(|| MalformedArtifact::UnknownVariable {
                    model: name.to_string(),
                    variable: id.clone(),
                })?;
            indices.push(index);
        }
        let signature = Signature::from_indices(indices);

        // --- 1. Canonical term list ---
        let mut terms = Vec::with_capacity(signature.len() + 1);
        terms.push(Term {
            name: INTERCEPT_TERM.to_string(),
            binding: TermBinding::Intercept,
        });
        for &index in signature.indices() {
            // Signature indices come from `index_of`, so the lookup cannot miss.
            let Some(variable) = registry.get(index) else {
                continue;
            };
            let binding = match variable.value_type {
                ValueType::Boolean => TermBinding::Boolean(index),
                ValueType::Numeric => TermBinding::Numeric(index),
            };
            terms.push(Term {
                name: variable.term_name(),
                binding,
            });
        }

        // --- 2. Coefficients, exactly one per term ---
        let coefficients = internal::ordered_vector(name, &terms, &spec.coefficients)?;
        if !coefficients.iter().all(|c| c.is_finite()) {
            return Err(MalformedArtifact::NonFiniteParameter {
                model: name.to_string(),
                field: "coefficients",
            });
        }

        // --- 3. Covariance, square over the same keys and symmetric ---
        let covariance = spec
            .coefficient_covariance
            .as_ref()
            .map(|nested| internal::dense_covariance(name, &terms, nested))
            .transpose()?;

        let standard_errors = spec
            .coefficient_standard_errors
            .as_ref()
            .and_then(|se| match internal::ordered_vector(name, &terms, se) {
                Ok(values) => Some(values),
                Err(e) => {
                    log::warn!("Dropping standard errors of model '{name}': {e}");
                    None
                }
            });
        if let (Some(cov), Some(se)) = (&covariance, &standard_errors) {
            internal::warn_on_standard_error_drift(name, &terms, cov, se);
        }

        // --- 4. Interval source and scalar fields ---
        let representative_interval_width = spec.representative_interval_width;
        if let Some(width) = representative_interval_width {
            if !(width.is_finite() && width > 0.0 && width < 1.0) {
                return Err(MalformedArtifact::OutOfRange {
                    model: name.to_string(),
                    field: "representativeIntervalWidth",
                    value: width,
                });
            }
        }
        if covariance.is_none() && representative_interval_width.is_none() {
            return Err(MalformedArtifact::MissingIntervalSource(name.to_string()));
        }

        if !(spec.auc.is_finite() && (0.0..=1.0).contains(&spec.auc)) {
            return Err(MalformedArtifact::OutOfRange {
                model: name.to_string(),
                field: "auc",
                value: spec.auc,
            });
        }

        let operating_point = match spec.decision_threshold {
            Some(threshold) => {
                if !(threshold.is_finite() && threshold > 0.0 && threshold < 1.0) {
                    return Err(MalformedArtifact::OutOfRange {
                        model: name.to_string(),
                        field: "decisionThreshold",
                        value: threshold,
                    });
                }
                Some(OperatingPoint {
                    threshold,
                    sensitivity: spec.sensitivity_at_threshold,
                    specificity: spec.specificity_at_threshold,
                })
            }
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            signature,
            terms,
            coefficients,
            covariance,
            standard_errors,
            representative_interval_width,
            fit: FitSummary {
                sample_size: spec.sample_size,
                n_positive: spec.n_positive,
                n_negative: spec.n_negative,
                auc: spec.auc,
                converged: spec.converged,
                residual_degrees_of_freedom: spec.residual_degrees_of_freedom,
            },
            operating_point,
        })
    }
}

/// The loaded, validated artifact. Read-only after construction.
#[derive(Debug, Clone)]
pub struct ModelRepository {
    registry: VariableRegistry,
    models: Vec<FittedModel>,
    by_signature: AHashMap<Signature, usize>,
    training_prevalence: Prevalence,
    default_target_prevalence: Prevalence,
    metadata: Option<serde_json::Value>,
    disclaimer: Option<serde_json::Value>,
}

impl ModelRepository {
    /// Reads, parses and validates an artifact file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        log::info!("Loading model artifact from {}", path.display());
        let document = ArtifactDocument::load(path)?;
        Ok(Self::from_document(document)?)
    }

    pub fn from_document(document: ArtifactDocument) -> Result<Self, MalformedArtifact> {
        let registry = VariableRegistry::from_specs(&document.variables)?;

        let info = &document.prevalence_info;
        let training_prevalence = Prevalence::new(info.training_prevalence).map_err(|_| {
            MalformedArtifact::InvalidPrevalence {
                field: "trainingPrevalence",
                value: info.training_prevalence,
            }
        })?;
        let default_target_prevalence =
            Prevalence::new(info.default_target_prevalence).map_err(|_| {
                MalformedArtifact::InvalidPrevalence {
                    field: "defaultTargetPrevalence",
                    value: info.default_target_prevalence,
                }
            })?;

        let mut models = Vec::with_capacity(document.models.len());
        let mut by_signature = AHashMap::with_capacity(document.models.len());
        for (name, spec) in &document.models {
            let model = FittedModel::from_spec(name, spec, &registry)?;
            if let Some(&existing) = by_signature.get(model.signature()) {
                let first: &FittedModel = &models[existing];
                return Err(MalformedArtifact::DuplicateSignature {
                    first: first.name().to_string(),
                    second: name.clone(),
                });
            }
            if !model.fit.converged {
                log::warn!("Model '{name}' did not converge during fitting");
            }
            by_signature.insert(model.signature().clone(), models.len());
            models.push(model);
        }

        log::info!(
            "Indexed {} models over {} variables (training prevalence {:.4}, default target {:.4})",
            models.len(),
            registry.len(),
            training_prevalence.value(),
            default_target_prevalence.value()
        );

        Ok(Self {
            registry,
            models,
            by_signature,
            training_prevalence,
            default_target_prevalence,
            metadata: document.metadata,
            disclaimer: document.disclaimer,
        })
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// Exact signature lookup.
    pub fn get(&self, signature: &Signature) -> Option<&FittedModel> {
        self.by_signature.get(signature).map(|&i| &self.models[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&FittedModel> {
        self.models.iter().find(|m| m.name() == name)
    }

    pub fn models(&self) -> &[FittedModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn training_prevalence(&self) -> Prevalence {
        self.training_prevalence
    }

    pub fn default_target_prevalence(&self) -> Prevalence {
        self.default_target_prevalence
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn disclaimer(&self) -> Option<&serde_json::Value> {
        self.disclaimer.as_ref()
    }
}

/// Internal module for layout helpers shared by model validation.
mod internal {
    use super::*;

    /// Reorders a term-keyed map into the canonical term order, requiring the
    /// key set to match the term list exactly.
    pub(super) fn ordered_vector(
        model: &str,
        terms: &[Term],
        values: &BTreeMap<String, f64>,
    ) -> Result<Array1<f64>, MalformedArtifact> {
        let mut ordered = Vec::with_capacity(terms.len());
        for term in terms {
            let value = values
                .get(&term.name)
                .ok_or_else(|| MalformedArtifact::MissingCoefficient {
                    model: model.to_string(),
                    term: term.name.clone(),
                })?;
            ordered.push(*value);
        }
        if let Some(extra) = values
            .keys()
            .find(|k| !terms.iter().any(|t| &t.name == *k))
        {
            return Err(MalformedArtifact::UnexpectedCoefficient {
                model: model.to_string(),
                term: extra.clone(),
            });
        }
        Ok(Array1::from_vec(ordered))
    }

    fn key_difference<'a>(
        terms: &[Term],
        found: impl Iterator<Item = &'a String>,
    ) -> Option<String> {
        let expected: BTreeSet<&str> = terms.iter().map(|t| t.name.as_str()).collect();
        let found: BTreeSet<&str> = found.map(String::as_str).collect();
        if expected == found {
            return None;
        }
        let missing: Vec<_> = expected.difference(&found).copied().collect();
        let unexpected: Vec<_> = found.difference(&expected).copied().collect();
        Some(format!("missing {missing:?}, unexpected {unexpected:?}"))
    }

    pub(super) fn dense_covariance(
        model: &str,
        terms: &[Term],
        nested: &NestedCovariance,
    ) -> Result<Array2<f64>, MalformedArtifact> {
        if let Some(detail) = key_difference(terms, nested.keys()) {
            return Err(MalformedArtifact::CovarianceKeyMismatch {
                model: model.to_string(),
                detail: format!("rows: {detail}"),
            });
        }
        for term in terms {
            let row = &nested[&term.name];
            if let Some(detail) = key_difference(terms, row.keys()) {
                return Err(MalformedArtifact::CovarianceKeyMismatch {
                    model: model.to_string(),
                    detail: format!("row '{}': {detail}", term.name),
                });
            }
        }

        let k = terms.len();
        let cov = Array2::from_shape_fn((k, k), |(i, j)| {
            nested[&terms[i].name][&terms[j].name]
        });

        if !cov.iter().all(|v| v.is_finite()) {
            return Err(MalformedArtifact::NonFiniteParameter {
                model: model.to_string(),
                field: "coefficientCovariance",
            });
        }
        for i in 0..k {
            for j in (i + 1)..k {
                let (a, b) = (cov[[i, j]], cov[[j, i]]);
                if (a - b).abs() > SYMMETRY_TOLERANCE * (1.0 + a.abs().max(b.abs())) {
                    return Err(MalformedArtifact::AsymmetricCovariance {
                        model: model.to_string(),
                        row: terms[i].name.clone(),
                        col: terms[j].name.clone(),
                    });
                }
            }
        }
        Ok(cov)
    }

    /// The covariance diagonal and the reported standard errors come from the
    /// same fit; a disagreement points at an artifact assembled from mixed runs.
    pub(super) fn warn_on_standard_error_drift(
        model: &str,
        terms: &[Term],
        cov: &Array2<f64>,
        se: &Array1<f64>,
    ) {
        for (i, term) in terms.iter().enumerate() {
            let implied = cov[[i, i]].max(0.0).sqrt();
            if (implied - se[i]).abs() > 1e-6 * (1.0 + se[i].abs()) {
                log::warn!(
                    "Model '{model}' term '{}': covariance implies SE {implied:.6}, artifact reports {:.6}",
                    term.name,
                    se[i]
                );
            }
        }
    }
}
