// ========================================================================================
//
//                      THE INFERENCE ORCHESTRATOR
//
// ========================================================================================
//
// `InferenceEngine` is the only component with an external call surface. It owns the
// validated artifact and the configured estimators, is built once at startup, and is
// immutable afterwards: every `infer` call is a pure function of the request and the
// engine, so a shared `&InferenceEngine` can serve any number of threads.
//
// Pipeline for one request:
//
// 1.  Resolve the sparse id → value map against the registry.
// 2.  Stop with `NoInput` when nothing informative was supplied.
// 3.  Select the model fitted on exactly the supplied variables.
// 4.  Evaluate the raw linear predictor over that model's terms only.
// 5.  Shift it from the training prevalence to the target prevalence.
// 6.  Estimate the interval, classify its width, assemble the result.

use crate::config::{ConfigError, EngineConfig};
use crate::interval::{ConfidenceInterval, ConfidenceIntervalEstimator};
use crate::predictor::{LinearPredictorEvaluator, TermContribution};
use crate::prevalence::{self, Prevalence, PrevalenceError, PrevalenceShift};
use crate::registry::ValueType;
use crate::repository::ModelRepository;
use crate::selector::{ModelSelector, SelectionError, SelectionMethod};
use crate::severity::{SeverityTier, UncertaintyClassifier};
use crate::types::{SuppliedValues, VariableValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A sparse set of caller values. A missing key and an explicit `null` both
/// mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    #[serde(default)]
    pub values: BTreeMap<String, Option<VariableValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_prevalence: Option<f64>,
}

impl InferenceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, value: VariableValue) -> Self {
        self.values.insert(id.to_string(), Some(value));
        self
    }

    pub fn with_absent(mut self, id: &str) -> Self {
        self.values.insert(id.to_string(), None);
        self
    }

    pub fn with_target_prevalence(mut self, prevalence: f64) -> Self {
        self.target_prevalence = Some(prevalence);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("variable '{0}' is not part of this model artifact")]
    UnknownVariable(String),
    #[error("variable '{variable}' expects a {expected:?} value but was given '{found}'")]
    TypeMismatch {
        variable: String,
        expected: ValueType,
        found: VariableValue,
    },
    #[error("no model in the artifact was fitted on exactly the variables {variables:?}")]
    NoModelMatch { variables: Vec<String> },
    #[error("invalid target prevalence: {0}")]
    InvalidPrevalence(#[from] PrevalenceError),
    #[error("model '{model}' produced a non-finite {quantity} for these inputs")]
    NonFinitePrediction {
        model: String,
        quantity: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub auc: f64,
    pub sample_size: u64,
    pub n_positive: u64,
    pub n_negative: u64,
    pub converged: bool,
}

/// Where the estimate falls relative to the model's Youden-optimal cutoff.
/// The comparison is made at the training prevalence, where the cutoff was fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdDecision {
    pub threshold: f64,
    pub at_or_above: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specificity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    /// Probability at the target prevalence.
    pub probability: f64,
    /// Probability at the artifact's training prevalence.
    pub raw_probability: f64,
    /// Log-odds at the target prevalence.
    pub linear_predictor: f64,
    pub confidence_interval: ConfidenceInterval,
    pub selected_model_id: String,
    pub selection: SelectionMethod,
    pub severity_tier: SeverityTier,
    pub target_prevalence: Prevalence,
    pub model: ModelSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_decision: Option<ThresholdDecision>,
    pub trace: Vec<TermContribution>,
}

/// `NoInput` is not a failure: the caller simply has nothing to show yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum InferenceOutcome {
    NoInput,
    Estimate(InferenceResult),
}

impl InferenceOutcome {
    pub fn estimate(&self) -> Option<&InferenceResult> {
        match self {
            InferenceOutcome::Estimate(result) => Some(result),
            InferenceOutcome::NoInput => None,
        }
    }

    pub fn into_estimate(self) -> Option<InferenceResult> {
        match self {
            InferenceOutcome::Estimate(result) => Some(result),
            InferenceOutcome::NoInput => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceEngine {
    repository: ModelRepository,
    selector: ModelSelector,
    estimator: ConfidenceIntervalEstimator,
    classifier: UncertaintyClassifier,
    default_target_prevalence: Prevalence,
}

impl InferenceEngine {
    pub fn new(repository: ModelRepository, config: &EngineConfig) -> Result<Self, ConfigError> {
        let estimator = ConfidenceIntervalEstimator::new(config.inference.confidence_level)?;
        let classifier = UncertaintyClassifier::new(config.severity)?;
        let default_target_prevalence = match config.inference.default_target_prevalence {
            Some(p) => Prevalence::new(p)?,
            None => repository.default_target_prevalence(),
        };
        log::info!(
            "Inference engine ready: {:?} selection, {:.0}% intervals, default target prevalence {:.4}",
            config.inference.selection,
            estimator.confidence_level() * 100.0,
            default_target_prevalence.value()
        );
        Ok(Self {
            repository,
            selector: ModelSelector::new(config.inference.selection),
            estimator,
            classifier,
            default_target_prevalence,
        })
    }

    pub fn with_defaults(repository: ModelRepository) -> Self {
        let default_target_prevalence = repository.default_target_prevalence();
        Self {
            repository,
            selector: ModelSelector::default(),
            estimator: ConfidenceIntervalEstimator::default(),
            classifier: UncertaintyClassifier::default(),
            default_target_prevalence,
        }
    }

    pub fn repository(&self) -> &ModelRepository {
        &self.repository
    }

    pub fn default_target_prevalence(&self) -> Prevalence {
        self.default_target_prevalence
    }

    /// Maps request ids onto registry slots, rejecting unknown ids and values
    /// of the wrong type.
    pub fn resolve(&self, request: &InferenceRequest) -> Result<SuppliedValues, EngineError> {
        let registry = self.repository.registry();
        let mut values = SuppliedValues::empty(registry.len());
        for (id, value) in &request.values {
            let index = registry
                .index_of(id)
                .ok_or_else(|| EngineError::UnknownVariable(id.clone()))?;
            if let Some(value) = value {
                let expected = registry
                    .get(index)
                    .map(|v| v.value_type)
                    .unwrap_or(ValueType::Numeric);
                let matches = matches!(
                    (expected, value),
                    (ValueType::Boolean, VariableValue::Boolean(_))
                        | (ValueType::Numeric, VariableValue::Numeric(_))
                );
                if !matches {
                    return Err(EngineError::TypeMismatch {
                        variable: id.clone(),
                        expected,
                        found: *value,
                    });
                }
            }
            values.set(index, *value);
        }
        Ok(values)
    }

    pub fn infer(&self, request: &InferenceRequest) -> Result<InferenceOutcome, EngineError> {
        let values = self.resolve(request)?;
        self.infer_resolved(&values, request.target_prevalence)
    }

    /// Runs the pipeline on already-resolved values. `target_prevalence`
    /// falls back to the engine default when `None`.
    pub fn infer_resolved(
        &self,
        values: &SuppliedValues,
        target_prevalence: Option<f64>,
    ) -> Result<InferenceOutcome, EngineError> {
        let target = match target_prevalence {
            Some(p) => Prevalence::new(p)?,
            None => self.default_target_prevalence,
        };

        let known = values.known_signature();
        if known.is_empty() {
            log::debug!("No informative values supplied; nothing to infer yet");
            return Ok(InferenceOutcome::NoInput);
        }

        let selection = match self.selector.select(&self.repository, &known) {
            Ok(selection) => selection,
            Err(SelectionError::EmptySignature) => return Ok(InferenceOutcome::NoInput),
            Err(SelectionError::NoModelMatch { variables }) => {
                return Err(EngineError::NoModelMatch { variables });
            }
        };
        let model = selection.model;
        if !model.fit.converged {
            log::warn!("Serving an estimate from non-converged model '{}'", model.name());
        }

        let evaluation =
            LinearPredictorEvaluator::new(self.repository.registry()).evaluate(model, values);
        let shift = PrevalenceShift::new(self.repository.training_prevalence(), target);
        let adjusted = shift.apply(evaluation.linear_predictor);

        let non_finite = |quantity: &'static str| EngineError::NonFinitePrediction {
            model: model.name().to_string(),
            quantity,
        };
        if !evaluation.linear_predictor.is_finite() || !adjusted.is_finite() {
            return Err(non_finite("linear predictor"));
        }

        let probability = prevalence::probability(adjusted);
        let raw_probability = prevalence::probability(evaluation.linear_predictor);
        let confidence_interval = self.estimator.estimate(model, &evaluation.design, adjusted);
        if confidence_interval.standard_error.is_some_and(|se| !se.is_finite()) {
            return Err(non_finite("standard error"));
        }
        let severity_tier = self.classifier.classify(confidence_interval.width);

        let threshold_decision = model.operating_point.map(|op| ThresholdDecision {
            threshold: op.threshold,
            at_or_above: raw_probability >= op.threshold,
            sensitivity: op.sensitivity,
            specificity: op.specificity,
        });

        log::debug!(
            "Model '{}': lp {:.4} -> {:.4} (offset {:.4}), p = {:.4} [{:.4}, {:.4}], {}",
            model.name(),
            evaluation.linear_predictor,
            adjusted,
            shift.offset(),
            probability,
            confidence_interval.lower,
            confidence_interval.upper,
            severity_tier
        );

        Ok(InferenceOutcome::Estimate(InferenceResult {
            probability,
            raw_probability,
            linear_predictor: adjusted,
            confidence_interval,
            selected_model_id: model.name().to_string(),
            selection: selection.method,
            severity_tier,
            target_prevalence: target,
            model: ModelSummary {
                auc: model.fit.auc,
                sample_size: model.fit.sample_size,
                n_positive: model.fit.n_positive,
                n_negative: model.fit.n_negative,
                converged: model.fit.converged,
            },
            threshold_decision,
            trace: evaluation.trace,
        }))
    }
}
