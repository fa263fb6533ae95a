//! Linear predictor evaluation.
//!
//! The design vector has one entry per model term, in the model's canonical
//! term order: 1 for the intercept, 1/0 for a boolean's activated term, the raw
//! value for a numeric term, and 0 for anything absent, false or non-finite.
//! Variables outside the model never appear, because the vector is built over
//! the model's own terms. The interval estimator takes `Evaluation::design`, so
//! the point estimate and its variance always see the same activation.

use crate::registry::VariableRegistry;
use crate::repository::{FittedModel, TermBinding};
use crate::types::{SuppliedValues, VariableValue};
use ndarray::Array1;
use serde::Serialize;

/// Why a model term contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Absent,
    False,
    NonFinite,
}

/// One variable's share of the linear predictor, kept so that an omitted term
/// can be told apart from one that was evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermContribution {
    pub variable: String,
    pub term: String,
    pub value: Option<VariableValue>,
    pub contribution: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub out_of_range: bool,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Log-odds at the artifact's training prevalence.
    pub linear_predictor: f64,
    pub design: Array1<f64>,
    pub trace: Vec<TermContribution>,
}

fn activation(binding: TermBinding, values: &SuppliedValues) -> (f64, Option<SkipReason>) {
    match binding {
        TermBinding::Intercept => (1.0, None),
        TermBinding::Boolean(index) => match values.get(index) {
            Some(VariableValue::Boolean(true)) => (1.0, None),
            Some(VariableValue::Boolean(false)) => (0.0, Some(SkipReason::False)),
            Some(VariableValue::Numeric(_)) | None => (0.0, Some(SkipReason::Absent)),
        },
        TermBinding::Numeric(index) => match values.get(index) {
            Some(VariableValue::Numeric(v)) if v.is_finite() => (v, None),
            Some(VariableValue::Numeric(_)) => (0.0, Some(SkipReason::NonFinite)),
            Some(VariableValue::Boolean(_)) | None => (0.0, Some(SkipReason::Absent)),
        },
    }
}

/// Activation of every model term, in the model's term order.
pub fn design_vector(model: &FittedModel, values: &SuppliedValues) -> Array1<f64> {
    model
        .terms()
        .iter()
        .map(|term| activation(term.binding, values).0)
        .collect()
}

pub struct LinearPredictorEvaluator<'a> {
    registry: &'a VariableRegistry,
}

impl<'a> LinearPredictorEvaluator<'a> {
    pub fn new(registry: &'a VariableRegistry) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, model: &FittedModel, values: &SuppliedValues) -> Evaluation {
        let design = design_vector(model, values);
        let linear_predictor = design.dot(model.coefficients());

        let mut trace = Vec::with_capacity(model.terms().len().saturating_sub(1));
        for (i, term) in model.terms().iter().enumerate() {
            let index = match term.binding {
                TermBinding::Intercept => continue,
                TermBinding::Boolean(index) | TermBinding::Numeric(index) => index,
            };
            let Some(variable) = self.registry.get(index) else {
                continue;
            };

            let value = values.get(index);
            let (_, skipped) = activation(term.binding, values);
            if let Some(reason) = skipped {
                log::debug!(
                    "Model '{}': term '{}' contributes nothing ({reason:?})",
                    model.name(),
                    term.name
                );
            }

            let out_of_range = match (value, variable.bounds) {
                (Some(VariableValue::Numeric(v)), Some(bounds)) if v.is_finite() => {
                    !bounds.contains(v)
                }
                _ => false,
            };
            if out_of_range {
                log::warn!(
                    "Value {} for '{}' lies outside its declared bounds; evaluating anyway",
                    value.map(|v| v.to_string()).unwrap_or_default(),
                    variable.id
                );
            }

            trace.push(TermContribution {
                variable: variable.id.clone(),
                term: term.name.clone(),
                value,
                contribution: design[i] * model.coefficients()[i],
                skipped,
                out_of_range,
            });
        }

        Evaluation {
            linear_predictor,
            design,
            trace,
        }
    }
}
