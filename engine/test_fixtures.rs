//! Test fixtures and builders for engine unit tests.
//!
//! Two artifacts are provided: a boolean-only toy artifact with hand-checkable
//! numbers, and a mixed boolean/numeric artifact with correlated coefficients
//! and one covariance-free model.

use crate::artifact::{ArtifactDocument, ModelSpec, PrevalenceInfo, VariableSpec};
use crate::registry::ValueType;
use std::collections::BTreeMap;

pub fn variable(id: &str, value_type: ValueType) -> VariableSpec {
    VariableSpec {
        id: id.to_string(),
        value_type,
        label: Some(id.to_uppercase()),
        description: None,
        unit: None,
        min: None,
        max: None,
    }
}

/// A model over `variables` with an intercept of -1.0 (unless `terms` overrides
/// it) and a diagonal covariance of `variance` on every coefficient.
pub fn toy_model_spec(variables: &[&str], terms: &[(&str, f64)], variance: f64) -> ModelSpec {
    let mut coefficients = BTreeMap::new();
    coefficients.insert("(Intercept)".to_string(), -1.0);
    for (name, value) in terms {
        coefficients.insert(name.to_string(), *value);
    }

    let mut covariance = BTreeMap::new();
    for row in coefficients.keys() {
        let mut cols = BTreeMap::new();
        for col in coefficients.keys() {
            cols.insert(col.clone(), if row == col { variance } else { 0.0 });
        }
        covariance.insert(row.clone(), cols);
    }

    ModelSpec {
        variables: variables.iter().map(|v| v.to_string()).collect(),
        coefficients,
        coefficient_standard_errors: None,
        coefficient_covariance: Some(covariance),
        sample_size: 1000,
        n_positive: 500,
        n_negative: 500,
        auc: 0.7,
        converged: true,
        representative_interval_width: Some(0.15),
        residual_degrees_of_freedom: Some(997.0),
        decision_threshold: None,
        sensitivity_at_threshold: None,
        specificity_at_threshold: None,
    }
}

/// Variables `a`, `b`, `c` (all boolean); models for `{a}`, `{b}` and `{a, b}`
/// only, so `{c}` has no exact match. Training and default target prevalence
/// are both 0.5.
pub fn toy_document() -> ArtifactDocument {
    let mut models = BTreeMap::new();
    models.insert("m_a".to_string(), toy_model_spec(&["a"], &[("aTRUE", 1.2)], 0.02));
    models.insert("m_b".to_string(), toy_model_spec(&["b"], &[("bTRUE", 0.8)], 0.02));
    models.insert(
        "m_ab".to_string(),
        toy_model_spec(
            &["a", "b"],
            &[("(Intercept)", -2.0), ("aTRUE", 1.5), ("bTRUE", 1.0)],
            0.04,
        ),
    );

    ArtifactDocument {
        variables: vec![
            variable("a", ValueType::Boolean),
            variable("b", ValueType::Boolean),
            variable("c", ValueType::Boolean),
        ],
        models,
        prevalence_info: PrevalenceInfo {
            training_prevalence: 0.5,
            training_sample_size: Some(1000),
            training_positive_count: Some(500),
            training_negative_count: Some(500),
            default_target_prevalence: 0.5,
        },
        metadata: None,
        disclaimer: None,
    }
}

/// Variables `smoker` (boolean), `age` (numeric, 18..=100) and `sbp` (numeric).
///
/// - `m_smoker_age`: correlated covariance, Youden threshold 0.3.
/// - `m_age`: no covariance, representative width 0.12 only.
/// - `m_smoker`: diagonal covariance.
///
/// Training prevalence 0.2, default target 0.1.
pub fn mixed_document() -> ArtifactDocument {
    let mut age = variable("age", ValueType::Numeric);
    age.min = Some(18.0);
    age.max = Some(100.0);
    age.unit = Some("years".to_string());

    let mut smoker_age = toy_model_spec(
        &["smoker", "age"],
        &[("(Intercept)", -4.0), ("smokerTRUE", 0.9), ("age", 0.05)],
        0.0,
    );
    let cov = smoker_age.coefficient_covariance.as_mut().unwrap();
    let entries = [
        ("(Intercept)", "(Intercept)", 0.25),
        ("(Intercept)", "smokerTRUE", -0.01),
        ("(Intercept)", "age", -0.004),
        ("smokerTRUE", "smokerTRUE", 0.04),
        ("smokerTRUE", "age", 0.0002),
        ("age", "age", 0.0001),
    ];
    for (row, col, value) in entries {
        cov.get_mut(row).unwrap().insert(col.to_string(), value);
        cov.get_mut(col).unwrap().insert(row.to_string(), value);
    }
    smoker_age.decision_threshold = Some(0.3);
    smoker_age.sensitivity_at_threshold = Some(0.71);
    smoker_age.specificity_at_threshold = Some(0.64);

    let mut age_only = toy_model_spec(&["age"], &[("(Intercept)", -3.5), ("age", 0.04)], 0.0);
    age_only.coefficient_covariance = None;
    age_only.representative_interval_width = Some(0.12);

    let smoker_only = toy_model_spec(
        &["smoker"],
        &[("(Intercept)", -1.6), ("smokerTRUE", 0.7)],
        0.01,
    );

    let mut models = BTreeMap::new();
    models.insert("m_smoker_age".to_string(), smoker_age);
    models.insert("m_age".to_string(), age_only);
    models.insert("m_smoker".to_string(), smoker_only);

    ArtifactDocument {
        variables: vec![
            variable("smoker", ValueType::Boolean),
            age,
            variable("sbp", ValueType::Numeric),
        ],
        models,
        prevalence_info: PrevalenceInfo {
            training_prevalence: 0.2,
            training_sample_size: None,
            training_positive_count: None,
            training_negative_count: None,
            default_target_prevalence: 0.1,
        },
        metadata: Some(serde_json::json!({"name": "mixed fixture"})),
        disclaimer: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ModelRepository;

    #[test]
    fn fixtures_pass_artifact_validation() {
        assert_eq!(ModelRepository::from_document(toy_document()).unwrap().len(), 3);
        assert_eq!(ModelRepository::from_document(mixed_document()).unwrap().len(), 3);
    }
}
