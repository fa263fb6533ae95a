use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

/// Three predictors, four fitted subsets. `{hypertension}`, `{diabetes, hypertension}`
/// and `{hypertension, age}` have no model.
pub fn artifact_json() -> Value {
    json!({
        "variables": [
            { "id": "diabetes", "valueType": "boolean", "label": "Diabetes mellitus" },
            { "id": "hypertension", "valueType": "boolean", "label": "Hypertension" },
            { "id": "age", "valueType": "numeric", "label": "Age", "unit": "years",
              "min": 18.0, "max": 100.0 }
        ],
        "models": {
            "diabetes": {
                "variables": ["diabetes"],
                "coefficients": { "(Intercept)": -1.9, "diabetesTRUE": 0.9 },
                "coefficientCovariance": {
                    "(Intercept)": { "(Intercept)": 0.004, "diabetesTRUE": -0.004 },
                    "diabetesTRUE": { "(Intercept)": -0.004, "diabetesTRUE": 0.012 }
                },
                "sampleSize": 4000, "nPositive": 600, "nNegative": 3400,
                "auc": 0.58, "converged": true
            },
            "age": {
                "variables": ["age"],
                "coefficients": { "(Intercept)": -4.6, "age": 0.055 },
                "sampleSize": 4000, "nPositive": 600, "nNegative": 3400,
                "auc": 0.66, "converged": true,
                "representativeIntervalWidth": 0.08
            },
            "diabetes_age": {
                "variables": ["diabetes", "age"],
                "coefficients": { "(Intercept)": -5.0, "diabetesTRUE": 0.8, "age": 0.06 },
                "coefficientCovariance": {
                    "(Intercept)": { "(Intercept)": 0.09, "diabetesTRUE": 0.0, "age": -0.0012 },
                    "diabetesTRUE": { "(Intercept)": 0.0, "diabetesTRUE": 0.01, "age": 0.0 },
                    "age": { "(Intercept)": -0.0012, "diabetesTRUE": 0.0, "age": 0.00002 }
                },
                "sampleSize": 4000, "nPositive": 600, "nNegative": 3400,
                "auc": 0.71, "converged": true,
                "decisionThreshold": 0.18,
                "sensitivityAtThreshold": 0.66,
                "specificityAtThreshold": 0.67
            },
            "full": {
                "variables": ["diabetes", "hypertension", "age"],
                "coefficients": {
                    "(Intercept)": -5.2, "diabetesTRUE": 0.75,
                    "hypertensionTRUE": 0.4, "age": 0.058
                },
                "coefficientStandardErrors": {
                    "(Intercept)": 0.3, "diabetesTRUE": 0.1,
                    "hypertensionTRUE": 0.09, "age": 0.005
                },
                "sampleSize": 3900, "nPositive": 590, "nNegative": 3310,
                "auc": 0.73, "converged": false,
                "representativeIntervalWidth": 0.1
            }
        },
        "prevalenceInfo": {
            "trainingPrevalence": 0.15,
            "trainingSampleSize": 4000,
            "defaultTargetPrevalence": 0.05
        },
        "metadata": { "outcome": "ten-year cardiovascular event" },
        "disclaimer": "For research use only."
    })
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).expect("serialize fixture"))
        .expect("write fixture");
    path
}
