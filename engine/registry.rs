//! The variable universe: every indicator a model may have been fitted on,
//! its value type, and the metadata a presentation layer needs to render it.
//!
//! Registry order is the canonical order. Model terms, signatures and
//! resolved request values are all indexed by a variable's position here.

use crate::artifact::{ACTIVATED_SUFFIX, MalformedArtifact, VariableSpec};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[serde(alias = "binary", alias = "bool")]
    Boolean,
    Numeric,
}

/// Descriptive fields carried for the presentation layer; never read by the math.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayMetadata {
    pub label: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumericBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericBounds {
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalVariable {
    pub id: String,
    pub value_type: ValueType,
    pub display: DisplayMetadata,
    /// Only numeric variables carry bounds.
    pub bounds: Option<NumericBounds>,
}

impl ClinicalVariable {
    /// The coefficient key this variable contributes to a model that uses it.
    pub fn term_name(&self) -> String {
        match self.value_type {
            ValueType::Boolean => format!("{}{ACTIVATED_SUFFIX}", self.id),
            ValueType::Numeric => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableRegistry {
    variables: Vec<ClinicalVariable>,
    by_id: AHashMap<String, usize>,
}

impl VariableRegistry {
    pub fn from_specs(specs: &[VariableSpec]) -> Result<Self, MalformedArtifact> {
        if specs.is_empty() {
            return Err(MalformedArtifact::EmptyRegistry);
        }

        let mut variables = Vec::with_capacity(specs.len());
        let mut by_id = AHashMap::with_capacity(specs.len());

        for (position, spec) in specs.iter().enumerate() {
            let id = spec.id.trim();
            if id.is_empty() {
                return Err(MalformedArtifact::EmptyVariableId { position });
            }
            if by_id.insert(id.to_string(), position).is_some() {
                return Err(MalformedArtifact::DuplicateVariable(id.to_string()));
            }

            let bounds = match spec.value_type {
                ValueType::Boolean => {
                    if spec.min.is_some() || spec.max.is_some() {
                        log::warn!("Ignoring numeric bounds declared on boolean variable '{id}'");
                    }
                    None
                }
                ValueType::Numeric => {
                    if let (Some(min), Some(max)) = (spec.min, spec.max) {
                        if min > max {
                            return Err(MalformedArtifact::InvertedBounds {
                                id: id.to_string(),
                                min,
                                max,
                            });
                        }
                    }
                    Some(NumericBounds {
                        min: spec.min,
                        max: spec.max,
                    })
                }
            };

            variables.push(ClinicalVariable {
                id: id.to_string(),
                value_type: spec.value_type,
                display: DisplayMetadata {
                    label: spec.label.clone(),
                    description: spec.description.clone(),
                    unit: spec.unit.clone(),
                },
                bounds,
            });
        }

        Ok(Self { variables, by_id })
    }

    #[inline]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ClinicalVariable> {
        self.variables.get(index)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClinicalVariable> {
        self.variables.iter()
    }

    /// Variable ids for a set of registry indices, in registry order.
    pub fn ids_of<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a str> + 'a {
        indices
            .iter()
            .filter_map(|&i| self.variables.get(i).map(|v| v.id.as_str()))
    }
}
