//! Model selection by variable-set signature.
//!
//! The default policy is exact set equality: the selected model was fitted on
//! precisely the variables the caller supplied. Anything else changes which
//! statistical model is being evaluated, so a miss is reported, not patched.
//!
//! `SelectionPolicy::LargestSubset` is an opt-in extension for deployments whose
//! artifact does not cover the full subset lattice. It only ever picks a model
//! whose variables were all supplied; the surplus inputs are then ignored.

use crate::repository::{FittedModel, ModelRepository};
use crate::types::Signature;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    #[default]
    Exact,
    LargestSubset,
}

/// How the returned model relates to the supplied variable set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMethod {
    Exact,
    LargestSubset,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("no variables were supplied, so there is no model to select")]
    EmptySignature,
    #[error("no model in the artifact was fitted on exactly the variables {variables:?}")]
    NoModelMatch { variables: Vec<String> },
}

#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub model: &'a FittedModel,
    pub method: SelectionMethod,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ModelSelector {
    policy: SelectionPolicy,
}

impl ModelSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn select<'a>(
        &self,
        repository: &'a ModelRepository,
        known: &Signature,
    ) -> Result<Selection<'a>, SelectionError> {
        if known.is_empty() {
            return Err(SelectionError::EmptySignature);
        }

        if let Some(model) = repository.get(known) {
            log::debug!("Exact model match '{}'", model.name());
            return Ok(Selection {
                model,
                method: SelectionMethod::Exact,
            });
        }

        if self.policy == SelectionPolicy::LargestSubset {
            if let Some(model) = largest_subset(repository, known) {
                log::debug!(
                    "No exact match; using '{}' fitted on {} of {} supplied variables",
                    model.name(),
                    model.signature().len(),
                    known.len()
                );
                return Ok(Selection {
                    model,
                    method: SelectionMethod::LargestSubset,
                });
            }
        }

        let variables = repository
            .registry()
            .ids_of(known.indices())
            .map(str::to_string)
            .collect();
        Err(SelectionError::NoModelMatch { variables })
    }
}

/// The model fitted on the most supplied variables and nothing else. Ties go to
/// the higher AUC, then to the lexicographically first name.
fn largest_subset<'a>(
    repository: &'a ModelRepository,
    known: &Signature,
) -> Option<&'a FittedModel> {
    repository
        .models()
        .iter()
        .filter(|m| m.signature().len() < known.len() && m.signature().is_subset_of(known))
        .max_by(|a, b| {
            a.signature()
                .len()
                .cmp(&b.signature().len())
                .then(a.fit.auc.total_cmp(&b.fit.auc))
                .then_with(|| b.name().cmp(a.name()))
        })
}
