// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value supplied by the caller for one variable.
///
/// Absence is not a variant: an absent variable is simply `None` wherever a
/// `VariableValue` is optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Boolean(bool),
    Numeric(f64),
}

impl VariableValue {
    /// Whether this value carries information a model can condition on.
    /// Booleans always do (false is information); numbers only when finite.
    #[inline]
    pub fn is_informative(&self) -> bool {
        match *self {
            VariableValue::Boolean(_) => true,
            VariableValue::Numeric(v) => v.is_finite(),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Boolean(b) => write!(f, "{b}"),
            VariableValue::Numeric(v) => write!(f, "{v}"),
        }
    }
}

/// The unordered set of variables a model was fitted on, stored as sorted,
/// de-duplicated registry indices so that equality is set equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Signature(Vec<usize>);

impl Signature {
    pub fn from_indices<I: IntoIterator<Item = usize>>(indices: I) -> Self {
        let mut values: Vec<usize> = indices.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn is_subset_of(&self, other: &Signature) -> bool {
        self.0.iter().all(|&i| other.contains(i))
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// Caller values resolved against the registry: one slot per registry
/// variable, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct SuppliedValues(Vec<Option<VariableValue>>);

impl SuppliedValues {
    pub fn empty(universe_size: usize) -> Self {
        Self(vec![None; universe_size])
    }

    pub fn set(&mut self, index: usize, value: Option<VariableValue>) {
        self.0[index] = value;
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<VariableValue> {
        self.0.get(index).copied().flatten()
    }

    /// The variables that carry information, i.e. the set a model must match.
    pub fn known_signature(&self) -> Signature {
        Signature::from_indices(
            self.0
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some_and(|v| v.is_informative()))
                .map(|(i, _)| i),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
