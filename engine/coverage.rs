//! How much of the non-empty subset lattice an artifact actually covers.
//!
//! Exact-match selection fails for every variable combination that has no
//! model, so this report is what `validate` shows before an artifact is put
//! into service.

use crate::repository::ModelRepository;
use crate::types::Signature;
use itertools::Itertools;
use serde::Serialize;

/// Above this many variables the missing signatures are counted but not listed.
pub const MAX_ENUMERATED_VARIABLES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeCoverage {
    pub size: usize,
    pub expected: u64,
    pub present: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub variable_count: usize,
    pub expected: u64,
    pub present: u64,
    pub by_size: Vec<SizeCoverage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<Vec<String>>>,
}

impl CoverageReport {
    pub fn is_complete(&self) -> bool {
        self.present == self.expected
    }

    pub fn fraction(&self) -> f64 {
        if self.expected == 0 {
            return 1.0;
        }
        self.present as f64 / self.expected as f64
    }
}

fn binomial(n: usize, k: usize) -> u64 {
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

pub fn coverage(repository: &ModelRepository) -> CoverageReport {
    let registry = repository.registry();
    let n = registry.len();

    let mut present_by_size = vec![0u64; n + 1];
    for model in repository.models() {
        present_by_size[model.signature().len()] += 1;
    }

    let by_size: Vec<SizeCoverage> = (1..=n)
        .map(|size| SizeCoverage {
            size,
            expected: binomial(n, size),
            present: present_by_size[size],
        })
        .collect();
    let expected = by_size.iter().fold(0u64, |acc, s| acc.saturating_add(s.expected));
    let present = by_size.iter().map(|s| s.present).sum();

    let missing = if n <= MAX_ENUMERATED_VARIABLES {
        let mut missing = Vec::new();
        for size in 1..=n {
            for combo in (0..n).combinations(size) {
                let signature = Signature::from_indices(combo);
                if repository.get(&signature).is_none() {
                    missing.push(
                        registry
                            .ids_of(signature.indices())
                            .map(str::to_string)
                            .collect(),
                    );
                }
            }
        }
        Some(missing)
    } else {
        log::debug!("Registry has {n} variables; missing signatures are counted but not listed");
        None
    };

    CoverageReport {
        variable_count: n,
        expected,
        present,
        by_size,
        missing,
    }
}
