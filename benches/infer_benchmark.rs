use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tessera::artifact::{ArtifactDocument, ModelSpec, PrevalenceInfo, VariableSpec};
use tessera::batch::run_batch;
use tessera::registry::ValueType;
use tessera::types::VariableValue;
use tessera::{InferenceEngine, InferenceRequest, ModelRepository};

const VARIABLES: usize = 7;
const NUMERIC_FROM: usize = 5;

fn variable_id(i: usize) -> String {
    format!("v{i}")
}

fn term(i: usize) -> String {
    if i < NUMERIC_FROM {
        format!("v{i}TRUE")
    } else {
        variable_id(i)
    }
}

/// Every non-empty subset of seven variables, each with a diagonal covariance.
fn synthetic_document(rng: &mut StdRng) -> ArtifactDocument {
    let variables = (0..VARIABLES)
        .map(|i| VariableSpec {
            id: variable_id(i),
            value_type: if i < NUMERIC_FROM {
                ValueType::Boolean
            } else {
                ValueType::Numeric
            },
            label: None,
            description: None,
            unit: None,
            min: None,
            max: None,
        })
        .collect();

    let mut models = BTreeMap::new();
    for mask in 1u32..(1 << VARIABLES) {
        let members: Vec<usize> = (0..VARIABLES).filter(|i| mask & (1 << i) != 0).collect();
        let mut names = vec!["(Intercept)".to_string()];
        names.extend(members.iter().map(|&i| term(i)));

        let mut coefficients = BTreeMap::new();
        let mut covariance = BTreeMap::new();
        for name in &names {
            coefficients.insert(name.clone(), rng.gen_range(-0.5..0.5));
            let row: BTreeMap<String, f64> = names
                .iter()
                .map(|other| {
                    let v = if other == name { rng.gen_range(0.001..0.05) } else { 0.0 };
                    (other.clone(), v)
                })
                .collect();
            covariance.insert(name.clone(), row);
        }

        models.insert(
            format!("m{mask:03}"),
            ModelSpec {
                variables: members.iter().map(|&i| variable_id(i)).collect(),
                coefficients,
                coefficient_standard_errors: None,
                coefficient_covariance: Some(covariance),
                sample_size: 5000,
                n_positive: 500,
                n_negative: 4500,
                auc: rng.gen_range(0.55..0.8),
                converged: true,
                representative_interval_width: None,
                residual_degrees_of_freedom: None,
                decision_threshold: None,
                sensitivity_at_threshold: None,
                specificity_at_threshold: None,
            },
        );
    }

    ArtifactDocument {
        variables,
        models,
        prevalence_info: PrevalenceInfo {
            training_prevalence: 0.1,
            training_sample_size: Some(5000),
            training_positive_count: Some(500),
            training_negative_count: Some(4500),
            default_target_prevalence: 0.05,
        },
        metadata: None,
        disclaimer: None,
    }
}

fn request_with(size: usize, rng: &mut StdRng) -> InferenceRequest {
    (0..size).fold(InferenceRequest::new(), |request, i| {
        let value = if i < NUMERIC_FROM {
            VariableValue::Boolean(rng.gen_bool(0.5))
        } else {
            VariableValue::Numeric(rng.gen_range(-2.0..2.0))
        };
        request.with(&variable_id(i), value)
    })
}

fn batch_input(rows: usize, rng: &mut StdRng) -> String {
    let mut text = (0..VARIABLES).map(variable_id).collect::<Vec<_>>().join("\t");
    text.push('\n');
    for _ in 0..rows {
        let cells: Vec<String> = (0..VARIABLES)
            .map(|i| {
                if rng.gen_bool(0.3) {
                    "NA".to_string()
                } else if i < NUMERIC_FROM {
                    (rng.gen_bool(0.5) as u8).to_string()
                } else {
                    format!("{:.3}", rng.gen_range(-2.0..2.0))
                }
            })
            .collect();
        text.push_str(&cells.join("\t"));
        text.push('\n');
    }
    text
}

fn benchmark_infer(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x7E55_E8A);
    let repository = ModelRepository::from_document(synthetic_document(&mut rng))
        .expect("synthetic artifact is valid");
    let engine = InferenceEngine::with_defaults(repository);

    let mut group = c.benchmark_group("infer");
    for size in [1_usize, 4, VARIABLES] {
        let request = request_with(size, &mut rng);
        group.bench_with_input(BenchmarkId::new("signature_size", size), &request, |b, input| {
            b.iter(|| {
                let outcome = engine.infer(black_box(input)).expect("covered signature");
                black_box(outcome);
            });
        });
    }
    group.finish();

    let rows = 2000;
    let input = batch_input(rows, &mut rng);
    let mut group = c.benchmark_group("batch");
    group.throughput(Throughput::Elements(rows as u64));
    group.bench_function(BenchmarkId::new("tsv_rows", rows), |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(input.len() * 2);
            let summary =
                run_batch(&engine, black_box(input.as_bytes()), &mut out, None).expect("batch");
            black_box(summary);
        });
    });
    group.finish();
}

criterion_group!(infer_benchmark, benchmark_infer);
criterion_main!(infer_benchmark);
