//! Tab-separated batch inference.
//!
//! Input: a header row of variable ids (plus an optional `sample_id` column)
//! and one patient per row. Empty, `NA` and `.` cells are absent. Rows are
//! evaluated in parallel against one shared engine; a failing row is reported
//! in the output and does not stop the batch.

use crate::interval::IntervalMethod;
use crate::orchestrator::{InferenceEngine, InferenceOutcome, InferenceResult};
use crate::prevalence::{Prevalence, PrevalenceError};
use crate::registry::{ClinicalVariable, ValueType};
use crate::types::{SuppliedValues, VariableValue};
use ahash::AHashSet;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

pub const SAMPLE_ID_COLUMN: &str = "sample_id";

const OUTPUT_COLUMNS: [&str; 10] = [
    "status",
    "selected_model",
    "probability",
    "raw_probability",
    "lower",
    "upper",
    "width",
    "interval_method",
    "severity",
    "message",
];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed TSV input: {0}")]
    Csv(#[from] csv::Error),
    #[error("Column '{0}' is not a variable in this artifact")]
    UnknownColumn(String),
    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),
    #[error("Invalid target prevalence: {0}")]
    Prevalence(#[from] PrevalenceError),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("column '{column}': cannot read '{raw}' as a {expected:?} value")]
pub struct CellError {
    pub column: String,
    pub raw: String,
    pub expected: ValueType,
}

/// Why a single input row could not be evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error(transparent)]
    Cell(#[from] CellError),
    #[error("row has {found} fields but the header has {expected}")]
    FieldCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub rows: usize,
    pub estimated: usize,
    pub no_input: usize,
    pub failed: usize,
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw == "." || raw.eq_ignore_ascii_case("na")
}

/// Reads one cell for `variable`. Absent markers yield `Ok(None)`.
pub fn parse_cell(
    variable: &ClinicalVariable,
    raw: &str,
) -> Result<Option<VariableValue>, CellError> {
    let raw = raw.trim();
    if is_missing(raw) {
        return Ok(None);
    }
    let parsed = match variable.value_type {
        ValueType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(VariableValue::Boolean(true)),
            "false" | "0" | "no" => Some(VariableValue::Boolean(false)),
            _ => None,
        },
        ValueType::Numeric => raw.parse::<f64>().ok().map(VariableValue::Numeric),
    };
    parsed.map(Some).ok_or_else(|| CellError {
        column: variable.id.clone(),
        raw: raw.to_string(),
        expected: variable.value_type,
    })
}

enum Column {
    SampleId,
    Variable(usize),
}

struct Row {
    sample_id: Option<String>,
    values: Result<SuppliedValues, RowError>,
}

fn resolve_header(
    engine: &InferenceEngine,
    headers: &csv::StringRecord,
) -> Result<Vec<Column>, BatchError> {
    let registry = engine.repository().registry();
    let mut seen = AHashSet::new();
    headers
        .iter()
        .map(|name| {
            if !seen.insert(name) {
                return Err(BatchError::DuplicateColumn(name.to_string()));
            }
            if name == SAMPLE_ID_COLUMN {
                return Ok(Column::SampleId);
            }
            registry
                .index_of(name)
                .map(Column::Variable)
                .ok_or_else(|| BatchError::UnknownColumn(name.to_string()))
        })
        .collect()
}

fn read_row(engine: &InferenceEngine, columns: &[Column], record: &csv::StringRecord) -> Row {
    let registry = engine.repository().registry();
    let sample_id = columns
        .iter()
        .zip(record.iter())
        .find_map(|(column, raw)| matches!(column, Column::SampleId).then(|| raw.to_string()));
    if record.len() != columns.len() {
        return Row {
            sample_id,
            values: Err(RowError::FieldCount {
                expected: columns.len(),
                found: record.len(),
            }),
        };
    }

    let mut values = SuppliedValues::empty(registry.len());
    for (column, raw) in columns.iter().zip(record.iter()) {
        let Column::Variable(index) = *column else {
            continue;
        };
        let Some(variable) = registry.get(index) else {
            continue;
        };
        match parse_cell(variable, raw) {
            Ok(value) => values.set(index, value),
            Err(e) => {
                return Row {
                    sample_id,
                    values: Err(RowError::Cell(e)),
                };
            }
        }
    }
    Row {
        sample_id,
        values: Ok(values),
    }
}

fn fmt6(x: f64) -> String {
    format!("{x:.6}")
}

fn estimate_fields(result: &InferenceResult) -> Vec<String> {
    let ci = &result.confidence_interval;
    let method = match ci.method {
        IntervalMethod::DeltaMethod => "delta_method",
        IntervalMethod::Fallback => "fallback",
    };
    vec![
        "ok".to_string(),
        result.selected_model_id.clone(),
        fmt6(result.probability),
        fmt6(result.raw_probability),
        fmt6(ci.lower),
        fmt6(ci.upper),
        fmt6(ci.width),
        method.to_string(),
        result.severity_tier.to_string(),
        String::new(),
    ]
}

fn status_fields(status: &str, message: String) -> Vec<String> {
    let mut fields = vec![String::new(); OUTPUT_COLUMNS.len()];
    fields[0] = status.to_string();
    fields[OUTPUT_COLUMNS.len() - 1] = message;
    fields
}

/// Reads a whole TSV batch from `input`, evaluates it, and writes the results to `output`.
pub fn run_batch<R: Read, W: Write>(
    engine: &InferenceEngine,
    input: R,
    output: W,
    target_prevalence: Option<f64>,
) -> Result<BatchSummary, BatchError> {
    if let Some(p) = target_prevalence {
        Prevalence::new(p)?;
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let columns = resolve_header(engine, &headers)?;
    let has_sample_id = columns.iter().any(|c| matches!(c, Column::SampleId));

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(read_row(engine, &columns, &record?));
    }
    log::info!("Evaluating {} rows in parallel", rows.len());

    let outputs: Vec<Vec<String>> = rows
        .par_iter()
        .map(|row| match &row.values {
            Err(e) => status_fields("error", e.to_string()),
            Ok(values) => match engine.infer_resolved(values, target_prevalence) {
                Ok(InferenceOutcome::Estimate(result)) => estimate_fields(&result),
                Ok(InferenceOutcome::NoInput) => {
                    status_fields("no_input", "no informative values supplied".to_string())
                }
                Err(e) => status_fields("error", e.to_string()),
            },
        })
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(output);
    let mut header: Vec<&str> = Vec::with_capacity(OUTPUT_COLUMNS.len() + 1);
    if has_sample_id {
        header.push(SAMPLE_ID_COLUMN);
    }
    header.extend(OUTPUT_COLUMNS);
    writer.write_record(&header)?;

    let mut summary = BatchSummary {
        rows: rows.len(),
        ..BatchSummary::default()
    };
    for (row, fields) in rows.iter().zip(outputs) {
        match fields[0].as_str() {
            "ok" => summary.estimated += 1,
            "no_input" => summary.no_input += 1,
            _ => summary.failed += 1,
        }
        if has_sample_id {
            let id = row.sample_id.as_deref().unwrap_or_default();
            writer.write_record(std::iter::once(id).chain(fields.iter().map(String::as_str)))?;
        } else {
            writer.write_record(&fields)?;
        }
    }
    writer.flush()?;

    if summary.failed > 0 {
        log::warn!("{} of {} rows could not be evaluated", summary.failed, summary.rows);
    }
    Ok(summary)
}

/// File-path wrapper around [`run_batch`]; writes to stdout when `output` is `None`.
pub fn run_batch_files(
    engine: &InferenceEngine,
    input: &Path,
    output: Option<&Path>,
    target_prevalence: Option<f64>,
) -> Result<BatchSummary, BatchError> {
    let input = File::open(input)?;
    match output {
        Some(path) => run_batch(engine, input, File::create(path)?, target_prevalence),
        None => run_batch(engine, input, io::stdout().lock(), target_prevalence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ModelRepository;
    use crate::test_fixtures::{mixed_document, toy_document};
    use tempfile::NamedTempFile;

    fn engine(doc: crate::artifact::ArtifactDocument) -> InferenceEngine {
        InferenceEngine::with_defaults(ModelRepository::from_document(doc).unwrap())
    }

    fn run(engine: &InferenceEngine, input: &str) -> (BatchSummary, Vec<Vec<String>>) {
        let mut out = Vec::new();
        let summary = run_batch(engine, input.as_bytes(), &mut out, None).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines = text
            .lines()
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect();
        (summary, lines)
    }

    #[test]
    fn cells_parse_by_variable_type() {
        let repo = ModelRepository::from_document(mixed_document()).unwrap();
        let smoker = repo.registry().get(0).unwrap();
        let age = repo.registry().get(1).unwrap();

        for raw in ["", "NA", "na", ".", "  "] {
            assert_eq!(parse_cell(smoker, raw).unwrap(), None);
        }
        assert_eq!(parse_cell(smoker, "Yes").unwrap(), Some(VariableValue::Boolean(true)));
        assert_eq!(parse_cell(smoker, "0").unwrap(), Some(VariableValue::Boolean(false)));
        assert_eq!(parse_cell(age, "54.5").unwrap(), Some(VariableValue::Numeric(54.5)));
        assert!(parse_cell(smoker, "maybe").is_err());
        assert!(parse_cell(age, "old").is_err());
    }

    #[test]
    fn rows_are_evaluated_in_order_with_failures_reported_inline() {
        let engine = engine(toy_document());
        let input = "sample_id\ta\tb\tc\n\
                     p1\ttrue\ttrue\t\n\
                     p2\t\t\tNA\n\
                     p3\tfalse\t\tyes\n\
                     p4\tmaybe\t\t\n\
                     p5\t1\t.\t.\n";
        let (summary, lines) = run(&engine, input);

        assert_eq!(
            summary,
            BatchSummary {
                rows: 5,
                estimated: 2,
                no_input: 1,
                failed: 2,
            }
        );
        assert_eq!(lines[0][0], "sample_id");
        assert_eq!(lines[0][1], "status");
        assert_eq!(lines.len(), 6);

        assert_eq!(lines[1][..3], ["p1", "ok", "m_ab"]);
        assert_eq!(lines[1][3], "0.622459");
        assert_eq!(lines[1][9], "medium");
        assert_eq!(lines[2][..2], ["p2", "no_input"]);
        assert_eq!(lines[3][..2], ["p3", "error"]);
        assert!(lines[3][10].contains("no model"));
        assert_eq!(lines[4][..2], ["p4", "error"]);
        assert!(lines[4][10].contains("maybe"));
        assert_eq!(lines[5][..3], ["p5", "ok", "m_a"]);
    }

    #[test]
    fn ragged_rows_fail_alone() {
        let engine = engine(toy_document());
        let input = "sample_id\ta\tb\n\
                     r1\ttrue\ttrue\n\
                     r2\ttrue\n\
                     r3\ttrue\ttrue\tfalse\n\
                     r4\t\ttrue\n";
        let (summary, lines) = run(&engine, input);

        assert_eq!(summary.rows, 4);
        assert_eq!(summary.estimated, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1][..3], ["r1", "ok", "m_ab"]);
        assert_eq!(lines[2][..2], ["r2", "error"]);
        assert!(lines[2][10].contains("2 fields"), "{:?}", lines[2]);
        assert_eq!(lines[3][..2], ["r3", "error"]);
        assert!(lines[3][10].contains("4 fields"), "{:?}", lines[3]);
        assert_eq!(lines[4][..3], ["r4", "ok", "m_b"]);
    }

    #[test]
    fn unknown_and_duplicate_columns_reject_the_file() {
        let engine = engine(toy_document());
        let mut out = Vec::new();
        let err = run_batch(&engine, "a\tzz\ntrue\t1\n".as_bytes(), &mut out, None).unwrap_err();
        assert!(matches!(err, BatchError::UnknownColumn(ref c) if c == "zz"));

        let err = run_batch(&engine, "a\ta\ntrue\t1\n".as_bytes(), &mut out, None).unwrap_err();
        assert!(matches!(err, BatchError::DuplicateColumn(_)));

        let err = run_batch(&engine, "a\ntrue\n".as_bytes(), &mut out, Some(1.5)).unwrap_err();
        assert!(matches!(err, BatchError::Prevalence(_)));
    }

    #[test]
    fn files_round_trip_without_sample_ids() {
        let engine = engine(mixed_document());
        let mut input = NamedTempFile::new().unwrap();
        write!(input, "age\tsmoker\n62\tno\n45\t\n").unwrap();
        input.flush().unwrap();
        let output = NamedTempFile::new().unwrap();

        let summary =
            run_batch_files(&engine, input.path(), Some(output.path()), Some(0.2)).unwrap();
        assert_eq!(summary.estimated, 2);

        let text = std::fs::read_to_string(output.path()).unwrap();
        let lines: Vec<Vec<&str>> = text.lines().map(|l| l.split('\t').collect()).collect();
        assert_eq!(lines[0][0], "status");
        assert_eq!(lines[1][1], "m_smoker_age");
        assert_eq!(lines[2][1], "m_age");
        assert_eq!(lines[2][7], "fallback");
    }
}
