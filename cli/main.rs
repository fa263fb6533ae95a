#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use tessera::batch::{parse_cell, run_batch_files};
use tessera::coverage::coverage;
use tessera::orchestrator::EngineError;
use tessera::{EngineConfig, InferenceEngine, InferenceOutcome, InferenceRequest, ModelRepository};

#[derive(Args)]
pub struct EngineArgs {
    /// Path to the model artifact (.json)
    #[arg(long)]
    pub artifact: PathBuf,

    /// Optional engine configuration (.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target prevalence to adjust estimates to (overrides config and artifact defaults)
    #[arg(long)]
    pub prevalence: Option<f64>,
}

#[derive(Args)]
pub struct InferArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Variable value as id=value; repeatable. Use NA for an explicit absence.
    #[arg(long = "set", value_name = "ID=VALUE")]
    pub set: Vec<String>,

    /// JSON request file with {"values": {...}, "targetPrevalence": ...}
    #[arg(long)]
    pub request: Option<PathBuf>,
}

#[derive(Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// TSV with one column per variable id and an optional sample_id column
    pub input: PathBuf,

    /// Output TSV path (defaults to stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Subset-matched logistic risk estimation",
    long_about = "Estimates the probability of a binary clinical outcome from whatever subset \
                  of predictors is known, using the model fitted on exactly that subset."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate risk for one patient
    #[command(about = "Estimate risk for one patient (prints JSON)")]
    Infer(InferArgs),

    /// Estimate risk for every row of a TSV file
    #[command(about = "Estimate risk for each row of a TSV file (outputs TSV)")]
    Batch(BatchArgs),

    /// Load and validate an artifact, then report its coverage
    #[command(about = "Validate a model artifact and report subset coverage")]
    Validate {
        /// Path to the model artifact (.json)
        #[arg(long)]
        artifact: PathBuf,
    },

    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::init();
    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Infer(args)) => infer(args),
        Some(Commands::Batch(args)) => batch(args),
        Some(Commands::Validate { artifact }) => validate(artifact),
        Some(Commands::Version) => {
            println!("tessera {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|_| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn build_engine(args: &EngineArgs) -> Result<InferenceEngine, Box<dyn std::error::Error>> {
    let repository = ModelRepository::load(&args.artifact)?;
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Ok(InferenceEngine::new(repository, &config)?)
}

fn infer(args: InferArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(&args.engine)?;

    let mut request = match &args.request {
        Some(path) => serde_json::from_str::<InferenceRequest>(&fs::read_to_string(path)?)?,
        None => InferenceRequest::new(),
    };
    let registry = engine.repository().registry();
    for pair in &args.set {
        let (id, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("--set expects ID=VALUE, got '{pair}'"))?;
        let id = id.trim();
        let variable = registry
            .index_of(id)
            .and_then(|i| registry.get(i))
            .ok_or_else(|| EngineError::UnknownVariable(id.to_string()))?;
        request
            .values
            .insert(id.to_string(), parse_cell(variable, raw)?);
    }
    if args.engine.prevalence.is_some() {
        request.target_prevalence = args.engine.prevalence;
    }

    match engine.infer(&request)? {
        InferenceOutcome::NoInput => {
            eprintln!("No informative values supplied; nothing to estimate.");
        }
        outcome @ InferenceOutcome::Estimate(_) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }
    Ok(())
}

fn batch(args: BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(&args.engine)?;
    let summary = run_batch_files(
        &engine,
        &args.input,
        args.output.as_deref(),
        args.engine.prevalence,
    )?;
    eprintln!(
        "Processed {} rows: {} estimated, {} without input, {} failed",
        summary.rows, summary.estimated, summary.no_input, summary.failed
    );
    if let Some(path) = &args.output {
        eprintln!("Results written to {}", path.display());
    }
    Ok(())
}

fn validate(artifact: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let repository = ModelRepository::load(&artifact)?;
    let registry = repository.registry();

    println!("Artifact: {}", artifact.display());
    println!(
        "Training prevalence {:.4}, default target prevalence {:.4}",
        repository.training_prevalence().value(),
        repository.default_target_prevalence().value()
    );
    println!("Variables ({}):", registry.len());
    for variable in registry.iter() {
        let label = variable.display.label.as_deref().unwrap_or("");
        let unit = variable
            .display
            .unit
            .as_deref()
            .map(|u| format!(" [{u}]"))
            .unwrap_or_default();
        println!("  {:<24} {:?}{unit}  {label}", variable.id, variable.value_type);
    }

    let non_converged = repository.models().iter().filter(|m| !m.fit.converged).count();
    println!("Models: {} ({} not converged)", repository.len(), non_converged);

    let report = coverage(&repository);
    println!(
        "Coverage: {} of {} non-empty subsets ({:.1}%)",
        report.present,
        report.expected,
        report.fraction() * 100.0
    );
    for size in &report.by_size {
        println!("  size {:>2}: {} / {}", size.size, size.present, size.expected);
    }
    match &report.missing {
        Some(missing) if !missing.is_empty() => {
            println!("Missing signatures ({}):", missing.len());
            for ids in missing {
                println!("  {{{}}}", ids.join(", "));
            }
        }
        Some(_) => println!("Every non-empty subset has a model."),
        None => println!("Too many variables to list missing signatures."),
    }
    Ok(())
}
