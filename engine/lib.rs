#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod artifact;
pub mod batch;
pub mod config;
pub mod coverage;
pub mod interval;
pub mod orchestrator;
pub mod predictor;
pub mod prevalence;
pub mod registry;
pub mod repository;
pub mod selector;
pub mod severity;
pub mod types;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use artifact::ArtifactError;
pub use config::{ConfigError, EngineConfig};
pub use orchestrator::{
    EngineError, InferenceEngine, InferenceOutcome, InferenceRequest, InferenceResult,
};
pub use repository::ModelRepository;
pub use severity::SeverityTier;
