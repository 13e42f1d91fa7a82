mod orchestrator;
mod training;

pub use orchestrator::{OrchestratorConfig, OrchestratorSettings};
pub use training::TrainingConfig;
