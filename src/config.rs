use std::{fs, num::NonZeroUsize, path::PathBuf};

use anyhow::Context;
use model::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION};
use orchestrator::{OrchestratorSettings, TrainingConfig};
use serde::Deserialize;

/// A client node to register before training.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEntry {
    pub id: String,
    pub address: String,
}

/// Where the held out evaluation data comes from. It has to match how the client
/// nodes split the same file.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub path: PathBuf,
    /// Defaults to the amount of configured clients.
    #[serde(default)]
    pub shards: Option<NonZeroUsize>,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// The admin's configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub clients: Vec<ClientEntry>,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    pub dataset: DatasetConfig,
}

impl AdminConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read config {path}"))?;

        Self::parse(&content).with_context(|| format!("invalid config {path}"))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(content)?;

        if !(0.0..1.0).contains(&config.dataset.test_fraction) {
            anyhow::bail!(
                "test_fraction must be in [0, 1), got {}",
                config.dataset.test_fraction
            );
        }

        Ok(config)
    }

    /// The amount of shards the dataset is partitioned into.
    pub fn shards(&self) -> NonZeroUsize {
        self.dataset
            .shards
            .or(NonZeroUsize::new(self.clients.len()))
            .unwrap_or(NonZeroUsize::MIN)
    }
}

fn default_test_fraction() -> f32 {
    DEFAULT_TEST_FRACTION
}

fn default_seed() -> u64 {
    DEFAULT_SPLIT_SEED
}
