use std::{env, num::NonZeroUsize, path::PathBuf};

use model::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION};

use crate::{Result, WorkerErr};

const DEFAULT_LEARNING_RATE: f32 = 0.1;

/// Which contiguous chunk of the dataset a node trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    pub index: usize,
    pub count: NonZeroUsize,
}

impl Shard {
    /// Parses a shard of the form `index/count`, e.g. `0/5`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || WorkerErr::InvalidConfig(format!("invalid shard {s:?}, expected i/n"));

        let (index, count) = s.split_once('/').ok_or_else(invalid)?;
        let index: usize = index.trim().parse().map_err(|_| invalid())?;
        let count: NonZeroUsize = count.trim().parse().map_err(|_| invalid())?;

        if index >= count.get() {
            return Err(invalid());
        }

        Ok(Self { index, count })
    }
}

/// The configuration of a client node.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub client_id: String,
    pub dataset: PathBuf,
    /// `None` means the node trains on the whole dataset.
    pub shard: Option<Shard>,
    pub learning_rate: f32,
    pub test_fraction: f32,
    pub seed: u64,
}

impl WorkerConfig {
    /// Reads the configuration from `CLIENT_ID`, `DATASET`, `SHARD` and `LEARNING_RATE`.
    ///
    /// # Returns
    /// The configuration or the first missing or invalid variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration out of any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| WorkerErr::InvalidConfig(format!("{key} is not set")))
        };

        let shard = lookup("SHARD").map(|s| Shard::parse(&s)).transpose()?;
        let learning_rate = match lookup("LEARNING_RATE") {
            Some(lr) => lr
                .parse()
                .ok()
                .filter(|lr: &f32| lr.is_finite() && *lr > 0.0)
                .ok_or_else(|| WorkerErr::InvalidConfig(format!("invalid learning rate {lr:?}")))?,
            None => DEFAULT_LEARNING_RATE,
        };

        Ok(Self {
            client_id: required("CLIENT_ID")?,
            dataset: PathBuf::from(required("DATASET")?),
            shard,
            learning_rate,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SPLIT_SEED,
        })
    }
}
