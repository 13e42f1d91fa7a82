use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

const DEFAULT_ROUNDS: NonZeroUsize = NonZeroUsize::new(5).unwrap();
const DEFAULT_EPOCHS_PER_ROUND: NonZeroUsize = NonZeroUsize::new(20).unwrap();
const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();
const DEFAULT_NUM_CLIENTS: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// The parameters of a single training run.
///
/// Every field is optional on the wire and falls back to its default, but a present
/// field must be a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_rounds")]
    pub rounds: NonZeroUsize,
    #[serde(default = "default_epochs_per_round")]
    pub epochs_per_round: NonZeroUsize,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    /// Informational, the participating set is whatever the registry lists.
    #[serde(default = "default_num_clients")]
    pub num_clients: NonZeroUsize,
}

impl TrainingConfig {
    /// Creates a new `TrainingConfig` with the given amount of rounds and defaults elsewhere.
    ///
    /// # Arguments
    /// * `rounds` - The amount of rounds the run will execute.
    ///
    /// # Returns
    /// A new `TrainingConfig` instance.
    pub fn with_rounds(rounds: NonZeroUsize) -> Self {
        Self {
            rounds,
            ..Self::default()
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            epochs_per_round: DEFAULT_EPOCHS_PER_ROUND,
            batch_size: DEFAULT_BATCH_SIZE,
            num_clients: DEFAULT_NUM_CLIENTS,
        }
    }
}

fn default_rounds() -> NonZeroUsize {
    DEFAULT_ROUNDS
}

fn default_epochs_per_round() -> NonZeroUsize {
    DEFAULT_EPOCHS_PER_ROUND
}

fn default_batch_size() -> NonZeroUsize {
    DEFAULT_BATCH_SIZE
}

fn default_num_clients() -> NonZeroUsize {
    DEFAULT_NUM_CLIENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: TrainingConfig = serde_json::from_str(r#"{"rounds": 3}"#).unwrap();

        assert_eq!(config.rounds.get(), 3);
        assert_eq!(config.epochs_per_round.get(), 20);
        assert_eq!(config.batch_size.get(), 32);
        assert_eq!(config.num_clients.get(), 5);
    }

    #[test]
    fn zero_is_rejected() {
        assert!(serde_json::from_str::<TrainingConfig>(r#"{"rounds": 0}"#).is_err());
        assert!(serde_json::from_str::<TrainingConfig>(r#"{"batch_size": 0}"#).is_err());
    }

    #[test]
    fn empty_object_is_default() {
        let config: TrainingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TrainingConfig::default());
    }
}
