mod dataset;
mod error;
mod logistic;

pub use dataset::{Dataset, Split};
pub use error::{ModelErr, Result};
pub use logistic::LogisticModel;

/// Fraction of every client's partition held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f32 = 0.2;

/// Seed used to shuffle partitions before splitting them.
pub const DEFAULT_SPLIT_SEED: u64 = 42;
