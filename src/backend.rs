use std::num::NonZeroUsize;

use model::{Dataset, LogisticModel, ModelErr};
use orchestrator::{BackendError, GlobalMetrics, GlobalModel, ModelBackend};

use crate::config::DatasetConfig;

/// Builds and evaluates logistic regression models over the union of the clients'
/// held out splits.
#[derive(Debug)]
pub struct DatasetBackend {
    holdout: Dataset,
    seed: u64,
}

impl DatasetBackend {
    /// Loads the dataset file and rebuilds every client's test split.
    pub fn load(config: &DatasetConfig, shards: NonZeroUsize) -> Result<Self, ModelErr> {
        let dataset = Dataset::load(&config.path)?;
        Self::new(&dataset, shards, config.test_fraction, config.seed)
    }

    /// Creates a new `DatasetBackend`.
    ///
    /// # Arguments
    /// * `dataset` - The full dataset the clients were partitioned from.
    /// * `shards` - The amount of client partitions.
    /// * `test_fraction` - The held out fraction of each partition.
    /// * `seed` - The seed each partition was shuffled with.
    ///
    /// # Returns
    /// The backend or an error if the held out data is empty.
    pub fn new(
        dataset: &Dataset,
        shards: NonZeroUsize,
        test_fraction: f32,
        seed: u64,
    ) -> Result<Self, ModelErr> {
        let tests = (0..shards.get())
            .map(|i| Ok(dataset.client_split(i, shards, test_fraction, seed)?.test))
            .collect::<Result<Vec<_>, ModelErr>>()?;

        let parts: Vec<_> = tests.iter().filter(|t| !t.is_empty()).collect();
        let holdout = Dataset::concat(&parts)?;

        Ok(Self { holdout, seed })
    }

    pub fn holdout(&self) -> &Dataset {
        &self.holdout
    }
}

impl ModelBackend for DatasetBackend {
    fn build_initial_model(&self) -> Result<GlobalModel, BackendError> {
        let model = LogisticModel::lecun_uniform(self.holdout.x_size(), self.seed);
        Ok(model.to_weights())
    }

    fn evaluate(&self, model: &GlobalModel) -> Result<GlobalMetrics, BackendError> {
        let model = LogisticModel::from_weights(model, self.holdout.x_size())
            .map_err(|e| BackendError(e.to_string()))?;

        let metrics = model
            .evaluate(&self.holdout)
            .map_err(|e| BackendError(e.to_string()))?;

        Ok(GlobalMetrics {
            metrics,
            total_test_samples: self.holdout.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shapes(model: &GlobalModel) -> Vec<Vec<usize>> {
        model.iter().map(|t| t.shape().to_vec()).collect()
    }

    fn dataset() -> Dataset {
        let data: Vec<f32> = (0..50)
            .flat_map(|i| {
                let x = i as f32 / 10.0 - 2.5;
                [x, -x, if x > 0.0 { 1.0 } else { 0.0 }]
            })
            .collect();

        Dataset::from_inline(data, 2).unwrap()
    }

    #[test]
    fn holdout_is_the_union_of_client_test_splits() {
        let shards = NonZeroUsize::new(3).unwrap();
        let backend = DatasetBackend::new(&dataset(), shards, 0.2, 42).unwrap();

        // partitions of 16, 16 and 18 samples hold out 4, 4 and 4
        assert_eq!(backend.holdout().len(), 12);
        assert_eq!(backend.holdout().x_size(), 2);
    }

    #[test]
    fn initial_model_is_evaluable() {
        let backend = DatasetBackend::new(&dataset(), NonZeroUsize::MIN, 0.2, 42).unwrap();
        let model = backend.build_initial_model().unwrap();

        assert_eq!(shapes(&model), [vec![2], vec![1]]);

        let global = backend.evaluate(&model).unwrap();
        assert!((0.0..=1.0).contains(&global.metrics.accuracy));
        assert!(global.metrics.loss.is_finite());
        assert_eq!(global.total_test_samples, backend.holdout().len());
    }

    #[test]
    fn incompatible_model_is_an_error() {
        let backend = DatasetBackend::new(&dataset(), NonZeroUsize::MIN, 0.2, 42).unwrap();
        let mut model = backend.build_initial_model().unwrap();
        model.pop();

        assert!(backend.evaluate(&model).is_err());
    }
}
