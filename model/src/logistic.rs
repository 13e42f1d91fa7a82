use std::num::NonZeroUsize;

use comms::specs::{Metrics, Weights};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{Dataset, ModelErr, Result};

const EPS: f32 = 1e-7;
const THRESHOLD: f32 = 0.5;

/// A single dense unit with a sigmoid activation, trained on binary cross-entropy.
///
/// Its weights travel as two tensors: `w` with shape `(x_size,)` and `b` with shape `(1,)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    w: Array1<f32>,
    b: f32,
}

impl LogisticModel {
    /// Creates a model with every parameter set to zero.
    pub fn zeros(x_size: usize) -> Self {
        Self {
            w: Array1::zeros(x_size),
            b: 0.0,
        }
    }

    /// Creates a model with Lecun-uniform weights and a zero bias.
    ///
    /// # Arguments
    /// * `x_size` - The amount of input features.
    /// * `seed` - Seed for the weights' generator.
    pub fn lecun_uniform(x_size: usize, seed: u64) -> Self {
        let limit = (3.0 / x_size.max(1) as f32).sqrt();
        let mut rng = StdRng::seed_from_u64(seed);
        let w = (0..x_size).map(|_| rng.random_range(-limit..limit)).collect();

        Self { w, b: 0.0 }
    }

    /// Rebuilds a model from its transmitted tensors.
    ///
    /// # Returns
    /// The model, or `SizeMismatch` if `weights` does not have this model's layout.
    pub fn from_weights(weights: &Weights, x_size: usize) -> Result<Self> {
        let [w, b] = weights.as_slice() else {
            return Err(ModelErr::SizeMismatch {
                what: "weight tensors",
                got: weights.len(),
                expected: 2,
            });
        };

        if w.shape() != [x_size] {
            return Err(ModelErr::SizeMismatch {
                what: "w tensor",
                got: w.len(),
                expected: x_size,
            });
        }

        if b.shape() != [1] {
            return Err(ModelErr::SizeMismatch {
                what: "b tensor",
                got: b.len(),
                expected: 1,
            });
        }

        Ok(Self {
            w: w.iter().copied().collect(),
            b: b.iter().copied().next().unwrap_or_default(),
        })
    }

    pub fn to_weights(&self) -> Weights {
        vec![
            self.w.clone().into_dyn(),
            Array1::from_elem(1, self.b).into_dyn(),
        ]
    }

    pub fn x_size(&self) -> usize {
        self.w.len()
    }

    /// Returns the predicted probability of the positive label for every row of `x`.
    pub fn predict(&self, x: ArrayView2<f32>) -> Array1<f32> {
        (x.dot(&self.w) + self.b).mapv(sigmoid)
    }

    /// Runs `epochs` passes of mini-batch gradient descent over `data`.
    ///
    /// # Returns
    /// The loss over the whole of `data` after the last epoch.
    pub fn fit(
        &mut self,
        data: &Dataset,
        epochs: usize,
        batch_size: NonZeroUsize,
        learning_rate: f32,
    ) -> Result<f32> {
        self.check(data)?;

        for _ in 0..epochs {
            for (x, y) in data.batches(batch_size) {
                let d = self.predict(x) - y;
                let n = y.len() as f32;

                let grad_w = x.t().dot(&d) / n;
                let grad_b = d.sum() / n;

                self.w.scaled_add(-learning_rate, &grad_w);
                self.b -= learning_rate * grad_b;
            }
        }

        Ok(bce(self.predict(data.x()).view(), data.y()))
    }

    /// Computes accuracy, precision, recall, F1 and loss of the model over `data`.
    pub fn evaluate(&self, data: &Dataset) -> Result<Metrics> {
        self.check(data)?;

        let probs = self.predict(data.x());
        let (mut tp, mut fp, mut fneg, mut tn) = (0usize, 0usize, 0usize, 0usize);

        for (&p, &y) in probs.iter().zip(data.y()) {
            match (p >= THRESHOLD, y == 1.0) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fneg += 1,
                (false, false) => tn += 1,
            }
        }

        let accuracy = (tp + tn) as f64 / data.len() as f64;
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fneg);
        let loss = bce(probs.view(), data.y()) as f64;

        Ok(Metrics::new(
            accuracy,
            precision,
            recall,
            Metrics::f1(precision, recall),
            loss,
        ))
    }

    fn check(&self, data: &Dataset) -> Result<()> {
        if data.is_empty() {
            return Err(ModelErr::EmptyDataset);
        }

        if data.x_size() != self.x_size() {
            return Err(ModelErr::SizeMismatch {
                what: "dataset features",
                got: data.x_size(),
                expected: self.x_size(),
            });
        }

        Ok(())
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

fn bce(p: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
    let total: f32 = p
        .iter()
        .zip(y)
        .map(|(&p, &y)| -(y * (p + EPS).ln() + (1.0 - y) * (1.0 - p + EPS).ln()))
        .sum();

    total / p.len().max(1) as f32
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}
