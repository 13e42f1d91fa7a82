use std::{fs, num::NonZeroUsize, path::Path};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate, s};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::Deserialize;

use crate::{ModelErr, Result};

/// A set of samples, each one made of `x_size` features and a binary label.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array1<f32>,
}

/// A disjoint train/test split of one client's partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// On-disk layout: rows of `x_size` features followed by the label, flattened.
#[derive(Deserialize)]
struct DatasetFile {
    x_size: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Creates a dataset from flattened rows.
    ///
    /// # Arguments
    /// * `data` - Rows of `x_size` features followed by a `0.0`/`1.0` label.
    /// * `x_size` - The amount of features per row.
    ///
    /// # Returns
    /// The dataset, or an error if the data does not divide into rows or a label is not binary.
    pub fn from_inline(data: Vec<f32>, x_size: usize) -> Result<Self> {
        if x_size == 0 {
            return Err(ModelErr::InvalidDataset(
                "x_size must be greater than 0".into(),
            ));
        }

        let row_size = x_size + 1;
        if data.len() % row_size != 0 {
            return Err(ModelErr::InvalidDataset(format!(
                "dataset length ({}) is not divisible by x_size + 1 ({row_size})",
                data.len()
            )));
        }

        let rows = data.len() / row_size;
        let full = Array2::from_shape_vec((rows, row_size), data)
            .map_err(|e| ModelErr::InvalidDataset(e.to_string()))?;

        let x = full.slice(s![.., ..x_size]).to_owned();
        let y = full.column(x_size).to_owned();

        if let Some(row) = y.iter().position(|&label| label != 0.0 && label != 1.0) {
            return Err(ModelErr::InvalidDataset(format!(
                "row {row} has a non binary label {}",
                y[row]
            )));
        }

        Ok(Self { x, y })
    }

    /// Loads a dataset from a JSON file of the form `{"x_size": n, "data": [...]}`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let DatasetFile { x_size, data } = serde_json::from_str(&content)?;
        Self::from_inline(data, x_size)
    }

    /// Joins several datasets with the same amount of features into one.
    pub fn concat(parts: &[&Dataset]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(ModelErr::EmptyDataset);
        };

        let x_size = first.x_size();
        if let Some(other) = parts.iter().find(|part| part.x_size() != x_size) {
            return Err(ModelErr::SizeMismatch {
                what: "dataset features",
                got: other.x_size(),
                expected: x_size,
            });
        }

        let xs: Vec<_> = parts.iter().map(|part| part.x.view()).collect();
        let ys: Vec<_> = parts.iter().map(|part| part.y.view()).collect();

        let x = concatenate(Axis(0), &xs).map_err(|e| ModelErr::InvalidDataset(e.to_string()))?;
        let y = concatenate(Axis(0), &ys).map_err(|e| ModelErr::InvalidDataset(e.to_string()))?;
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<'_, f32> {
        self.y.view()
    }

    /// Splits the dataset into `count` contiguous, disjoint chunks.
    ///
    /// Every chunk has `len / count` samples, the last one also takes the remainder.
    pub fn partition(&self, count: NonZeroUsize) -> Vec<Dataset> {
        let count = count.get();
        let per_chunk = self.len() / count;

        (0..count)
            .map(|i| {
                let start = i * per_chunk;
                let end = if i == count - 1 {
                    self.len()
                } else {
                    (i + 1) * per_chunk
                };

                Dataset {
                    x: self.x.slice(s![start..end, ..]).to_owned(),
                    y: self.y.slice(s![start..end]).to_owned(),
                }
            })
            .collect()
    }

    /// Shuffles the samples with `seed` and holds out `ceil(len * test_fraction)` of them.
    pub fn split(&self, test_fraction: f32, seed: u64) -> Result<Split> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(ModelErr::InvalidDataset(format!(
                "test fraction must be in [0, 1), got {test_fraction}"
            )));
        }

        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = (self.len() as f32 * test_fraction).ceil() as usize;
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok(Split {
            train: self.select(train_idx),
            test: self.select(test_idx),
        })
    }

    /// Returns the train/test split of client `index` out of `count` clients.
    pub fn client_split(
        &self,
        index: usize,
        count: NonZeroUsize,
        test_fraction: f32,
        seed: u64,
    ) -> Result<Split> {
        let mut parts = self.partition(count);
        if index >= parts.len() {
            return Err(ModelErr::ShardOutOfRange {
                index,
                count: count.get(),
            });
        }

        parts.swap_remove(index).split(test_fraction, seed)
    }

    /// Iterates the dataset in order, `batch_size` samples at a time.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
        self.x
            .axis_chunks_iter(Axis(0), batch_size.get())
            .zip(self.y.axis_chunks_iter(Axis(0), batch_size.get()))
    }

    fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn rows(n: usize) -> Dataset {
        let data = (0..n)
            .flat_map(|i| [i as f32, (i % 2) as f32])
            .collect();
        Dataset::from_inline(data, 1).unwrap()
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Dataset::from_inline(vec![1.0, 0.0, 2.0], 1).unwrap_err();
        assert!(matches!(err, ModelErr::InvalidDataset(_)));
    }

    #[test]
    fn rejects_non_binary_labels() {
        let err = Dataset::from_inline(vec![1.0, 0.0, 2.0, 0.5], 1).unwrap_err();
        assert!(matches!(err, ModelErr::InvalidDataset(_)));
    }

    #[test]
    fn partition_gives_the_remainder_to_the_last_chunk() {
        let parts = rows(11).partition(nz(3));

        let lens: Vec<_> = parts.iter().map(Dataset::len).collect();
        assert_eq!(lens, vec![3, 3, 5]);
        assert_eq!(parts[1].x()[[0, 0]], 3.0);
        assert_eq!(parts[2].x()[[4, 0]], 10.0);
    }

    #[test]
    fn split_is_disjoint_and_deterministic() {
        let data = rows(10);
        let a = data.split(0.2, 42).unwrap();
        let b = data.split(0.2, 42).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.test.len(), 2);
        assert_eq!(a.train.len(), 8);

        let mut seen: Vec<f32> = a.train.x().iter().chain(a.test.x().iter()).copied().collect();
        seen.sort_by(f32::total_cmp);
        assert_eq!(seen, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn client_split_checks_the_index() {
        let err = rows(4).client_split(2, nz(2), 0.2, 42).unwrap_err();
        assert!(matches!(err, ModelErr::ShardOutOfRange { index: 2, count: 2 }));
    }

    #[test]
    fn concat_joins_rows() {
        let parts = rows(6).partition(nz(2));
        let joined = Dataset::concat(&[&parts[0], &parts[1]]).unwrap();
        assert_eq!(joined, rows(6));
    }

    #[test]
    fn batches_cover_every_sample() {
        let data = rows(5);
        let sizes: Vec<_> = data.batches(nz(2)).map(|(x, y)| (x.nrows(), y.len())).collect();
        assert_eq!(sizes, vec![(2, 2), (2, 2), (1, 1)]);
    }
}
