//! Pure averaging primitives applied to the successful results of a round.

use comms::specs::{Metrics, Weights};

use crate::AggregateError;

/// Computes the arithmetic mean of every metric field.
///
/// Non-finite inputs propagate into the corresponding averaged field.
///
/// # Arguments
/// * `metrics` - The metrics reported by the successful clients of a round.
///
/// # Returns
/// The averaged metrics or `EmptyInput` if there's nothing to average.
pub fn average_metrics(metrics: &[Metrics]) -> Result<Metrics, AggregateError> {
    if metrics.is_empty() {
        return Err(AggregateError::EmptyInput);
    }

    let n = metrics.len() as f64;
    let mean = |field: fn(&Metrics) -> f64| metrics.iter().map(field).sum::<f64>() / n;

    Ok(Metrics {
        accuracy: mean(|m| m.accuracy),
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1_score: mean(|m| m.f1_score),
        loss: mean(|m| m.loss),
    })
}

/// Computes the element-wise mean of several weight sets, position by position.
///
/// # Arguments
/// * `sets` - The weight sets to average, all shaped like the first one.
///
/// # Returns
/// The averaged weight set, `EmptyInput` if `sets` is empty or `ShapeMismatch` if any
/// set differs from the first one in tensor count or tensor shape.
pub fn average_weights(sets: &[Weights]) -> Result<Weights, AggregateError> {
    let (first, rest) = sets.split_first().ok_or(AggregateError::EmptyInput)?;

    for set in rest {
        check_shape(first, set)?;
    }

    let mut sum = first.clone();
    for set in rest {
        for (acc, tensor) in sum.iter_mut().zip(set) {
            *acc += tensor;
        }
    }

    let n = sets.len() as f32;
    for tensor in &mut sum {
        tensor.mapv_inplace(|v| v / n);
    }

    Ok(sum)
}

/// Checks that `got` has the same tensor count and tensor shapes as `expected`.
///
/// # Returns
/// `ShapeMismatch` describing the first difference found.
pub fn check_shape(expected: &Weights, got: &Weights) -> Result<(), AggregateError> {
    if expected.len() != got.len() {
        return Err(AggregateError::ShapeMismatch(format!(
            "{} tensors, expected {}",
            got.len(),
            expected.len()
        )));
    }

    for (i, (e, g)) in expected.iter().zip(got).enumerate() {
        if e.shape() != g.shape() {
            return Err(AggregateError::ShapeMismatch(format!(
                "tensor {i} has shape {:?}, expected {:?}",
                g.shape(),
                e.shape()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1, arr2};

    use super::*;

    fn weights(w: [[f32; 2]; 2], b: f32) -> Weights {
        vec![arr2(&w).into_dyn(), arr1(&[b]).into_dyn()]
    }

    #[test]
    fn metrics_are_averaged_field_by_field() {
        let avg = average_metrics(&[
            Metrics::new(0.80, 0.70, 0.60, 0.50, 0.40),
            Metrics::new(0.82, 0.72, 0.64, 0.54, 0.20),
        ])
        .unwrap();

        assert!((avg.accuracy - 0.81).abs() < 1e-12);
        assert!((avg.precision - 0.71).abs() < 1e-12);
        assert!((avg.recall - 0.62).abs() < 1e-12);
        assert!((avg.f1_score - 0.52).abs() < 1e-12);
        assert!((avg.loss - 0.30).abs() < 1e-12);
    }

    #[test]
    fn accuracy_mean_of_three_clients() {
        let avg = average_metrics(&[
            Metrics::new(0.8, 0.0, 0.0, 0.0, 0.0),
            Metrics::new(0.9, 0.0, 0.0, 0.0, 0.0),
            Metrics::new(0.7, 0.0, 0.0, 0.0, 0.0),
        ])
        .unwrap();

        assert!((avg.accuracy - 0.8).abs() < 1e-12);
    }

    #[test]
    fn single_metrics_average_to_themselves() {
        let m = Metrics::new(0.9, 0.8, 0.7, 0.75, 0.1);
        assert_eq!(average_metrics(&[m]).unwrap(), m);
    }

    #[test]
    fn nan_propagates_into_its_field_only() {
        let avg = average_metrics(&[
            Metrics::new(0.5, 0.5, 0.5, 0.5, f64::NAN),
            Metrics::new(0.7, 0.5, 0.5, 0.5, 0.2),
        ])
        .unwrap();

        assert!((avg.accuracy - 0.6).abs() < 1e-12);
        assert!(avg.loss.is_nan());
    }

    #[test]
    fn empty_inputs_are_rejected() {
        assert_eq!(average_metrics(&[]), Err(AggregateError::EmptyInput));
        assert_eq!(average_weights(&[]), Err(AggregateError::EmptyInput));
    }

    #[test]
    fn weights_are_averaged_elementwise() {
        let avg = average_weights(&[
            weights([[1.0, 2.0], [3.0, 4.0]], 0.5),
            weights([[3.0, 4.0], [5.0, 6.0]], 1.5),
        ])
        .unwrap();

        assert_eq!(avg, weights([[2.0, 3.0], [4.0, 5.0]], 1.0));
    }

    #[test]
    fn identical_sets_average_to_themselves() {
        let w = weights([[0.5, -1.25], [3.0, 0.0]], 2.0);
        let avg = average_weights(&[w.clone(), w.clone(), w.clone(), w.clone()]).unwrap();

        assert_eq!(avg, w);
    }

    #[test]
    fn mismatched_tensor_count_is_rejected() {
        let a = weights([[1.0, 2.0], [3.0, 4.0]], 0.5);
        let b = vec![a[0].clone()];

        assert!(matches!(
            average_weights(&[a, b]),
            Err(AggregateError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn mismatched_tensor_shape_is_rejected() {
        let a = weights([[1.0, 2.0], [3.0, 4.0]], 0.5);
        let b = vec![ArrayD::zeros(IxDyn(&[4])), a[1].clone()];

        let err = check_shape(&a, &b).unwrap_err();
        assert_eq!(
            err,
            AggregateError::ShapeMismatch("tensor 0 has shape [4], expected [2, 2]".into())
        );
    }
}
