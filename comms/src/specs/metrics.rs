use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Scalar evaluation metrics of a model over some dataset.
///
/// Non-finite values serialize as `null`. On the wire `loss` is optional and
/// becomes NaN when absent or `null`, the other four fields are required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(serialize_with = "finite_or_null")]
    pub accuracy: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub precision: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub recall: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub f1_score: f64,
    #[serde(
        default = "nan",
        serialize_with = "finite_or_null",
        deserialize_with = "number_or_nan"
    )]
    pub loss: f64,
}

impl Metrics {
    pub fn new(accuracy: f64, precision: f64, recall: f64, f1_score: f64, loss: f64) -> Self {
        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            loss,
        }
    }

    /// Returns `2pr / (p + r)`, or zero when both are zero.
    pub fn f1(precision: f64, recall: f64) -> f64 {
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }
}

fn nan() -> f64 {
    f64::NAN
}

fn finite_or_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

fn number_or_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
