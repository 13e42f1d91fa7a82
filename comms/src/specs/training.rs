use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use super::Metrics;

/// An ordered set of model tensors, the unit exchanged and averaged every round.
pub type Weights = Vec<ArrayD<f32>>;

/// Body of a request to the train-one-round endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub round: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// The current global model. Empty means the node should start from fresh weights.
    #[serde(default)]
    pub weights: Weights,
}

/// Body of a successful reply from the train-one-round endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReply {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub round: usize,
    pub metrics: Metrics,
    pub weights: Weights,
}

/// Body of a reply from the health-check endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
    pub client_id: String,
    pub data_loaded: bool,
    pub model_trained: bool,
}

/// Body of a reply from the model-metrics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetricsReply {
    pub client_id: String,
    /// The metrics of the last trained round, `None` until the node trains once.
    #[serde(default)]
    pub metrics: Option<Metrics>,
}
