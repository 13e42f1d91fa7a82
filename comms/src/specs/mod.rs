//! Payload shapes shared by the orchestrator and the client nodes.

mod metrics;
mod training;

pub use metrics::Metrics;
pub use training::{HealthReply, ModelMetricsReply, TrainReply, TrainRequest, Weights};

/// Path of the train-one-round endpoint of a client node.
pub const TRAIN_PATH: &str = "/api/train";

/// Path of the health-check endpoint of a client node.
pub const HEALTH_PATH: &str = "/api/health";

/// Path of the endpoint returning a client node's latest local metrics.
pub const MODEL_METRICS_PATH: &str = "/api/model-metrics";
