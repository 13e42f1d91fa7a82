use comms::specs::{Metrics, Weights};
use serde::Serialize;

use crate::BackendError;

/// The model the orchestrator owns between rounds.
pub type GlobalModel = Weights;

/// The evaluation of the final global model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GlobalMetrics {
    #[serde(flatten)]
    pub metrics: Metrics,
    /// The amount of held out samples the model was evaluated over.
    pub total_test_samples: usize,
}

/// The data and model collaborator of a run.
///
/// Evaluation runs on a blocking thread, implementations are free to do heavy work.
pub trait ModelBackend: Send + Sync + 'static {
    /// Should build the starting point of a run.
    ///
    /// An empty model is allowed, in which case every client starts from fresh
    /// weights and the first round's updates become the global model.
    fn build_initial_model(&self) -> Result<GlobalModel, BackendError>;

    /// Should evaluate the final global model over the held out data.
    ///
    /// # Arguments
    /// * `model` - The global model after the last round.
    ///
    /// # Returns
    /// The model's metrics or the reason it couldn't be evaluated.
    fn evaluate(&self, model: &GlobalModel) -> Result<GlobalMetrics, BackendError>;
}
