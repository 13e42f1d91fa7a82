use std::sync::Arc;

use comms::specs::{TrainRequest, Weights};
use futures::future;
use log::{debug, error, info, warn};
use tokio::{task, time};
use tokio_util::sync::CancellationToken;

use crate::{
    AggregateError, ClientInvoker, ClientRegistry, ClientRoundResult, GlobalMetrics, GlobalModel,
    ModelBackend, OrchestratorConfig, RunError, TrainingConfig, Transport, aggregate,
    status::{ClientFailure, ClientMetrics, RoundRecord, StatusStore, now_millis},
};

enum Outcome {
    Completed(GlobalMetrics),
    Stopped,
}

/// A single training run executing in the background.
///
/// It owns the global model for the whole run and reports every step to the status store.
pub(crate) struct Session<T, R, B> {
    pub(crate) run: u64,
    pub(crate) training: TrainingConfig,
    pub(crate) config: OrchestratorConfig,
    pub(crate) invoker: ClientInvoker<T>,
    pub(crate) registry: Arc<R>,
    pub(crate) backend: Arc<B>,
    pub(crate) status: Arc<StatusStore>,
    pub(crate) token: CancellationToken,
}

impl<T, R, B> Session<T, R, B>
where
    T: Transport + Sync + 'static,
    R: ClientRegistry,
    B: ModelBackend,
{
    /// Runs every round of the session and records how it ended.
    pub(crate) async fn run(self) {
        match self.rounds().await {
            Ok(Outcome::Completed(_)) if self.token.is_cancelled() => {
                info!(run = self.run; "training stopped during the final evaluation");
            }
            Ok(Outcome::Completed(metrics)) => {
                info!(
                    run = self.run,
                    accuracy = metrics.metrics.accuracy,
                    test_samples = metrics.total_test_samples;
                    "training completed"
                );
                self.status.finish(self.run, metrics);
            }
            Ok(Outcome::Stopped) => info!(run = self.run; "training stopped"),
            Err(e) if self.token.is_cancelled() => {
                warn!(run = self.run; "stopped run ended with an error: {e}");
            }
            Err(e) => {
                error!(run = self.run; "training failed: {e}");
                self.status.fail(self.run, &e);
            }
        }
    }

    async fn rounds(&self) -> Result<Outcome, RunError> {
        let mut model = self
            .backend
            .build_initial_model()
            .map_err(|e| RunError::ModelConstruction(e.to_string()))?;

        let total = self.training.rounds.get();
        let mut failed_streak = 0;

        loop {
            if self.token.is_cancelled() {
                return Ok(Outcome::Stopped);
            }

            let Some(round) = self.status.begin_round(self.run) else {
                return Ok(Outcome::Stopped);
            };

            let (next, record) = self.round(round, &model).await?;
            let all_failed = record.average_metrics.is_none();
            self.status.push_round(self.run, record);

            if let Some(next) = next {
                model = next;
            }

            if self.token.is_cancelled() {
                return Ok(Outcome::Stopped);
            }

            if all_failed {
                failed_streak += 1;
                let limit = self.config.max_consecutive_failed_rounds;
                if limit > 0 && failed_streak >= limit {
                    return Err(RunError::ConsecutiveFailures {
                        rounds: failed_streak,
                    });
                }
            } else {
                failed_streak = 0;
            }

            if round >= total {
                break;
            }

            tokio::select! {
                _ = self.token.cancelled() => return Ok(Outcome::Stopped),
                _ = time::sleep(self.config.round_pause) => {}
            }
        }

        if self.token.is_cancelled() {
            return Ok(Outcome::Stopped);
        }

        self.evaluate(model).await.map(Outcome::Completed)
    }

    /// Executes a single round: fans the global model out to every registered client,
    /// waits for all of them and aggregates the successful results.
    ///
    /// # Arguments
    /// * `round` - The 1-based number of this round.
    /// * `model` - The current global model.
    ///
    /// # Returns
    /// The next global model, if any client succeeded, and the round's record.
    async fn round(
        &self,
        round: usize,
        model: &GlobalModel,
    ) -> Result<(Option<GlobalModel>, RoundRecord), RunError> {
        let clients = self.registry.list_clients();
        let request = TrainRequest {
            round,
            epochs: self.training.epochs_per_round.get(),
            batch_size: self.training.batch_size.get(),
            weights: model.clone(),
        };

        debug!(round = round, clients = clients.len(); "starting round");

        let calls: Vec<_> = clients
            .iter()
            .map(|client| {
                self.invoker
                    .invoke_train_round(client, &request, self.config.client_timeout)
            })
            .collect();
        let results = future::join_all(calls).await;

        let mut client_metrics = Vec::with_capacity(results.len());
        let mut updates: Vec<Weights> = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for result in results {
            debug!(
                round = round,
                client = result.client_id(),
                succeeded = result.is_success();
                "client answered"
            );

            match result {
                ClientRoundResult::Success {
                    client_id,
                    metrics,
                    weights,
                } => {
                    // an empty global model means the clients started from fresh weights
                    if !model.is_empty() {
                        aggregate::check_shape(model, &weights).map_err(|e| {
                            RunError::ShapeMismatch {
                                round,
                                detail: format!("client {client_id}: {e}"),
                            }
                        })?;
                    }

                    client_metrics.push(ClientMetrics { client_id, metrics });
                    updates.push(weights);
                }
                ClientRoundResult::Failure { client_id, reason } => {
                    warn!(round = round, client = client_id.as_str(); "client failed: {reason}");
                    failures.push(ClientFailure { client_id, reason });
                }
            }
        }

        let (next, average_metrics) = if updates.is_empty() {
            (None, None)
        } else {
            let aggregate_err = |e: AggregateError| RunError::ShapeMismatch {
                round,
                detail: e.to_string(),
            };
            let metrics: Vec<_> = client_metrics.iter().map(|c| c.metrics).collect();
            let next = aggregate::average_weights(&updates).map_err(aggregate_err)?;
            let average = aggregate::average_metrics(&metrics).map_err(aggregate_err)?;
            (Some(next), Some(average))
        };

        match &average_metrics {
            Some(avg) => info!(
                round = round,
                succeeded = client_metrics.len(),
                failed = failures.len(),
                accuracy = avg.accuracy;
                "round completed"
            ),
            None => warn!(
                round = round,
                failed = failures.len();
                "round completed with no successful client"
            ),
        }

        let record = RoundRecord {
            round,
            client_metrics,
            failures,
            average_metrics,
            timestamp: now_millis(),
        };

        Ok((next, record))
    }

    async fn evaluate(&self, model: GlobalModel) -> Result<GlobalMetrics, RunError> {
        let backend = Arc::clone(&self.backend);

        task::spawn_blocking(move || backend.evaluate(&model))
            .await
            .map_err(|e| RunError::Evaluation(e.to_string()))?
            .map_err(|e| RunError::Evaluation(e.to_string()))
    }
}
