use std::sync::Arc;

use comms::specs::Metrics;
use futures::future;
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    ClientInvoker, ClientRegistry, ClientReport, ClientStatus, History, ModelBackend,
    OrchestratorConfig, Rejection, TrainingConfig, TrainingStatus, Transport, aggregate,
    session::Session, status::StatusStore,
};

/// Acknowledges an accepted start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartAck {
    pub total_rounds: usize,
    pub clients: usize,
}

/// Acknowledges an accepted stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StopAck {
    pub completed_rounds: usize,
}

/// The latest local metrics of every registered client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub clients_metrics: Vec<ClientReport>,
    /// The mean over the connected clients that have trained, `None` if there are none.
    pub average_metrics: Option<Metrics>,
    pub connected_clients: usize,
}

struct ActiveRun {
    run: u64,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Runs federated training rounds against the registered clients.
///
/// At most one run is active at a time. Runs execute on a background task, every
/// method here returns right away except for `wait`.
pub struct Orchestrator<T, R, B> {
    invoker: ClientInvoker<T>,
    registry: Arc<R>,
    backend: Arc<B>,
    config: OrchestratorConfig,
    status: Arc<StatusStore>,
    active: Mutex<Option<ActiveRun>>,
}

impl<T, R, B> Orchestrator<T, R, B>
where
    T: Transport + Sync + 'static,
    R: ClientRegistry,
    B: ModelBackend,
{
    /// Creates a new `Orchestrator`.
    ///
    /// # Arguments
    /// * `transport` - The channel used to reach the client nodes.
    /// * `registry` - Where the participating clients are listed.
    /// * `backend` - Builds the initial model and evaluates the final one.
    /// * `config` - Timeouts and failure bounds.
    ///
    /// # Returns
    /// A new idle `Orchestrator` instance.
    pub fn new(
        transport: Arc<T>,
        registry: Arc<R>,
        backend: Arc<B>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            invoker: ClientInvoker::new(transport),
            registry,
            backend,
            config,
            status: Arc::new(StatusStore::new()),
            active: Mutex::new(None),
        }
    }

    /// Starts a new run in the background.
    ///
    /// # Arguments
    /// * `training` - The configuration of the run.
    ///
    /// # Returns
    /// The acknowledgement, or `AlreadyRunning` or `NoClients` leaving the state untouched.
    ///
    /// # Panics
    /// If called outside of a tokio runtime.
    pub fn start(&self, training: TrainingConfig) -> Result<StartAck, Rejection> {
        let mut active = self.active.lock();

        let clients = self.registry.list_clients().len();
        let run = self.status.begin_run(training, clients)?;

        let token = CancellationToken::new();
        let session = Session {
            run,
            training,
            config: self.config,
            invoker: self.invoker.clone(),
            registry: Arc::clone(&self.registry),
            backend: Arc::clone(&self.backend),
            status: Arc::clone(&self.status),
            token: token.clone(),
        };

        info!(run = run, rounds = training.rounds.get(), clients = clients; "training started");

        let handle = tokio::spawn(session.run());
        *active = Some(ActiveRun {
            run,
            token,
            handle: Some(handle),
        });

        Ok(StartAck {
            total_rounds: training.rounds.get(),
            clients,
        })
    }

    /// Requests the active run to stop.
    ///
    /// The run is marked as not training right away. A round already in flight still
    /// gets recorded once its calls return, but no further round starts and the final
    /// evaluation is skipped.
    ///
    /// # Returns
    /// The rounds completed so far or `NotRunning`.
    pub fn stop(&self) -> Result<StopAck, Rejection> {
        let active = self.active.lock();
        let (run, completed_rounds) = self.status.stop()?;

        match active.as_ref() {
            Some(active) if active.run == run => active.token.cancel(),
            _ => warn!(run = run; "stopped a run without a cancellation handle"),
        }

        info!(run = run, completed_rounds = completed_rounds; "training stop requested");
        Ok(StopAck { completed_rounds })
    }

    /// Returns a consistent snapshot of the current progress.
    pub fn status(&self) -> TrainingStatus {
        self.status.snapshot()
    }

    /// Returns the rounds completed by the latest run.
    pub fn history(&self) -> History {
        self.status.history()
    }

    /// Queries every registered client for its latest local metrics, concurrently and
    /// each bounded by the health timeout.
    pub async fn client_metrics(&self) -> MetricsReport {
        let clients = self.registry.list_clients();
        let queries: Vec<_> = clients
            .iter()
            .map(|client| {
                self.invoker
                    .invoke_model_metrics(client, self.config.health_timeout)
            })
            .collect();
        let clients_metrics = future::join_all(queries).await;

        let connected: Vec<_> = clients_metrics
            .iter()
            .filter(|c| c.connection_status == ClientStatus::Online)
            .collect();
        let reported: Vec<_> = connected.iter().filter_map(|c| c.metrics).collect();

        MetricsReport {
            average_metrics: aggregate::average_metrics(&reported).ok(),
            connected_clients: connected.len(),
            clients_metrics,
        }
    }

    /// Waits for the background task of the latest run to exit, including any round
    /// still in flight after a stop.
    pub async fn wait(&self) {
        let handle = self.active.lock().as_mut().and_then(|a| a.handle.take());

        let Some(handle) = handle else {
            return;
        };

        if let Err(e) = handle.await {
            warn!("training task ended abnormally: {e}");
        }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn invoker(&self) -> &ClientInvoker<T> {
        &self.invoker
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}
