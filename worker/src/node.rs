use std::{io, num::NonZeroUsize, sync::Arc};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Msg, status},
    specs::{
        HEALTH_PATH, HealthReply, MODEL_METRICS_PATH, Metrics, ModelMetricsReply, TRAIN_PATH,
        TrainReply, TrainRequest,
    },
};
use log::{debug, info, warn};
use model::{Dataset, LogisticModel, Split};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task,
};

use crate::{Result, WorkerConfig, WorkerErr};

/// A client node: holds its local train/test split and trains one round per request.
#[derive(Debug)]
pub struct Node {
    client_id: String,
    data: Split,
    learning_rate: f32,
    seed: u64,
    /// Metrics of the last trained round.
    latest: RwLock<Option<Metrics>>,
}

impl Node {
    /// Creates a new `Node` by loading its dataset from disk.
    ///
    /// # Arguments
    /// * `config` - The node's configuration.
    ///
    /// # Returns
    /// The node or an error if the dataset can't be loaded or split.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let dataset = Dataset::load(&config.dataset)?;
        let data = match config.shard {
            Some(shard) => {
                dataset.client_split(shard.index, shard.count, config.test_fraction, config.seed)?
            }
            None => dataset.split(config.test_fraction, config.seed)?,
        };

        Self::new(config.client_id.clone(), data, config.learning_rate, config.seed)
    }

    /// Creates a new `Node` over an already split dataset.
    ///
    /// # Returns
    /// The node or `InvalidConfig` if either side of the split is empty.
    pub fn new(client_id: String, data: Split, learning_rate: f32, seed: u64) -> Result<Self> {
        if data.train.is_empty() || data.test.is_empty() {
            return Err(WorkerErr::InvalidConfig(format!(
                "client {client_id} needs both train and test samples, got {} and {}",
                data.train.len(),
                data.test.len()
            )));
        }

        info!(
            client_id = client_id.as_str(),
            train = data.train.len(),
            test = data.test.len();
            "dataset loaded"
        );

        Ok(Self {
            client_id,
            data,
            learning_rate,
            seed,
            latest: RwLock::new(None),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Answers requests on the given channel until the peer closes it.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the communication channel.
    /// * `tx` - Sending end of the communication channel.
    pub async fn serve<R, W>(
        self: Arc<Self>,
        mut rx: FrameReceiver<R>,
        mut tx: FrameSender<W>,
    ) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let msg = match rx.recv::<Msg>().await {
                Ok(msg) => msg,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            };

            let reply = Arc::clone(&self).handle(msg).await;
            tx.send(&reply).await?;
        }
    }

    /// Routes a single request to its endpoint.
    ///
    /// # Returns
    /// The response to send back, never an error.
    pub async fn handle(self: Arc<Self>, msg: Msg) -> Msg {
        let Msg::Request { path, body } = msg else {
            warn!("expected a request, got a {}", msg.kind());
            return Msg::error(status::BAD_REQUEST, "expected a request");
        };

        debug!(path = path.as_str(); "request received");

        match path.as_str() {
            HEALTH_PATH => self.health(),
            MODEL_METRICS_PATH => self.model_metrics(),
            TRAIN_PATH => match self.train(body).await {
                Ok(reply) => ok(reply),
                Err(e) if e.is_bad_request() => {
                    warn!("rejected train request: {e}");
                    Msg::error(status::BAD_REQUEST, e.to_string())
                }
                Err(e) => {
                    warn!("training failed: {e}");
                    Msg::error(status::INTERNAL_ERROR, e.to_string())
                }
            },
            path => Msg::error(status::NOT_FOUND, format!("no endpoint at {path}")),
        }
    }

    fn health(&self) -> Msg {
        ok(HealthReply {
            status: "online".to_string(),
            client_id: self.client_id.clone(),
            data_loaded: true,
            model_trained: self.latest.read().is_some(),
        })
    }

    fn model_metrics(&self) -> Msg {
        ok(ModelMetricsReply {
            client_id: self.client_id.clone(),
            metrics: *self.latest.read(),
        })
    }

    async fn train(self: Arc<Self>, body: Value) -> Result<TrainReply> {
        let request: TrainRequest =
            serde_json::from_value(body).map_err(|e| WorkerErr::BadRequest(e.to_string()))?;

        let reply = task::spawn_blocking(move || self.train_round(request))
            .await
            .map_err(|e| WorkerErr::Task(e.to_string()))??;

        Ok(reply)
    }

    /// Trains one round starting from the given weights and evaluates on the test split.
    fn train_round(&self, request: TrainRequest) -> Result<TrainReply> {
        let batch_size = NonZeroUsize::new(request.batch_size)
            .ok_or_else(|| WorkerErr::BadRequest("batch_size must be positive".into()))?;

        if request.epochs == 0 {
            return Err(WorkerErr::BadRequest("epochs must be positive".into()));
        }

        let x_size = self.data.train.x_size();
        let mut classifier = if request.weights.is_empty() {
            LogisticModel::lecun_uniform(x_size, self.seed)
        } else {
            LogisticModel::from_weights(&request.weights, x_size)
                .map_err(|e| WorkerErr::BadRequest(e.to_string()))?
        };

        let loss = classifier.fit(
            &self.data.train,
            request.epochs,
            batch_size,
            self.learning_rate,
        )?;
        let metrics = classifier.evaluate(&self.data.test)?;
        *self.latest.write() = Some(metrics);

        info!(
            client_id = self.client_id.as_str(),
            round = request.round,
            train_loss = loss,
            accuracy = metrics.accuracy;
            "round trained"
        );

        Ok(TrainReply {
            client_id: self.client_id.clone(),
            round: request.round,
            metrics,
            weights: classifier.to_weights(),
        })
    }
}

fn ok(reply: impl Serialize) -> Msg {
    match serde_json::to_value(reply) {
        Ok(body) => Msg::response(status::OK, body),
        Err(e) => Msg::error(status::INTERNAL_ERROR, e.to_string()),
    }
}
