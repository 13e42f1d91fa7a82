use std::{sync::Arc, time::Duration};

use comms::{
    msg::status,
    specs::{
        HEALTH_PATH, MODEL_METRICS_PATH, Metrics, ModelMetricsReply, TRAIN_PATH, TrainReply,
        TrainRequest, Weights,
    },
};
use serde::Serialize;
use serde_json::Value;
use tokio::time;

use crate::{ClientDescriptor, ClientStatus, Reply, Transport, TransportError};

/// The outcome of asking one client to train for one round.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRoundResult {
    Success {
        client_id: String,
        metrics: Metrics,
        weights: Weights,
    },
    Failure {
        client_id: String,
        reason: String,
    },
}

impl ClientRoundResult {
    pub fn client_id(&self) -> &str {
        match self {
            Self::Success { client_id, .. } | Self::Failure { client_id, .. } => client_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The latest local metrics of one client, as fetched from its node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientReport {
    pub client_id: String,
    pub connection_status: ClientStatus,
    /// `None` if the node couldn't be queried or hasn't trained yet.
    pub metrics: Option<Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Performs the remote calls to the client nodes.
///
/// Every fault is contained in the returned value, nothing here ever fails the caller.
#[derive(Debug)]
pub struct ClientInvoker<T> {
    transport: Arc<T>,
}

impl<T> Clone for ClientInvoker<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport + Sync> ClientInvoker<T> {
    /// Creates a new `ClientInvoker`.
    ///
    /// # Arguments
    /// * `transport` - The channel used to reach the client nodes.
    ///
    /// # Returns
    /// A new `ClientInvoker` instance.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Asks a client to train one round starting from the given global model.
    ///
    /// # Arguments
    /// * `client` - The client to call.
    /// * `request` - The round number, the local training plan and the global model.
    /// * `timeout` - Upper bound for the whole call.
    ///
    /// # Returns
    /// The client's metrics and updated weights, or the reason the call failed.
    pub async fn invoke_train_round(
        &self,
        client: &ClientDescriptor,
        request: &TrainRequest,
        timeout: Duration,
    ) -> ClientRoundResult {
        let failure = |reason: String| ClientRoundResult::Failure {
            client_id: client.id.clone(),
            reason,
        };

        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => return failure(format!("failed to encode request: {e}")),
        };

        let reply = match self.call(client, TRAIN_PATH, payload, timeout).await {
            Ok(reply) => reply,
            Err(e) => return failure(describe(&e, timeout)),
        };

        if reply.status != status::OK {
            return failure(rejected(&reply));
        }

        match serde_json::from_value::<TrainReply>(reply.body) {
            Ok(TrainReply {
                metrics, weights, ..
            }) => ClientRoundResult::Success {
                client_id: client.id.clone(),
                metrics,
                weights,
            },
            Err(e) => failure(format!("malformed response: {e}")),
        }
    }

    /// Checks a client's health endpoint.
    ///
    /// # Arguments
    /// * `client` - The client to check.
    /// * `timeout` - Upper bound for the check.
    ///
    /// # Returns
    /// `Online` on a 200 reply, `Timeout` if it didn't answer in time, `Offline` if it
    /// couldn't be reached and `Error` otherwise.
    pub async fn invoke_health_check(
        &self,
        client: &ClientDescriptor,
        timeout: Duration,
    ) -> ClientStatus {
        match self.call(client, HEALTH_PATH, Value::Null, timeout).await {
            Ok(Reply {
                status: status::OK,
                ..
            }) => ClientStatus::Online,
            Ok(_) => ClientStatus::Error,
            Err(e) => reachability(&e),
        }
    }

    /// Fetches the metrics a client reported for the last round it trained.
    ///
    /// # Arguments
    /// * `client` - The client to query.
    /// * `timeout` - Upper bound for the call.
    ///
    /// # Returns
    /// The client's report, `Online` only when it answered with a well formed reply.
    pub async fn invoke_model_metrics(
        &self,
        client: &ClientDescriptor,
        timeout: Duration,
    ) -> ClientReport {
        let report = |connection_status, metrics, error: Option<String>| ClientReport {
            client_id: client.id.clone(),
            connection_status,
            metrics,
            error,
        };

        let reply = match self.call(client, MODEL_METRICS_PATH, Value::Null, timeout).await {
            Ok(reply) => reply,
            Err(e) => return report(reachability(&e), None, Some(describe(&e, timeout))),
        };

        if reply.status != status::OK {
            return report(ClientStatus::Error, None, Some(rejected(&reply)));
        }

        match serde_json::from_value::<ModelMetricsReply>(reply.body) {
            Ok(ModelMetricsReply { metrics, .. }) => report(ClientStatus::Online, metrics, None),
            Err(e) => report(
                ClientStatus::Error,
                None,
                Some(format!("malformed response: {e}")),
            ),
        }
    }

    async fn call(
        &self,
        client: &ClientDescriptor,
        path: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply, TransportError> {
        let call = self.transport.call(&client.address, path, payload, timeout);

        time::timeout(timeout, call)
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

fn reachability(e: &TransportError) -> ClientStatus {
    match e {
        TransportError::Timeout => ClientStatus::Timeout,
        TransportError::Connect(_) => ClientStatus::Offline,
        _ => ClientStatus::Error,
    }
}

fn describe(e: &TransportError, timeout: Duration) -> String {
    match e {
        TransportError::Timeout => format!("timed out after {} ms", timeout.as_millis()),
        e => e.to_string(),
    }
}

fn rejected(reply: &Reply) -> String {
    match reply.body.get("error").and_then(Value::as_str) {
        Some(detail) => format!("client replied with status {}: {detail}", reply.status),
        None => format!("client replied with status {}", reply.status),
    }
}
