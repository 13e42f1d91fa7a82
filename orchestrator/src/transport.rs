use std::time::Duration;

use comms::msg::Msg;
use log::debug;
use serde_json::Value;
use tokio::{net::TcpStream, time};

use crate::TransportError;

/// A client's answer to a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

/// The request/response channel towards client nodes.
#[trait_variant::make(Transport: Send)]
pub trait TransportTemplate {
    /// Should perform a single request to the client at `addr` and wait for its reply.
    ///
    /// # Arguments
    /// * `addr` - The network address of the client node.
    /// * `path` - The endpoint to call on the node.
    /// * `payload` - The body of the request.
    /// * `timeout` - Upper bound for the whole exchange.
    ///
    /// # Returns
    /// The client's reply or the reason the exchange failed.
    async fn call(
        &self,
        addr: &str,
        path: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply, TransportError>;
}

/// Opens one tcp connection per call and exchanges a single framed request/response pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    async fn call(
        &self,
        addr: &str,
        path: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply, TransportError> {
        time::timeout(timeout, exchange(addr, path, payload))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

async fn exchange(addr: &str, path: &str, payload: Value) -> Result<Reply, TransportError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(TransportError::Connect)?;

    debug!(addr = addr, path = path; "connected to client");

    let (rx, tx) = stream.into_split();
    let (mut rx, mut tx) = comms::channel(rx, tx);

    tx.send(&Msg::request(path, payload)).await?;

    match rx.recv().await? {
        Msg::Response { status, body } => Ok(Reply { status, body }),
        msg => Err(TransportError::Protocol(format!(
            "expected a response, got a {}",
            msg.kind()
        ))),
    }
}
