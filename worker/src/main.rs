use std::{env, io, sync::Arc};

use log::{info, warn};
use tokio::{net::TcpListener, signal};

use worker::{Node, WorkerConfig};

const DEFAULT_HOST: &str = "127.0.0.1";

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let addr = format!(
        "{}:{}",
        env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
        env::var("PORT").map_err(io::Error::other)?,
    );

    let config = WorkerConfig::from_env()?;
    let node = Arc::new(Node::from_config(&config)?);

    let listener = TcpListener::bind(&addr).await?;
    info!("client {} listening at {addr}", node.client_id());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let (rx, tx) = stream.into_split();
                let (rx, tx) = comms::channel(rx, tx);
                let node = Arc::clone(&node);

                tokio::spawn(async move {
                    if let Err(e) = node.serve(rx, tx).await {
                        warn!("connection from {peer} failed: {e}");
                    }
                });
            }
            _ = signal::ctrl_c() => {
                info!("received SIGTERM");
                break;
            }
        }
    }

    Ok(())
}
