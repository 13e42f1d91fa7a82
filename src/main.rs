mod backend;
mod config;

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use log::{error, info, warn};
use orchestrator::{InMemoryRegistry, Orchestrator, OrchestratorConfig, TcpTransport};
use tokio::{signal, time};

use crate::{backend::DatasetBackend, config::AdminConfig};

const DEFAULT_CONFIG: &str = "fedround.json";
const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = AdminConfig::load(&path)?;

    let registry = Arc::new(InMemoryRegistry::new());
    for client in &config.clients {
        registry.add(client.id.clone(), client.address.clone())?;
    }

    let backend = DatasetBackend::load(&config.dataset, config.shards())
        .with_context(|| format!("failed to load dataset {}", config.dataset.path.display()))?;
    info!("evaluating over {} held out samples", backend.holdout().len());

    let settings = OrchestratorConfig::try_from(config.orchestrator)?;
    let orchestrator = Orchestrator::new(
        Arc::new(TcpTransport),
        registry,
        Arc::new(backend),
        settings,
    );

    let clients = orchestrator
        .registry()
        .check_health(orchestrator.invoker(), settings.health_timeout)
        .await;

    for client in &clients {
        info!(
            id = client.id.as_str(),
            address = client.address.as_str();
            "client is {:?}",
            client.last_known_status
        );
    }

    orchestrator.start(config.training)?;

    let mut ticker = time::interval(PROGRESS_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = orchestrator.status();
                if !status.is_training {
                    break;
                }

                info!("round {}/{}", status.current_round, status.total_rounds);
            }
            _ = signal::ctrl_c() => {
                match orchestrator.stop() {
                    Ok(ack) => info!("stopping after {} completed rounds", ack.completed_rounds),
                    Err(e) => warn!("stop rejected: {e}"),
                }
                break;
            }
        }
    }

    orchestrator.wait().await;

    let status = orchestrator.status();
    if let Some(e) = &status.error {
        error!("training failed: {e}");
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.history())?);

    let report = orchestrator.client_metrics().await;
    info!(
        connected_clients = report.connected_clients,
        total_clients = report.clients_metrics.len();
        "collected the clients' latest metrics"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
