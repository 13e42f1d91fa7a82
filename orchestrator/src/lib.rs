//! Federated round orchestration: drives training rounds across remote client nodes,
//! averages their updates into one global model and keeps a round-by-round history.

pub mod aggregate;
mod backend;
pub mod configs;
mod error;
mod invoker;
mod orchestrator;
mod registry;
mod session;
mod status;
mod transport;

pub use backend::{GlobalMetrics, GlobalModel, ModelBackend};
pub use configs::{OrchestratorConfig, OrchestratorSettings, TrainingConfig};
pub use error::{
    AggregateError, BackendError, ConfigError, RegistryError, Rejection, RunError, TransportError,
};
pub use invoker::{ClientInvoker, ClientReport, ClientRoundResult};
pub use orchestrator::{MetricsReport, Orchestrator, StartAck, StopAck};
pub use registry::{ClientDescriptor, ClientRegistry, ClientStatus, InMemoryRegistry};
pub use status::{ClientFailure, ClientMetrics, History, RoundRecord, TrainingStatus};
pub use transport::{Reply, TcpTransport, Transport};
