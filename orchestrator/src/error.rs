use std::{fmt, io};

/// Why a start or stop request was refused. The orchestrator's state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A run is already in progress.
    AlreadyRunning,
    /// There's no run in progress to stop.
    NotRunning,
    /// The registry lists no clients to train with.
    NoClients,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "training already in progress"),
            Self::NotRunning => write!(f, "no training in progress"),
            Self::NoClients => write!(f, "no clients registered"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Faults that end a run before all of its rounds complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The initial global model could not be built.
    ModelConstruction(String),
    /// A client update did not match the global model's shape.
    ShapeMismatch { round: usize, detail: String },
    /// Too many rounds in a row finished without a single successful client.
    ConsecutiveFailures { rounds: usize },
    /// The final model could not be evaluated.
    Evaluation(String),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelConstruction(msg) => write!(f, "failed to build the initial model: {msg}"),
            Self::ShapeMismatch { round, detail } => {
                write!(f, "round {round} received an incompatible update: {detail}")
            }
            Self::ConsecutiveFailures { rounds } => {
                write!(f, "{rounds} consecutive rounds without a successful client")
            }
            Self::Evaluation(msg) => write!(f, "failed to evaluate the final model: {msg}"),
        }
    }
}

impl std::error::Error for RunError {}

/// Faults of the metric and weight averaging primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    EmptyInput,
    ShapeMismatch(String),
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "nothing to aggregate"),
            Self::ShapeMismatch(detail) => write!(f, "shape mismatch: {detail}"),
        }
    }
}

impl std::error::Error for AggregateError {}

/// Faults of a single request/response exchange with a client.
#[derive(Debug)]
pub enum TransportError {
    /// The exchange did not complete in time.
    Timeout,
    /// The client could not be reached.
    Connect(io::Error),
    /// The connection broke mid exchange.
    Io(io::Error),
    /// The client answered with something other than a response.
    Protocol(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Connect(e) => write!(f, "connection failed: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Faults of the client registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateId(String),
    DuplicateAddress(String),
    UnknownClient(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "client id {id} is already registered"),
            Self::DuplicateAddress(addr) => write!(f, "address {addr} is already registered"),
            Self::UnknownClient(id) => write!(f, "unknown client {id}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// A fault raised by a `ModelBackend` implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

/// Invalid orchestrator settings, caught before anything runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
