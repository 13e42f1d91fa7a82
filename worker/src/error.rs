use std::{error::Error, fmt, io};

use model::ModelErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Model(ModelErr),
    InvalidConfig(String),
    /// The request body could not be decoded or is unusable.
    BadRequest(String),
    /// The blocking training task panicked or got cancelled.
    Task(String),
}

impl WorkerErr {
    /// Whether the fault is the caller's and should be answered with a 400.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, WorkerErr::BadRequest(_))
    }
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Model(e) => write!(f, "model error: {e}"),
            WorkerErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            WorkerErr::BadRequest(msg) => write!(f, "bad request: {msg}"),
            WorkerErr::Task(msg) => write!(f, "training task failed: {msg}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(e: io::Error) -> Self {
        WorkerErr::Io(e)
    }
}

impl From<ModelErr> for WorkerErr {
    fn from(e: ModelErr) -> Self {
        WorkerErr::Model(e)
    }
}

impl From<WorkerErr> for io::Error {
    fn from(e: WorkerErr) -> Self {
        match e {
            WorkerErr::Io(e) => e,
            e @ (WorkerErr::InvalidConfig(_) | WorkerErr::BadRequest(_)) => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
            e => io::Error::other(e),
        }
    }
}
