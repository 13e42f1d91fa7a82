use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire model crate.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model crate's error type.
#[derive(Debug)]
pub enum ModelErr {
    Io(io::Error),
    Parse(serde_json::Error),
    InvalidDataset(String),
    EmptyDataset,
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShardOutOfRange {
        index: usize,
        count: usize,
    },
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::Io(e) => write!(f, "io error: {e}"),
            ModelErr::Parse(e) => write!(f, "invalid dataset file: {e}"),
            ModelErr::InvalidDataset(msg) => write!(f, "invalid dataset: {msg}"),
            ModelErr::EmptyDataset => write!(f, "the dataset has no samples"),
            ModelErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch in {what}: got {got}, expected {expected}"),
            ModelErr::ShardOutOfRange { index, count } => {
                write!(f, "shard {index} is out of range for {count} shards")
            }
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Io(e) => Some(e),
            ModelErr::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ModelErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
