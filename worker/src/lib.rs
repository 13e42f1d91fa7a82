mod config;
mod error;
mod node;

pub use config::{Shard, WorkerConfig};
pub use error::{Result, WorkerErr};
pub use node::Node;
