use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status codes carried by `Msg::Response`.
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// The application layer message for the entire system.
///
/// Every exchange is a single `Request` answered by a single `Response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Msg {
    Request { path: String, body: Value },
    Response { status: u16, body: Value },
}

impl Msg {
    pub fn request(path: impl Into<String>, body: Value) -> Self {
        Self::Request {
            path: path.into(),
            body,
        }
    }

    pub fn response(status: u16, body: Value) -> Self {
        Self::Response { status, body }
    }

    /// Builds an error response whose body is `{"error": detail}`.
    pub fn error(status: u16, detail: impl Into<String>) -> Self {
        Self::Response {
            status,
            body: serde_json::json!({ "error": detail.into() }),
        }
    }

    /// Returns a short name of the message's kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Response { .. } => "response",
        }
    }
}
